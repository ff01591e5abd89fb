//! Shared application-wide constants.
//! Centralizes tweakable values used by the snap engine, the viewport and rendering.

// Card footprint
/// Width of a card on the table, in canvas units.
pub const CARD_WIDTH: f32 = 120.0;
/// Height of a card on the table, in canvas units.
pub const CARD_HEIGHT: f32 = 200.0;
/// Corner radius of card and slot outlines (in screen pixels after transform).
pub const CARD_CORNER_RADIUS: f32 = 8.0;

// Snapping
/// Maximum distance between a card center and a slot center for a drop to snap.
pub const SNAP_THRESHOLD: f32 = 150.0;
/// Two placements closer than this on both axes occupy the same slot.
pub const SLOT_TOLERANCE: f32 = 10.0;

// Viewport
/// Lower zoom bound.
pub const MIN_ZOOM: f32 = 0.5;
/// Upper zoom bound.
pub const MAX_ZOOM: f32 = 2.0;
/// Zoom change per wheel notch or zoom button press.
pub const ZOOM_STEP: f32 = 0.1;
/// Extra canvas-space margin kept around the visible area when culling.
pub const CULL_BUFFER: f32 = 800.0;
/// Base z-index of the first rendered card.
pub const CARD_Z_OFFSET: usize = 10;

// Card orientation
/// Rotation applied by one "rotate" click, in degrees.
pub const ROTATION_STEP: u16 = 45;

// Export
/// Padding (canvas units) around the cards' bounding box for the table snapshot.
pub const SNAPSHOT_PADDING: f32 = 50.0;
/// A card counts as sitting in a slot for the report when its center is this close.
pub const REPORT_SLOT_RADIUS: f32 = 50.0;
