//! Pan and zoom state, the pan gesture, and viewport culling.
//!
//! Panning is two-tier. While a gesture is active only the live pan moves; the renderer
//! reads [`Viewport::live_transform`] every frame. The committed pan changes once, when
//! the gesture ends through [`Viewport::commit`]. Nothing here touches placement history.

use crate::constants::{CARD_Z_OFFSET, CULL_BUFFER, MAX_ZOOM, MIN_ZOOM, ZOOM_STEP};
use crate::geometry::CanvasTransform;
use crate::types::PlacedCard;
use eframe::egui::{PointerButton, Pos2, Rect, Vec2};

/// Current pan gesture.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum PanMode {
    /// No gesture in progress
    #[default]
    Idle,
    /// Dragging the canvas
    Panning {
        /// Pointer position when the gesture began
        start: Pos2,
        /// Latest pointer position
        current: Pos2,
    },
}

/// Pan/zoom controller for the canvas.
#[derive(Debug, Clone)]
pub struct Viewport {
    zoom: f32,
    pan: Vec2,
    mode: PanMode,
    space_held: bool,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            pan: Vec2::ZERO,
            mode: PanMode::Idle,
            space_held: false,
        }
    }
}

/// A card that survived culling, with its draw order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderedCard<'a> {
    /// Draw order; increases with the card's position in the collection
    pub z_index: usize,
    /// The placement
    pub card: &'a PlacedCard,
}

fn clamp_zoom(zoom: f32) -> f32 {
    // Rounded to hundredths so repeated 0.1 steps land on exact values.
    ((zoom * 100.0).round() / 100.0).clamp(MIN_ZOOM, MAX_ZOOM)
}

impl Viewport {
    /// Creates an idle viewport at zoom 1 with no pan.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current zoom factor.
    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    /// The committed pan offset, ignoring any gesture in progress.
    pub fn committed_pan(&self) -> Vec2 {
        self.pan
    }

    /// Current gesture state.
    pub fn mode(&self) -> PanMode {
        self.mode
    }

    /// Whether a pan gesture is active.
    pub fn is_panning(&self) -> bool {
        matches!(self.mode, PanMode::Panning { .. })
    }

    /// Whether the pan modifier (space) is down.
    pub fn space_held(&self) -> bool {
        self.space_held
    }

    /// Pan including the uncommitted gesture delta.
    pub fn live_pan(&self) -> Vec2 {
        match self.mode {
            PanMode::Idle => self.pan,
            PanMode::Panning { start, current } => self.pan + (current - start),
        }
    }

    /// Transform for drawing this frame.
    pub fn live_transform(&self) -> CanvasTransform {
        CanvasTransform::new(self.live_pan(), self.zoom)
    }

    /// Transform from committed state only.
    pub fn transform(&self) -> CanvasTransform {
        CanvasTransform::new(self.pan, self.zoom)
    }

    /// Handles a pointer press on the canvas. Returns true if a pan gesture started.
    ///
    /// The middle button always pans, the primary button pans only while space is held.
    /// A press on a card never pans unless space is held, so dragging a card keeps working.
    pub fn pointer_down(&mut self, button: PointerButton, pos: Pos2, on_card: bool) -> bool {
        if on_card && !self.space_held {
            return false;
        }
        let starts_pan = match button {
            PointerButton::Middle => true,
            PointerButton::Primary => self.space_held,
            _ => false,
        };
        if starts_pan {
            self.mode = PanMode::Panning {
                start: pos,
                current: pos,
            };
        }
        starts_pan
    }

    /// Tracks the pointer during a gesture. Only the live pan changes.
    pub fn pointer_move(&mut self, pos: Pos2) {
        if let PanMode::Panning { current, .. } = &mut self.mode {
            *current = pos;
        }
    }

    /// Ends the gesture on pointer release.
    pub fn pointer_up(&mut self) {
        self.commit();
    }

    /// Updates the modifier state. Releasing space ends any pan in progress.
    pub fn set_space_held(&mut self, held: bool) {
        self.space_held = held;
        if !held && self.is_panning() {
            log::debug!("Pan modifier released mid-gesture");
            self.commit();
        }
    }

    /// Folds the gesture delta into the committed pan and returns to idle.
    pub fn commit(&mut self) {
        if self.is_panning() {
            self.pan = self.live_pan();
            self.mode = PanMode::Idle;
        }
    }

    /// Sets the zoom, clamped to the allowed range. Non-finite values are ignored.
    pub fn set_zoom(&mut self, zoom: f32) {
        if zoom.is_finite() {
            self.zoom = clamp_zoom(zoom);
        }
    }

    /// Zooms in one step.
    pub fn zoom_in(&mut self) {
        self.set_zoom(self.zoom + ZOOM_STEP);
    }

    /// Zooms out one step.
    pub fn zoom_out(&mut self) {
        self.set_zoom(self.zoom - ZOOM_STEP);
    }

    /// Applies one wheel notch. Positive `scroll_y` (wheel away from the user) zooms in.
    ///
    /// Zoom stays anchored at the transform origin; the pan is not adjusted.
    pub fn apply_wheel(&mut self, scroll_y: f32) {
        if scroll_y > 0.0 {
            self.zoom_in();
        } else if scroll_y < 0.0 {
            self.zoom_out();
        }
    }

    /// Back to zoom 1 and no pan.
    pub fn reset_view(&mut self) {
        *self = Self {
            space_held: self.space_held,
            ..Self::default()
        };
    }

    /// The canvas-space rectangle visible in a container of the given size, before
    /// buffering.
    pub fn visible_rect(&self, container_size: Vec2) -> Rect {
        visible_rect(&self.live_transform(), container_size)
    }

    /// Cards to draw this frame, using the live transform.
    pub fn cull<'a>(&self, cards: &'a [PlacedCard], container_size: Vec2) -> Vec<RenderedCard<'a>> {
        cull(cards, &self.live_transform(), container_size)
    }
}

/// Visible canvas rectangle: origin `-pan / zoom`, extent `container / zoom`.
pub fn visible_rect(transform: &CanvasTransform, container_size: Vec2) -> Rect {
    let min = (-transform.pan / transform.zoom).to_pos2();
    Rect::from_min_size(min, container_size / transform.zoom)
}

/// Keeps the cards whose footprint meets the buffered visible rectangle.
///
/// Order follows the collection; z indices count up from [`CARD_Z_OFFSET`] over the
/// filtered list.
pub fn cull<'a>(
    cards: &'a [PlacedCard],
    transform: &CanvasTransform,
    container_size: Vec2,
) -> Vec<RenderedCard<'a>> {
    let bounds = visible_rect(transform, container_size).expand(CULL_BUFFER);
    cards
        .iter()
        .filter(|card| card.footprint().intersects(bounds))
        .enumerate()
        .map(|(i, card)| RenderedCard {
            z_index: CARD_Z_OFFSET + i,
            card,
        })
        .collect()
}
