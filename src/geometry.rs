//! Coordinate transforms and slot snapping.
//!
//! Everything here is pure: the same inputs always give the same output. Three spaces
//! are involved:
//! - screen space, the pointer's window coordinates,
//! - container space, screen space relative to the canvas container's top-left corner,
//! - canvas space, the unscaled space placements are stored in.
//!
//! The canvas is drawn as `translate(pan) then scale(zoom)` about the container's
//! top-left corner, so canvas point `c` appears at `origin + pan + c * zoom`.

use crate::constants::SNAP_THRESHOLD;
use crate::types::{card_size, Slot, SpreadTemplate};
use eframe::egui::{Pos2, Rect, Vec2};

/// Pan and zoom of the canvas relative to its container.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasTransform {
    /// Translation in screen pixels
    pub pan: Vec2,
    /// Scale factor
    pub zoom: f32,
}

impl Default for CanvasTransform {
    fn default() -> Self {
        Self {
            pan: Vec2::ZERO,
            zoom: 1.0,
        }
    }
}

impl CanvasTransform {
    /// Creates a transform from a pan offset and zoom factor.
    pub fn new(pan: Vec2, zoom: f32) -> Self {
        Self { pan, zoom }
    }

    /// Converts a screen point to canvas space.
    pub fn screen_to_canvas(&self, screen: Pos2, container_origin: Pos2) -> Pos2 {
        screen_to_canvas(screen, container_origin, self.pan, self.zoom)
    }

    /// Converts a canvas point to screen space.
    pub fn canvas_to_screen(&self, canvas: Pos2, container_origin: Pos2) -> Pos2 {
        canvas_to_screen(canvas, container_origin, self.pan, self.zoom)
    }

    /// Converts a canvas rectangle to screen space.
    pub fn rect_to_screen(&self, rect: Rect, container_origin: Pos2) -> Rect {
        Rect::from_min_max(
            self.canvas_to_screen(rect.min, container_origin),
            self.canvas_to_screen(rect.max, container_origin),
        )
    }
}

/// Converts a screen point to canvas space: `(screen - origin - pan) / zoom`.
pub fn screen_to_canvas(screen: Pos2, container_origin: Pos2, pan: Vec2, zoom: f32) -> Pos2 {
    (((screen - container_origin) - pan) / zoom).to_pos2()
}

/// Converts a canvas point to screen space: `canvas * zoom + pan + origin`.
pub fn canvas_to_screen(canvas: Pos2, container_origin: Pos2, pan: Vec2, zoom: f32) -> Pos2 {
    container_origin + pan + canvas.to_vec2() * zoom
}

/// Top-left corner of a card whose center is under the given canvas point.
pub fn card_top_left_centered_at(center: Pos2) -> Pos2 {
    center - card_size() / 2.0
}

/// Where a drop lands, as decided by the active template.
#[derive(Debug, Clone, PartialEq)]
pub enum SnapResult {
    /// Free mode: the raw position is kept
    Free(Pos2),
    /// Snapped onto a slot
    Snapped {
        /// Top-left corner that centers the card on the slot
        top_left: Pos2,
        /// The matched slot
        slot_id: String,
    },
    /// The template has slots but none is close enough; nothing may be placed
    NoMatch,
}

impl SnapResult {
    /// The resolved top-left corner, unless the drop missed every slot.
    pub fn position(&self) -> Option<Pos2> {
        match self {
            SnapResult::Free(pos) => Some(*pos),
            SnapResult::Snapped { top_left, .. } => Some(*top_left),
            SnapResult::NoMatch => None,
        }
    }

    /// The matched slot id, if the drop snapped.
    pub fn slot_id(&self) -> Option<&str> {
        match self {
            SnapResult::Snapped { slot_id, .. } => Some(slot_id),
            _ => None,
        }
    }
}

/// Every slot center of the template resolved to canvas pixels, in template order.
pub fn slot_centers(template: &SpreadTemplate, canvas_size: Vec2) -> Vec<(&Slot, Pos2)> {
    template
        .slots
        .iter()
        .map(|slot| (slot, slot.center(canvas_size)))
        .collect()
}

/// Resolves a raw card top-left position against the active template.
///
/// Free templates accept the position unchanged. Otherwise the slot whose center is
/// nearest to the card's center wins (first listed on ties) and the card is centered
/// on it, provided the distance is below [`SNAP_THRESHOLD`].
pub fn resolve_slot(raw_top_left: Pos2, template: &SpreadTemplate, canvas_size: Vec2) -> SnapResult {
    if template.is_free() {
        return SnapResult::Free(raw_top_left);
    }

    let card_center = raw_top_left + card_size() / 2.0;
    let mut best: Option<(&Slot, Pos2, f32)> = None;
    for (slot, center) in slot_centers(template, canvas_size) {
        let distance = card_center.distance(center);
        if best.map_or(true, |(_, _, best_distance)| distance < best_distance) {
            best = Some((slot, center, distance));
        }
    }

    match best {
        Some((slot, center, distance)) if distance < SNAP_THRESHOLD => SnapResult::Snapped {
            top_left: card_top_left_centered_at(center),
            slot_id: slot.id.clone(),
        },
        _ => SnapResult::NoMatch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::{builtin, FREE_TEMPLATE_ID};
    use crate::types::SlotCoord;
    use proptest::prelude::*;

    const CANVAS: Vec2 = Vec2::new(1000.0, 600.0);

    fn three_card() -> &'static SpreadTemplate {
        builtin("three_card").expect("three_card is built in")
    }

    #[test]
    fn test_drop_centered_on_past_slot() {
        let raw = card_top_left_centered_at(Pos2::new(200.0, 300.0));
        let result = resolve_slot(raw, three_card(), CANVAS);

        assert_eq!(result.slot_id(), Some("past"));
        assert_eq!(result.position(), Some(Pos2::new(200.0 - 60.0, 300.0 - 100.0)));
    }

    #[test]
    fn test_nearby_drop_snaps_to_slot_center() {
        let raw = card_top_left_centered_at(Pos2::new(540.0, 250.0));
        let result = resolve_slot(raw, three_card(), CANVAS);

        assert_eq!(result.slot_id(), Some("present"));
        assert_eq!(result.position(), Some(Pos2::new(440.0, 200.0)));
    }

    #[test]
    fn test_drop_beyond_threshold_is_rejected() {
        // 151 px below the present slot center
        let raw = card_top_left_centered_at(Pos2::new(500.0, 451.0));
        assert_eq!(resolve_slot(raw, three_card(), CANVAS), SnapResult::NoMatch);
    }

    #[test]
    fn test_drop_exactly_at_threshold_is_rejected() {
        let raw = card_top_left_centered_at(Pos2::new(500.0, 450.0));
        assert_eq!(resolve_slot(raw, three_card(), CANVAS), SnapResult::NoMatch);

        let raw = card_top_left_centered_at(Pos2::new(500.0, 449.0));
        assert_eq!(resolve_slot(raw, three_card(), CANVAS).slot_id(), Some("present"));
    }

    #[test]
    fn test_free_template_keeps_raw_position() {
        let free = builtin(FREE_TEMPLATE_ID).unwrap();
        let raw = Pos2::new(-4321.5, 98765.25);
        assert_eq!(resolve_slot(raw, free, CANVAS), SnapResult::Free(raw));
    }

    #[test]
    fn test_ties_go_to_first_listed_slot() {
        let template = SpreadTemplate {
            id: "pair".into(),
            name: "Pair".into(),
            description: String::new(),
            slots: vec![
                Slot::percent("left", "Left", 40.0, 50.0),
                Slot::percent("right", "Right", 60.0, 50.0),
            ],
            connections: Vec::new(),
            is_custom: true,
        };
        let raw = card_top_left_centered_at(Pos2::new(500.0, 300.0));
        assert_eq!(resolve_slot(raw, &template, CANVAS).slot_id(), Some("left"));
    }

    #[test]
    fn test_pixel_and_percent_slots_are_compared_in_pixels() {
        let template = SpreadTemplate {
            id: "mixed".into(),
            name: "Mixed".into(),
            description: String::new(),
            slots: vec![
                Slot::percent("pct", "Percent", 50.0, 50.0),
                Slot {
                    id: "px".into(),
                    label: "Pixels".into(),
                    x: SlotCoord::Pixels(100.0),
                    y: SlotCoord::Pixels(100.0),
                },
            ],
            connections: Vec::new(),
            is_custom: true,
        };
        let raw = card_top_left_centered_at(Pos2::new(120.0, 90.0));
        let result = resolve_slot(raw, &template, CANVAS);
        assert_eq!(result.slot_id(), Some("px"));
        assert_eq!(result.position(), Some(Pos2::new(40.0, 0.0)));
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let raw = Pos2::new(333.0, 111.0);
        let first = resolve_slot(raw, three_card(), CANVAS);
        let second = resolve_slot(raw, three_card(), CANVAS);
        assert_eq!(first, second);
    }

    #[test]
    fn test_screen_to_canvas_accounts_for_container_pan_and_zoom() {
        let origin = Pos2::new(300.0, 50.0);
        let canvas = screen_to_canvas(Pos2::new(500.0, 250.0), origin, Vec2::new(100.0, 50.0), 2.0);
        assert_eq!(canvas, Pos2::new(50.0, 75.0));
    }

    proptest! {
        #[test]
        fn screen_canvas_round_trip(
            sx in -5000.0f32..5000.0,
            sy in -5000.0f32..5000.0,
            px in -2000.0f32..2000.0,
            py in -2000.0f32..2000.0,
            zoom in 0.5f32..=2.0,
        ) {
            let origin = Pos2::new(280.0, 64.0);
            let transform = CanvasTransform::new(Vec2::new(px, py), zoom);
            let screen = Pos2::new(sx, sy);
            let back = transform.canvas_to_screen(transform.screen_to_canvas(screen, origin), origin);
            prop_assert!((back.x - screen.x).abs() < 1e-2);
            prop_assert!((back.y - screen.y).abs() < 1e-2);
        }

        #[test]
        fn snapped_cards_are_centered_on_a_slot(x in -500.0f32..1500.0, y in -500.0f32..1100.0) {
            let template = three_card();
            if let SnapResult::Snapped { top_left, slot_id } = resolve_slot(Pos2::new(x, y), template, CANVAS) {
                let slot = template.slot(&slot_id).unwrap();
                let center = top_left + card_size() / 2.0;
                prop_assert!(center.distance(slot.center(CANVAS)) < 1e-3);
            }
        }
    }
}
