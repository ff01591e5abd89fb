//! The transient state of one drag gesture.
//!
//! A session knows what is being dragged and where it was grabbed. It is resolved
//! once, at drop time, through the snap engine and the placement store.

use crate::geometry::{resolve_slot, CanvasTransform};
use crate::placement::PlacementStore;
use crate::types::{card_size, Card, InstanceId, PlacedCard, SpreadTemplate};
use eframe::egui::{Pos2, Rect, Vec2};

/// What a drag carries.
#[derive(Debug, Clone, PartialEq)]
pub enum DragSource {
    /// A new card taken from the palette
    Palette(Card),
    /// A card already on the table
    Placement(InstanceId),
}

/// Everything the drop needs to know about the canvas at release time.
#[derive(Debug, Clone, Copy)]
pub struct DropContext<'a> {
    /// Screen rectangle of the canvas container
    pub container: Rect,
    /// Transform in effect at release
    pub transform: CanvasTransform,
    /// Active spread template
    pub template: &'a SpreadTemplate,
    /// Unscaled canvas size used to resolve percentage slots
    pub canvas_size: Vec2,
}

/// Result of ending a drag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropOutcome {
    /// A new placement was created
    Placed(InstanceId),
    /// An existing placement was moved and brought to the front
    Moved(InstanceId),
    /// The drop missed every slot of the template
    Rejected,
    /// The drag ended outside the canvas or was abandoned
    Cancelled,
}

/// A drag in progress.
#[derive(Debug, Clone, PartialEq)]
pub struct DragSession {
    source: DragSource,
    /// Pointer position relative to the card's top-left corner, in canvas units
    grab_offset: Vec2,
    hover: Option<Pos2>,
}

impl DragSession {
    /// Starts dragging a palette card, held by its center.
    pub fn from_palette(card: Card) -> Self {
        Self {
            source: DragSource::Palette(card),
            grab_offset: card_size() / 2.0,
            hover: None,
        }
    }

    /// Starts dragging a placed card from the canvas point where it was grabbed.
    pub fn from_placement(card: &PlacedCard, grab_canvas: Pos2) -> Self {
        Self {
            source: DragSource::Placement(card.instance_id),
            grab_offset: grab_canvas - card.position(),
            hover: None,
        }
    }

    /// What is being dragged.
    pub fn source(&self) -> &DragSource {
        &self.source
    }

    /// Records the latest pointer position, for drawing a drag preview.
    pub fn hover(&mut self, pointer: Pos2) {
        self.hover = Some(pointer);
    }

    /// Last pointer position seen.
    pub fn hover_position(&self) -> Option<Pos2> {
        self.hover
    }

    /// Where the card's top-left corner would be if released at `pointer`.
    pub fn raw_top_left(&self, pointer: Pos2, transform: &CanvasTransform, container_origin: Pos2) -> Pos2 {
        transform.screen_to_canvas(pointer, container_origin) - self.grab_offset
    }

    /// Ends the drag at a screen position and applies it to the store.
    ///
    /// Releases outside the container cancel the drag. Neither a cancelled nor a
    /// rejected drop touches the store.
    pub fn drop_at(self, pointer: Pos2, context: &DropContext<'_>, store: &mut PlacementStore) -> DropOutcome {
        if !context.container.contains(pointer) {
            log::debug!("Drag released outside the canvas");
            return DropOutcome::Cancelled;
        }

        let raw = self.raw_top_left(pointer, &context.transform, context.container.min);
        let snap = resolve_slot(raw, context.template, context.canvas_size);
        log::debug!("Drop at {raw:?} resolved to {snap:?}");

        let outcome = match self.source {
            DragSource::Palette(card) => store
                .place(PlacedCard::from_card(&card, raw), &snap)
                .map(DropOutcome::Placed),
            DragSource::Placement(instance_id) => store
                .move_card(instance_id, &snap)
                .then_some(DropOutcome::Moved(instance_id)),
        };
        outcome.unwrap_or(DropOutcome::Rejected)
    }

    /// Abandons the drag.
    pub fn cancel(self) -> DropOutcome {
        DropOutcome::Cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::{builtin, FREE_TEMPLATE_ID};

    const ORIGIN: Pos2 = Pos2::new(250.0, 40.0);

    fn context(template_id: &str) -> DropContext<'static> {
        DropContext {
            container: Rect::from_min_size(ORIGIN, Vec2::new(1000.0, 600.0)),
            transform: CanvasTransform::default(),
            template: builtin(template_id).unwrap(),
            canvas_size: Vec2::new(1000.0, 600.0),
        }
    }

    fn fool() -> Card {
        Card::new("0", "The Fool", "Beginnings")
    }

    #[test]
    fn test_palette_drop_on_slot_places_card() {
        let mut store = PlacementStore::new();
        let session = DragSession::from_palette(fool());
        let outcome = session.drop_at(ORIGIN + Vec2::new(200.0, 300.0), &context("three_card"), &mut store);

        let DropOutcome::Placed(id) = outcome else {
            panic!("expected a placement, got {outcome:?}");
        };
        assert_eq!(store.get(id).unwrap().position(), Pos2::new(140.0, 200.0));
        assert_eq!(store.get(id).unwrap().card_id, "0");
    }

    #[test]
    fn test_drop_accounts_for_pan_and_zoom() {
        let mut store = PlacementStore::new();
        let mut ctx = context(FREE_TEMPLATE_ID);
        ctx.transform = CanvasTransform::new(Vec2::new(100.0, 0.0), 2.0);

        let outcome = DragSession::from_palette(fool()).drop_at(ORIGIN + Vec2::new(500.0, 400.0), &ctx, &mut store);
        let DropOutcome::Placed(id) = outcome else {
            panic!("expected a placement, got {outcome:?}");
        };
        assert_eq!(store.get(id).unwrap().position(), Pos2::new(200.0 - 60.0, 200.0 - 100.0));
    }

    #[test]
    fn test_missed_slot_is_rejected() {
        let mut store = PlacementStore::new();
        let outcome = DragSession::from_palette(fool()).drop_at(ORIGIN + Vec2::new(500.0, 590.0), &context("three_card"), &mut store);
        assert_eq!(outcome, DropOutcome::Rejected);
        assert!(store.is_empty());
        assert!(!store.can_undo());
    }

    #[test]
    fn test_release_outside_container_is_cancelled() {
        let mut store = PlacementStore::new();
        let outcome = DragSession::from_palette(fool()).drop_at(Pos2::new(10.0, 10.0), &context(FREE_TEMPLATE_ID), &mut store);
        assert_eq!(outcome, DropOutcome::Cancelled);
        assert!(store.is_empty());
        assert_eq!(store.history().len(), 1);
    }

    #[test]
    fn test_move_keeps_grab_offset() {
        let mut store = PlacementStore::new();
        let placed = DragSession::from_palette(fool()).drop_at(ORIGIN + Vec2::new(300.0, 300.0), &context(FREE_TEMPLATE_ID), &mut store);
        let DropOutcome::Placed(id) = placed else {
            panic!("expected a placement, got {placed:?}");
        };

        let card = store.get(id).unwrap().clone();
        let grab = card.position() + Vec2::new(10.0, 20.0);
        let session = DragSession::from_placement(&card, grab);
        let outcome = session.drop_at(ORIGIN + Vec2::new(510.0, 120.0), &context(FREE_TEMPLATE_ID), &mut store);

        assert_eq!(outcome, DropOutcome::Moved(id));
        assert_eq!(store.get(id).unwrap().position(), Pos2::new(500.0, 100.0));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_cancel_leaves_store_untouched() {
        let store = PlacementStore::new();
        let mut session = DragSession::from_palette(fool());
        session.hover(Pos2::new(400.0, 400.0));
        assert_eq!(session.hover_position(), Some(Pos2::new(400.0, 400.0)));
        assert_eq!(session.cancel(), DropOutcome::Cancelled);
        assert_eq!(store.revision(), 0);
    }
}
