//! The ordered collection of cards on the table.
//!
//! Order is z-order: later entries are drawn on top, and bringing a card to the front
//! means removing and re-appending it. Every change builds a new collection and records
//! it in the undo history; earlier snapshots are never touched.

use crate::constants::SLOT_TOLERANCE;
use crate::geometry::SnapResult;
use crate::history::UndoHistory;
use crate::types::{normalize_rotation, CardPatch, InstanceId, PlacedCard};
use eframe::egui::Pos2;
use std::collections::HashSet;

/// Placed cards plus their undo history.
#[derive(Debug, Clone, Default)]
pub struct PlacementStore {
    history: UndoHistory<Vec<PlacedCard>>,
    revision: u64,
}

fn occupies(card: &PlacedCard, position: Pos2) -> bool {
    (card.x - position.x).abs() < SLOT_TOLERANCE && (card.y - position.y).abs() < SLOT_TOLERANCE
}

impl PlacementStore {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cards in z-order, bottom first.
    pub fn cards(&self) -> &[PlacedCard] {
        self.history.current()
    }

    /// Looks up a placement.
    pub fn get(&self, instance_id: InstanceId) -> Option<&PlacedCard> {
        self.cards().iter().find(|c| c.instance_id == instance_id)
    }

    /// Number of cards on the table.
    pub fn len(&self) -> usize {
        self.cards().len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.cards().is_empty()
    }

    /// Incremented on every change of the visible collection, including undo and redo.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Read access to the history.
    pub fn history(&self) -> &UndoHistory<Vec<PlacedCard>> {
        &self.history
    }

    fn commit(&mut self, cards: Vec<PlacedCard>) {
        self.history.record(cards);
        self.revision += 1;
    }

    /// Cards other than `exclude` that do not sit on the snapped slot position.
    fn without_occupants(&self, snap: &SnapResult, exclude: Option<InstanceId>) -> Vec<PlacedCard> {
        let target = match (snap.slot_id(), snap.position()) {
            (Some(_), Some(position)) => Some(position),
            _ => None,
        };
        self.cards()
            .iter()
            .filter(|c| Some(c.instance_id) != exclude)
            .filter(|c| match target {
                Some(position) if occupies(c, position) => {
                    log::debug!("Card {} displaced from its slot", c.instance_id);
                    false
                }
                _ => true,
            })
            .cloned()
            .collect()
    }

    /// Puts a new card on the table at the resolved position, on top of the others.
    ///
    /// A card already lying on the same slot is displaced. Rejected snaps and duplicate
    /// instance ids leave the table untouched and return `None`.
    pub fn place(&mut self, mut card: PlacedCard, snap: &SnapResult) -> Option<InstanceId> {
        let position = snap.position()?;
        if self.get(card.instance_id).is_some() {
            log::warn!("Refusing to place duplicate instance {}", card.instance_id);
            return None;
        }
        card.x = position.x;
        card.y = position.y;
        let id = card.instance_id;
        let mut cards = self.without_occupants(snap, None);
        cards.push(card);
        self.commit(cards);
        Some(id)
    }

    /// Moves a card to the resolved position and brings it to the front.
    ///
    /// Other cards on the same slot are displaced. Returns false when the card does not
    /// exist or the snap was rejected.
    pub fn move_card(&mut self, instance_id: InstanceId, snap: &SnapResult) -> bool {
        let Some(position) = snap.position() else {
            return false;
        };
        let Some(mut moved) = self.get(instance_id).cloned() else {
            return false;
        };
        moved.x = position.x;
        moved.y = position.y;
        let mut cards = self.without_occupants(snap, Some(instance_id));
        cards.push(moved);
        self.commit(cards);
        true
    }

    /// Merges orientation changes into a card without changing the order.
    pub fn update(&mut self, instance_id: InstanceId, patch: CardPatch) -> bool {
        if self.get(instance_id).is_none() {
            return false;
        }
        let cards = self
            .cards()
            .iter()
            .map(|c| {
                let mut c = c.clone();
                if c.instance_id == instance_id {
                    patch.apply(&mut c);
                }
                c
            })
            .collect();
        self.commit(cards);
        true
    }

    /// Turns a card upside down, or back.
    pub fn flip(&mut self, instance_id: InstanceId) -> bool {
        let Some(card) = self.get(instance_id) else {
            return false;
        };
        let patch = CardPatch {
            is_reversed: Some(!card.is_reversed),
            ..Default::default()
        };
        self.update(instance_id, patch)
    }

    /// Rotates a card one step clockwise.
    pub fn rotate(&mut self, instance_id: InstanceId) -> bool {
        let Some(card) = self.get(instance_id) else {
            return false;
        };
        let patch = CardPatch {
            rotation: Some(card.next_rotation()),
            ..Default::default()
        };
        self.update(instance_id, patch)
    }

    /// Takes a card off the table.
    pub fn remove(&mut self, instance_id: InstanceId) -> bool {
        if self.get(instance_id).is_none() {
            return false;
        }
        let cards = self
            .cards()
            .iter()
            .filter(|c| c.instance_id != instance_id)
            .cloned()
            .collect();
        self.commit(cards);
        true
    }

    /// Clears the table. Does nothing when it is already empty.
    pub fn clear(&mut self) -> bool {
        if self.is_empty() {
            return false;
        }
        self.commit(Vec::new());
        true
    }

    /// Replaces the table with an externally supplied collection, as an undoable change.
    ///
    /// Entries repeating an instance id already seen or lying at a non-finite position
    /// are dropped, and rotations are brought back onto the rotation steps.
    pub fn load(&mut self, cards: Vec<PlacedCard>) {
        let mut seen = HashSet::new();
        let cards = cards
            .into_iter()
            .filter(|c| {
                if !c.x.is_finite() || !c.y.is_finite() {
                    log::warn!("Dropping instance {} with invalid position from restored table", c.instance_id);
                    return false;
                }
                let fresh = seen.insert(c.instance_id);
                if !fresh {
                    log::warn!("Dropping duplicate instance {} from restored table", c.instance_id);
                }
                fresh
            })
            .map(|mut c| {
                let rotation = normalize_rotation(c.rotation);
                if rotation != c.rotation {
                    log::warn!("Restored rotation {} of {} normalized to {rotation}", c.rotation, c.name);
                    c.rotation = rotation;
                }
                c
            })
            .collect();
        self.commit(cards);
    }

    /// Restores the previous collection. Returns false at the start of history.
    pub fn undo(&mut self) -> bool {
        let changed = self.history.undo().is_some();
        if changed {
            self.revision += 1;
        }
        changed
    }

    /// Re-applies an undone change. Returns false at the tip of history.
    pub fn redo(&mut self) -> bool {
        let changed = self.history.redo().is_some();
        if changed {
            self.revision += 1;
        }
        changed
    }

    /// Returns true if there is a change to undo.
    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    /// Returns true if there is a change to redo.
    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{card_top_left_centered_at, resolve_slot};
    use crate::templates::builtin;
    use crate::types::Card;
    use eframe::egui::Vec2;
    use proptest::prelude::*;

    const CANVAS: Vec2 = Vec2::new(1000.0, 600.0);

    fn card(id: &str) -> PlacedCard {
        PlacedCard::from_card(&Card::new(id, format!("Card {id}"), ""), Pos2::ZERO)
    }

    fn snap_three_card(center: Pos2) -> SnapResult {
        let template = builtin("three_card").unwrap();
        resolve_slot(card_top_left_centered_at(center), template, CANVAS)
    }

    #[test]
    fn test_place_appends_on_top() {
        let mut store = PlacementStore::new();
        let a = store.place(card("0"), &SnapResult::Free(Pos2::new(10.0, 10.0))).unwrap();
        let b = store.place(card("1"), &SnapResult::Free(Pos2::new(500.0, 10.0))).unwrap();

        let ids: Vec<_> = store.cards().iter().map(|c| c.instance_id).collect();
        assert_eq!(ids, vec![a, b]);
        assert_eq!(store.get(a).unwrap().position(), Pos2::new(10.0, 10.0));
    }

    #[test]
    fn test_rejected_snap_leaves_table_and_history_untouched() {
        let mut store = PlacementStore::new();
        let snap = snap_three_card(Pos2::new(500.0, 900.0));
        assert_eq!(snap, SnapResult::NoMatch);

        assert_eq!(store.place(card("0"), &snap), None);
        assert!(store.is_empty());
        assert_eq!(store.history().len(), 1);
        assert_eq!(store.revision(), 0);
    }

    #[test]
    fn test_drop_on_occupied_slot_displaces_previous_card() {
        let mut store = PlacementStore::new();
        let first = store.place(card("0"), &snap_three_card(Pos2::new(210.0, 290.0))).unwrap();
        let second = store.place(card("1"), &snap_three_card(Pos2::new(190.0, 320.0))).unwrap();

        assert_eq!(store.len(), 1);
        assert!(store.get(first).is_none());
        assert_eq!(store.get(second).unwrap().position(), Pos2::new(140.0, 200.0));
    }

    #[test]
    fn test_free_drop_does_not_displace() {
        let mut store = PlacementStore::new();
        store.place(card("0"), &SnapResult::Free(Pos2::new(0.0, 0.0)));
        store.place(card("1"), &SnapResult::Free(Pos2::new(2.0, 2.0)));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_move_brings_card_to_front() {
        let mut store = PlacementStore::new();
        let a = store.place(card("0"), &SnapResult::Free(Pos2::new(0.0, 0.0))).unwrap();
        let b = store.place(card("1"), &SnapResult::Free(Pos2::new(300.0, 0.0))).unwrap();

        assert!(store.move_card(a, &SnapResult::Free(Pos2::new(50.0, 60.0))));
        let ids: Vec<_> = store.cards().iter().map(|c| c.instance_id).collect();
        assert_eq!(ids, vec![b, a]);
        assert_eq!(store.get(a).unwrap().position(), Pos2::new(50.0, 60.0));
    }

    #[test]
    fn test_move_onto_occupied_slot_displaces_other_card() {
        let mut store = PlacementStore::new();
        let past = store.place(card("0"), &snap_three_card(Pos2::new(200.0, 300.0))).unwrap();
        let present = store.place(card("1"), &snap_three_card(Pos2::new(500.0, 300.0))).unwrap();

        assert!(store.move_card(present, &snap_three_card(Pos2::new(220.0, 310.0))));
        assert_eq!(store.len(), 1);
        assert!(store.get(past).is_none());
        assert_eq!(store.get(present).unwrap().position(), Pos2::new(140.0, 200.0));
    }

    #[test]
    fn test_move_within_own_slot_keeps_card() {
        let mut store = PlacementStore::new();
        let past = store.place(card("0"), &snap_three_card(Pos2::new(200.0, 300.0))).unwrap();
        assert!(store.move_card(past, &snap_three_card(Pos2::new(205.0, 305.0))));
        assert_eq!(store.len(), 1);
        assert!(store.get(past).is_some());
    }

    #[test]
    fn test_move_unknown_or_rejected_is_noop() {
        let mut store = PlacementStore::new();
        let a = store.place(card("0"), &SnapResult::Free(Pos2::ZERO)).unwrap();
        let revision = store.revision();

        assert!(!store.move_card(uuid::Uuid::new_v4(), &SnapResult::Free(Pos2::ZERO)));
        assert!(!store.move_card(a, &SnapResult::NoMatch));
        assert_eq!(store.revision(), revision);
    }

    #[test]
    fn test_update_keeps_order() {
        let mut store = PlacementStore::new();
        let a = store.place(card("0"), &SnapResult::Free(Pos2::ZERO)).unwrap();
        let b = store.place(card("1"), &SnapResult::Free(Pos2::new(200.0, 0.0))).unwrap();

        assert!(store.flip(a));
        assert!(store.rotate(a));
        let ids: Vec<_> = store.cards().iter().map(|c| c.instance_id).collect();
        assert_eq!(ids, vec![a, b]);
        assert!(store.get(a).unwrap().is_reversed);
        assert_eq!(store.get(a).unwrap().rotation, 45);
    }

    #[test]
    fn test_clear_on_empty_table_records_nothing() {
        let mut store = PlacementStore::new();
        assert!(!store.clear());
        assert_eq!(store.history().len(), 1);

        store.place(card("0"), &SnapResult::Free(Pos2::ZERO));
        assert!(store.clear());
        assert!(store.is_empty());
        assert!(store.undo());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_undo_snapshot_unchanged_by_later_edits() {
        let mut store = PlacementStore::new();
        let a = store.place(card("0"), &SnapResult::Free(Pos2::ZERO)).unwrap();
        let before: Vec<PlacedCard> = store.cards().to_vec();

        store.rotate(a);
        store.move_card(a, &SnapResult::Free(Pos2::new(400.0, 400.0)));
        store.undo();
        store.undo();
        assert_eq!(store.cards(), before.as_slice());
    }

    #[test]
    fn test_load_is_undoable() {
        let mut store = PlacementStore::new();
        store.place(card("0"), &SnapResult::Free(Pos2::ZERO));
        let restored = vec![card("5"), card("6")];

        store.load(restored.clone());
        assert_eq!(store.cards(), restored.as_slice());
        assert!(store.undo());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_load_drops_repeated_instance_ids() {
        let mut store = PlacementStore::new();
        let a = card("0");
        store.load(vec![a.clone(), card("1"), a]);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_load_normalizes_rotation_so_rotate_stays_on_steps() {
        let mut store = PlacementStore::new();
        let mut odd = card("0");
        odd.rotation = 65530;
        let mut tilted = card("1");
        tilted.rotation = 100;
        let (odd_id, tilted_id) = (odd.instance_id, tilted.instance_id);
        store.load(vec![odd, tilted]);

        assert_eq!(store.get(odd_id).unwrap().rotation, 0);
        assert_eq!(store.get(tilted_id).unwrap().rotation, 90);
        assert!(store.rotate(odd_id));
        assert_eq!(store.get(odd_id).unwrap().rotation, 45);
    }

    #[test]
    fn test_load_drops_cards_at_non_finite_positions() {
        let mut store = PlacementStore::new();
        let mut lost = card("0");
        lost.x = f32::NAN;
        store.load(vec![lost, card("1")]);
        assert_eq!(store.len(), 1);
        assert_eq!(store.cards()[0].card_id, "1");
    }

    #[test]
    fn test_place_refuses_duplicate_instance() {
        let mut store = PlacementStore::new();
        let a = card("0");
        store.place(a.clone(), &SnapResult::Free(Pos2::ZERO));
        assert_eq!(store.place(a, &SnapResult::Free(Pos2::new(500.0, 0.0))), None);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_new_edit_after_undo_discards_redo() {
        let mut store = PlacementStore::new();
        store.place(card("0"), &SnapResult::Free(Pos2::ZERO));
        store.place(card("1"), &SnapResult::Free(Pos2::new(300.0, 0.0)));
        store.undo();
        assert!(store.can_redo());

        store.place(card("2"), &SnapResult::Free(Pos2::new(600.0, 0.0)));
        assert!(!store.can_redo());
        assert!(!store.redo());
    }

    #[derive(Debug, Clone)]
    enum Op {
        Place(f32, f32, bool),
        Move(usize, f32, f32, bool),
        Flip(usize),
        Remove(usize),
        Clear,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0.0f32..1000.0, 0.0f32..600.0, any::<bool>()).prop_map(|(x, y, s)| Op::Place(x, y, s)),
            (0usize..8, 0.0f32..1000.0, 0.0f32..600.0, any::<bool>())
                .prop_map(|(i, x, y, s)| Op::Move(i, x, y, s)),
            (0usize..8).prop_map(Op::Flip),
            (0usize..8).prop_map(Op::Remove),
            Just(Op::Clear),
        ]
    }

    fn snap_for(x: f32, y: f32, slotted: bool) -> SnapResult {
        if slotted {
            snap_three_card(Pos2::new(x, y))
        } else {
            SnapResult::Free(Pos2::new(x, y))
        }
    }

    fn apply(store: &mut PlacementStore, op: &Op) {
        let pick = |store: &PlacementStore, i: usize| {
            let cards = store.cards();
            (!cards.is_empty()).then(|| cards[i % cards.len()].instance_id)
        };
        match *op {
            Op::Place(x, y, slotted) => {
                store.place(card("0"), &snap_for(x, y, slotted));
            }
            Op::Move(i, x, y, slotted) => {
                if let Some(id) = pick(store, i) {
                    store.move_card(id, &snap_for(x, y, slotted));
                }
            }
            Op::Flip(i) => {
                if let Some(id) = pick(store, i) {
                    store.flip(id);
                }
            }
            Op::Remove(i) => {
                if let Some(id) = pick(store, i) {
                    store.remove(id);
                }
            }
            Op::Clear => {
                store.clear();
            }
        }
    }

    proptest! {
        #[test]
        fn instance_ids_stay_unique(ops in prop::collection::vec(op(), 0..40)) {
            let mut store = PlacementStore::new();
            for op in &ops {
                apply(&mut store, op);
                let ids: HashSet<_> = store.cards().iter().map(|c| c.instance_id).collect();
                prop_assert_eq!(ids.len(), store.len());
            }
        }

        #[test]
        fn undo_then_redo_restores_each_step(ops in prop::collection::vec(op(), 1..25)) {
            let mut store = PlacementStore::new();
            for op in &ops {
                let before = store.cards().to_vec();
                let revision = store.revision();
                apply(&mut store, op);
                if store.revision() == revision {
                    continue;
                }
                let after = store.cards().to_vec();
                prop_assert!(store.undo());
                prop_assert_eq!(store.cards(), before.as_slice());
                prop_assert!(store.redo());
                prop_assert_eq!(store.cards(), after.as_slice());
            }
        }
    }
}
