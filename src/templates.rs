//! Spread templates: the built-in layouts, the user's custom layouts and presets, and
//! the draft edited by the layout builder.

use crate::types::{Slot, SlotConnection, SlotCoord, SpreadTemplate};
use eframe::egui::{Pos2, Rect};
use std::sync::OnceLock;
use thiserror::Error;
use uuid::Uuid;

/// Id of the slot-less template that disables snapping.
pub const FREE_TEMPLATE_ID: &str = "free";

/// Problems creating or deleting a template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// The layout needs a name
    #[error("a layout needs a name")]
    EmptyName,
    /// The layout needs at least one slot
    #[error("a layout needs at least one slot")]
    NoSlots,
    /// A slot id does not exist in the draft
    #[error("unknown slot {0}")]
    UnknownSlot(String),
    /// A connection would link a slot to itself
    #[error("a slot cannot be linked to itself")]
    SelfConnection,
    /// Linking was requested with no slot selected
    #[error("select a slot before creating a connection")]
    NothingSelected,
    /// Built-in templates cannot be deleted
    #[error("built-in layout {0} cannot be deleted")]
    BuiltIn(String),
    /// No custom template or preset has this id
    #[error("no layout with id {0}")]
    NotFound(String),
}

fn template(id: &str, name: &str, description: &str, slots: Vec<Slot>) -> SpreadTemplate {
    SpreadTemplate {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        slots,
        connections: Vec::new(),
        is_custom: false,
    }
}

/// The built-in templates, in menu order. The free template always comes first.
pub fn builtin_templates() -> &'static [SpreadTemplate] {
    static BUILT_INS: OnceLock<Vec<SpreadTemplate>> = OnceLock::new();
    BUILT_INS.get_or_init(|| {
        vec![
            template(
                FREE_TEMPLATE_ID,
                "Free Style",
                "No fixed positions. Drag cards wherever you like.",
                Vec::new(),
            ),
            template(
                "three_card",
                "Three Card Spread",
                "Past, Present and Future.",
                vec![
                    Slot::percent("past", "Past", 20.0, 50.0),
                    Slot::percent("present", "Present", 50.0, 50.0),
                    Slot::percent("future", "Future", 80.0, 50.0),
                ],
            ),
            template(
                "cross",
                "Simple Cross",
                "An expanded view of the moment.",
                vec![
                    Slot::percent("center", "The Core", 50.0, 50.0),
                    Slot::percent("left", "Influence 1", 25.0, 50.0),
                    Slot::percent("right", "Influence 2", 75.0, 50.0),
                    Slot::percent("top", "Conscious", 50.0, 20.0),
                    Slot::percent("bottom", "Unconscious", 50.0, 80.0),
                ],
            ),
            template(
                "celtic_cross",
                "Celtic Cross",
                "A deep reading with the ten traditional positions.",
                vec![
                    Slot::percent("1", "1. The Core", 40.0, 50.0),
                    Slot::percent("2", "2. Obstacle", 42.0, 52.0),
                    Slot::percent("3", "3. The Foundation", 40.0, 80.0),
                    Slot::percent("4", "4. Past", 20.0, 50.0),
                    Slot::percent("5", "5. The Crown", 40.0, 20.0),
                    Slot::percent("6", "6. Future", 60.0, 50.0),
                    Slot::percent("7", "7. Self", 85.0, 85.0),
                    Slot::percent("8", "8. Environment", 85.0, 65.0),
                    Slot::percent("9", "9. Hopes", 85.0, 45.0),
                    Slot::percent("10", "10. Outcome", 85.0, 25.0),
                ],
            ),
            template(
                "pearls_destiny",
                "Pearls of Destiny",
                "A ten card journey revealing the awakening, the path and the missing link.",
                vec![
                    Slot::percent("1", "1. The Awakening", 20.0, 80.0),
                    Slot::percent("2", "2. The Journey", 50.0, 80.0),
                    Slot::percent("3", "3. The Portal", 80.0, 80.0),
                    Slot::percent("4", "4. Inner Wisdom", 20.0, 50.0),
                    Slot::percent("5", "5. Outer Reflection", 80.0, 50.0),
                    Slot::percent("6", "6. The Promise", 20.0, 20.0),
                    Slot::percent("7", "7. The Lesson", 80.0, 20.0),
                    Slot::percent("8", "8. Imminent Present", 40.0, 15.0),
                    Slot::percent("9", "9. Distant Future", 60.0, 15.0),
                    Slot::percent("10", "10. The Missing Link", 50.0, 45.0),
                ],
            ),
        ]
    })
}

/// Looks up a built-in template.
pub fn builtin(id: &str) -> Option<&'static SpreadTemplate> {
    builtin_templates().iter().find(|t| t.id == id)
}

/// The free template.
pub fn free_template() -> &'static SpreadTemplate {
    &builtin_templates()[0]
}

/// Built-in and custom templates, the builder's presets, and the active selection.
#[derive(Debug, Clone)]
pub struct TemplateRegistry {
    custom: Vec<SpreadTemplate>,
    presets: Vec<SpreadTemplate>,
    active_id: String,
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::new(Vec::new(), Vec::new())
    }
}

impl TemplateRegistry {
    /// Creates a registry with previously saved custom layouts and presets. Free mode is active.
    pub fn new(custom: Vec<SpreadTemplate>, presets: Vec<SpreadTemplate>) -> Self {
        let custom = custom
            .into_iter()
            .filter(|t| {
                let clashes = builtin(&t.id).is_some();
                if clashes {
                    log::warn!("Ignoring stored layout {} that shadows a built-in", t.id);
                }
                !clashes
            })
            .map(|mut t| {
                t.is_custom = true;
                t
            })
            .collect();
        Self {
            custom,
            presets,
            active_id: FREE_TEMPLATE_ID.to_string(),
        }
    }

    /// Every selectable template, built-ins first.
    pub fn all(&self) -> impl Iterator<Item = &SpreadTemplate> {
        builtin_templates().iter().chain(self.custom.iter())
    }

    /// User-authored layouts.
    pub fn custom(&self) -> &[SpreadTemplate] {
        &self.custom
    }

    /// Saved builder presets.
    pub fn presets(&self) -> &[SpreadTemplate] {
        &self.presets
    }

    /// Finds a template by id.
    pub fn get(&self, id: &str) -> Option<&SpreadTemplate> {
        self.all().find(|t| t.id == id)
    }

    /// The active template, falling back to free mode.
    pub fn active(&self) -> &SpreadTemplate {
        self.get(&self.active_id).unwrap_or_else(|| free_template())
    }

    /// Id of the active template.
    pub fn active_id(&self) -> &str {
        &self.active().id
    }

    /// Selects a template. Unknown ids select free mode; returns whether `id` was found.
    pub fn select(&mut self, id: &str) -> bool {
        if self.get(id).is_some() {
            self.active_id = id.to_string();
            true
        } else {
            log::warn!("Unknown layout {id}, falling back to free mode");
            self.active_id = FREE_TEMPLATE_ID.to_string();
            false
        }
    }

    /// Stores a new custom layout under a fresh id and returns that id.
    pub fn add_custom(&mut self, mut template: SpreadTemplate) -> String {
        template.id = format!("custom-{}", Uuid::new_v4());
        template.is_custom = true;
        let id = template.id.clone();
        log::info!("Created layout {} ({id})", template.name);
        self.custom.push(template);
        id
    }

    /// Deletes a custom layout. Deleting the active layout selects free mode.
    pub fn delete_custom(&mut self, id: &str) -> Result<SpreadTemplate, TemplateError> {
        if builtin(id).is_some() {
            return Err(TemplateError::BuiltIn(id.to_string()));
        }
        let index = self
            .custom
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| TemplateError::NotFound(id.to_string()))?;
        let removed = self.custom.remove(index);
        if self.active_id == id {
            self.active_id = FREE_TEMPLATE_ID.to_string();
        }
        log::info!("Deleted layout {} ({id})", removed.name);
        Ok(removed)
    }

    /// Stores a builder preset.
    pub fn add_preset(&mut self, preset: SpreadTemplate) {
        self.presets.push(preset);
    }

    /// Deletes a builder preset.
    pub fn delete_preset(&mut self, id: &str) -> Result<SpreadTemplate, TemplateError> {
        let index = self
            .presets
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| TemplateError::NotFound(id.to_string()))?;
        Ok(self.presets.remove(index))
    }
}

/// A layout being authored in the builder.
///
/// Slot positions are kept as percentages of the builder area so the finished layout
/// scales with the table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayoutDraft {
    /// Layout name
    pub name: String,
    /// Layout description
    pub description: String,
    slots: Vec<Slot>,
    connections: Vec<SlotConnection>,
    selected: Option<String>,
    linking_from: Option<String>,
}

impl LayoutDraft {
    /// Creates an empty draft.
    pub fn new() -> Self {
        Self::default()
    }

    /// Slots in list order.
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Connections in creation order.
    pub fn connections(&self) -> &[SlotConnection] {
        &self.connections
    }

    /// The selected slot id.
    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Whether the next slot click completes a connection.
    pub fn is_linking(&self) -> bool {
        self.linking_from.is_some()
    }

    /// Appends a slot in the middle of the area and selects it.
    pub fn add_slot(&mut self) -> String {
        let id = format!("slot-{}", Uuid::new_v4());
        self.slots.push(Slot::percent(
            id.clone(),
            format!("Position {}", self.slots.len() + 1),
            50.0,
            50.0,
        ));
        self.selected = Some(id.clone());
        id
    }

    /// Removes a slot together with every connection touching it.
    pub fn remove_slot(&mut self, id: &str) -> Result<(), TemplateError> {
        let index = self.index_of(id)?;
        self.slots.remove(index);
        self.connections.retain(|c| !c.touches(id));
        if self.selected.as_deref() == Some(id) {
            self.selected = None;
        }
        if self.linking_from.as_deref() == Some(id) {
            self.linking_from = None;
        }
        Ok(())
    }

    /// Renames a slot.
    pub fn rename_slot(&mut self, id: &str, label: impl Into<String>) -> Result<(), TemplateError> {
        let index = self.index_of(id)?;
        self.slots[index].label = label.into();
        Ok(())
    }

    /// Moves a slot to a point of the builder area, clamped inside it and stored as
    /// percentages rounded to one decimal.
    pub fn place_slot(&mut self, id: &str, point: Pos2, area: Rect) -> Result<(), TemplateError> {
        let index = self.index_of(id)?;
        if area.width() <= 0.0 || area.height() <= 0.0 {
            return Ok(());
        }
        let clamped = area.clamp(point);
        let percent = |offset: f32, extent: f32| (offset / extent * 1000.0).round() / 10.0;
        let slot = &mut self.slots[index];
        slot.x = SlotCoord::Percent(percent(clamped.x - area.min.x, area.width()));
        slot.y = SlotCoord::Percent(percent(clamped.y - area.min.y, area.height()));
        Ok(())
    }

    /// Moves the slot at `from` to position `to` in the list.
    pub fn reorder(&mut self, from: usize, to: usize) {
        if from == to || from >= self.slots.len() || to >= self.slots.len() {
            return;
        }
        let slot = self.slots.remove(from);
        self.slots.insert(to, slot);
    }

    /// Starts a connection from the selected slot.
    pub fn start_linking(&mut self) -> Result<(), TemplateError> {
        let selected = self.selected.clone().ok_or(TemplateError::NothingSelected)?;
        self.linking_from = Some(selected);
        Ok(())
    }

    /// Abandons a connection in progress.
    pub fn cancel_linking(&mut self) {
        self.linking_from = None;
    }

    /// Handles a click on a slot: completes a pending link to another slot, or selects it.
    pub fn click_slot(&mut self, id: &str) -> Result<(), TemplateError> {
        self.index_of(id)?;
        match self.linking_from.clone() {
            Some(from) if from == id => Err(TemplateError::SelfConnection),
            Some(from) => {
                if !self.connections.iter().any(|c| c.links(&from, id)) {
                    self.connections.push(SlotConnection::new(from, id));
                }
                self.linking_from = None;
                Ok(())
            }
            None => {
                self.selected = Some(id.to_string());
                Ok(())
            }
        }
    }

    /// Removes the connection at `index`.
    pub fn remove_connection(&mut self, index: usize) {
        if index < self.connections.len() {
            self.connections.remove(index);
        }
    }

    /// Validates the draft and produces a custom template. The registry assigns its id.
    pub fn build(&self) -> Result<SpreadTemplate, TemplateError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(TemplateError::EmptyName);
        }
        if self.slots.is_empty() {
            return Err(TemplateError::NoSlots);
        }
        Ok(SpreadTemplate {
            id: String::new(),
            name: name.to_string(),
            description: self.description.clone(),
            slots: self.slots.clone(),
            connections: self.connections.clone(),
            is_custom: true,
        })
    }

    /// Produces a preset holding the draft's slots (connections are not kept).
    pub fn save_as_preset(&self, name: &str) -> Result<SpreadTemplate, TemplateError> {
        if self.slots.is_empty() {
            return Err(TemplateError::NoSlots);
        }
        let name = name.trim();
        if name.is_empty() {
            return Err(TemplateError::EmptyName);
        }
        Ok(SpreadTemplate {
            id: format!("preset-{}", Uuid::new_v4()),
            name: name.to_string(),
            description: "Preset saved by the user".to_string(),
            slots: self.slots.clone(),
            connections: Vec::new(),
            is_custom: true,
        })
    }

    /// Replaces the draft's slots with copies of a preset's, under fresh ids.
    pub fn load_preset(&mut self, preset: &SpreadTemplate) {
        self.slots = preset
            .slots
            .iter()
            .map(|slot| Slot {
                id: format!("slot-{}", Uuid::new_v4()),
                ..slot.clone()
            })
            .collect();
        self.connections.clear();
        self.selected = None;
        self.linking_from = None;
        if self.name.trim().is_empty() {
            self.name = format!("{} (Copy)", preset.name);
        }
    }

    fn index_of(&self, id: &str) -> Result<usize, TemplateError> {
        self.slots
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| TemplateError::UnknownSlot(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eframe::egui::vec2;

    #[test]
    fn test_free_template_is_first_and_has_no_slots() {
        let free = free_template();
        assert_eq!(free.id, FREE_TEMPLATE_ID);
        assert!(free.is_free());
        assert_eq!(builtin_templates()[0].id, FREE_TEMPLATE_ID);
    }

    #[test]
    fn test_builtin_slot_ids_are_unique() {
        for template in builtin_templates() {
            let mut ids: Vec<_> = template.slots.iter().map(|s| s.id.as_str()).collect();
            ids.sort();
            ids.dedup();
            assert_eq!(ids.len(), template.slots.len(), "{}", template.id);
        }
    }

    #[test]
    fn test_unknown_selection_falls_back_to_free() {
        let mut registry = TemplateRegistry::default();
        assert!(registry.select("cross"));
        assert_eq!(registry.active_id(), "cross");

        assert!(!registry.select("no-such-layout"));
        assert_eq!(registry.active_id(), FREE_TEMPLATE_ID);
    }

    #[test]
    fn test_custom_layouts_get_fresh_ids() {
        let mut registry = TemplateRegistry::default();
        let mut draft = LayoutDraft::new();
        draft.name = "Mine".into();
        draft.add_slot();
        let template = draft.build().unwrap();

        let first = registry.add_custom(template.clone());
        let second = registry.add_custom(template);
        assert_ne!(first, second);
        assert!(first.starts_with("custom-"));
        assert_eq!(registry.custom().len(), 2);
        assert!(registry.get(&first).unwrap().is_custom);
    }

    #[test]
    fn test_deleting_active_custom_layout_selects_free() {
        let mut registry = TemplateRegistry::default();
        let mut draft = LayoutDraft::new();
        draft.name = "Mine".into();
        draft.add_slot();
        let id = registry.add_custom(draft.build().unwrap());
        registry.select(&id);

        registry.delete_custom(&id).unwrap();
        assert_eq!(registry.active_id(), FREE_TEMPLATE_ID);
        assert!(registry.get(&id).is_none());
    }

    #[test]
    fn test_deleting_inactive_layout_keeps_selection() {
        let mut registry = TemplateRegistry::default();
        let mut draft = LayoutDraft::new();
        draft.name = "Mine".into();
        draft.add_slot();
        let id = registry.add_custom(draft.build().unwrap());
        registry.select("three_card");

        registry.delete_custom(&id).unwrap();
        assert_eq!(registry.active_id(), "three_card");
    }

    #[test]
    fn test_builtins_cannot_be_deleted() {
        let mut registry = TemplateRegistry::default();
        assert_eq!(
            registry.delete_custom(FREE_TEMPLATE_ID),
            Err(TemplateError::BuiltIn(FREE_TEMPLATE_ID.to_string()))
        );
        assert!(registry.get(FREE_TEMPLATE_ID).is_some());
    }

    #[test]
    fn test_stored_layout_shadowing_builtin_is_ignored() {
        let mut shadow = builtin("cross").unwrap().clone();
        shadow.name = "Impostor".into();
        let registry = TemplateRegistry::new(vec![shadow], Vec::new());
        assert!(registry.custom().is_empty());
        assert_eq!(registry.get("cross").unwrap().name, "Simple Cross");
    }

    #[test]
    fn test_draft_requires_name_and_slots() {
        let mut draft = LayoutDraft::new();
        assert_eq!(draft.build(), Err(TemplateError::EmptyName));
        draft.name = "  Spread ".into();
        assert_eq!(draft.build(), Err(TemplateError::NoSlots));
        draft.add_slot();
        assert_eq!(draft.build().unwrap().name, "Spread");
    }

    #[test]
    fn test_removing_slot_drops_its_connections() {
        let mut draft = LayoutDraft::new();
        let a = draft.add_slot();
        let b = draft.add_slot();
        let c = draft.add_slot();
        draft.click_slot(&a).unwrap();
        draft.start_linking().unwrap();
        draft.click_slot(&b).unwrap();
        draft.click_slot(&b).unwrap();
        draft.start_linking().unwrap();
        draft.click_slot(&c).unwrap();
        assert_eq!(draft.connections().len(), 2);

        draft.remove_slot(&b).unwrap();
        assert!(draft.connections().is_empty());
        assert_eq!(draft.slots().len(), 2);
    }

    #[test]
    fn test_linking_needs_selection_and_distinct_slot() {
        let mut draft = LayoutDraft::new();
        assert_eq!(draft.start_linking(), Err(TemplateError::NothingSelected));

        let a = draft.add_slot();
        draft.start_linking().unwrap();
        assert_eq!(draft.click_slot(&a), Err(TemplateError::SelfConnection));
        assert!(draft.is_linking());
    }

    #[test]
    fn test_duplicate_link_in_reverse_is_not_added() {
        let mut draft = LayoutDraft::new();
        let a = draft.add_slot();
        let b = draft.add_slot();
        draft.click_slot(&a).unwrap();
        draft.start_linking().unwrap();
        draft.click_slot(&b).unwrap();
        draft.click_slot(&b).unwrap();
        draft.start_linking().unwrap();
        draft.click_slot(&a).unwrap();
        assert_eq!(draft.connections().len(), 1);
    }

    #[test]
    fn test_place_slot_clamps_and_rounds() {
        let mut draft = LayoutDraft::new();
        let id = draft.add_slot();
        let area = Rect::from_min_size(Pos2::new(100.0, 100.0), vec2(300.0, 200.0));

        draft.place_slot(&id, Pos2::new(200.0, 1000.0), area).unwrap();
        let slot = &draft.slots()[0];
        assert_eq!(slot.x, SlotCoord::Percent(33.3));
        assert_eq!(slot.y, SlotCoord::Percent(100.0));
    }

    #[test]
    fn test_reorder_moves_slot() {
        let mut draft = LayoutDraft::new();
        let a = draft.add_slot();
        let _b = draft.add_slot();
        let c = draft.add_slot();
        draft.reorder(2, 0);
        assert_eq!(draft.slots()[0].id, c);
        assert_eq!(draft.slots()[1].id, a);
        draft.reorder(0, 7);
        assert_eq!(draft.slots()[0].id, c);
    }

    #[test]
    fn test_preset_round_trip_uses_fresh_ids() {
        let mut draft = LayoutDraft::new();
        draft.add_slot();
        draft.add_slot();
        let preset = draft.save_as_preset("Two").unwrap();
        assert!(preset.connections.is_empty());

        let mut other = LayoutDraft::new();
        other.load_preset(&preset);
        assert_eq!(other.slots().len(), 2);
        assert_eq!(other.name, "Two (Copy)");
        assert!(other
            .slots()
            .iter()
            .all(|s| preset.slots.iter().all(|p| p.id != s.id)));
    }

    #[test]
    fn test_presets_can_be_deleted() {
        let mut registry = TemplateRegistry::default();
        let mut draft = LayoutDraft::new();
        draft.add_slot();
        let preset = draft.save_as_preset("P").unwrap();
        let id = preset.id.clone();
        registry.add_preset(preset);
        assert_eq!(registry.presets().len(), 1);
        registry.delete_preset(&id).unwrap();
        assert!(registry.presets().is_empty());
        assert!(registry.delete_preset(&id).is_err());
    }
}
