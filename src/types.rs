//! Core data types for the tarot canvas.
//!
//! This module defines the catalog cards, the placements materialized on the table,
//! spread templates with their slots and connections, and the client/reading records
//! managed by the session.

use crate::constants::{CARD_HEIGHT, CARD_WIDTH, ROTATION_STEP};
use chrono::{DateTime, Utc};
use eframe::egui::{Pos2, Rect, Vec2};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Unique identifier of one card instance on the table.
pub type InstanceId = Uuid;

/// A card as listed by a deck. Placements reference it, never mutate it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    /// Catalog identifier, shared by every placement of this card
    pub id: String,
    /// Display name
    pub name: String,
    /// Short meaning, also used as context for the interpretation
    pub description: String,
    /// Base image, when the deck supplies one
    #[serde(default)]
    pub image: Option<String>,
}

impl Card {
    /// Creates a catalog card without an image.
    pub fn new(id: impl Into<String>, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            image: None,
        }
    }
}

/// A card instance positioned on the canvas.
///
/// `(x, y)` is the top-left corner in unscaled canvas space; it does not depend on the
/// current pan or zoom.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedCard {
    /// Unique per placement, so the same card can lie on the table several times
    pub instance_id: InstanceId,
    /// Catalog id of the card
    pub card_id: String,
    /// Display name copied from the catalog
    pub name: String,
    /// Meaning copied from the catalog
    pub description: String,
    /// Left edge in canvas space
    pub x: f32,
    /// Top edge in canvas space
    pub y: f32,
    /// Rotation in degrees, one of 0, 45, ..., 315
    #[serde(default)]
    pub rotation: u16,
    /// Whether the card lies upside down
    #[serde(default)]
    pub is_reversed: bool,
    /// Resolved image URL or data URL
    #[serde(default)]
    pub image: String,
}

impl PlacedCard {
    /// Materializes a catalog card at the given top-left position with a fresh instance id.
    pub fn from_card(card: &Card, top_left: Pos2) -> Self {
        Self {
            instance_id: Uuid::new_v4(),
            card_id: card.id.clone(),
            name: card.name.clone(),
            description: card.description.clone(),
            x: top_left.x,
            y: top_left.y,
            rotation: 0,
            is_reversed: false,
            image: card.image.clone().unwrap_or_default(),
        }
    }

    /// Top-left corner in canvas space.
    pub fn position(&self) -> Pos2 {
        Pos2::new(self.x, self.y)
    }

    /// Center of the card's footprint in canvas space.
    pub fn center(&self) -> Pos2 {
        self.position() + card_size() / 2.0
    }

    /// The card's footprint rectangle in canvas space.
    pub fn footprint(&self) -> Rect {
        Rect::from_min_size(self.position(), card_size())
    }

    /// Rotation after one more clockwise step.
    pub fn next_rotation(&self) -> u16 {
        (normalize_rotation(self.rotation) + ROTATION_STEP) % 360
    }
}

/// Brings any angle onto the rotation steps: below 360 and a multiple of
/// [`ROTATION_STEP`], rounding down.
pub fn normalize_rotation(degrees: u16) -> u16 {
    degrees % 360 / ROTATION_STEP * ROTATION_STEP
}

/// Size of every card on the table, in canvas units.
pub fn card_size() -> Vec2 {
    Vec2::new(CARD_WIDTH, CARD_HEIGHT)
}

/// Partial update of a placement's orientation fields.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CardPatch {
    /// New rotation in degrees
    pub rotation: Option<u16>,
    /// New reversal state
    pub is_reversed: Option<bool>,
}

impl CardPatch {
    /// Merges the patch into a placement.
    pub fn apply(&self, card: &mut PlacedCard) {
        if let Some(rotation) = self.rotation {
            card.rotation = normalize_rotation(rotation);
        }
        if let Some(reversed) = self.is_reversed {
            card.is_reversed = reversed;
        }
    }
}

/// One coordinate of a slot: either relative to the canvas extent or absolute.
///
/// Serialized the way stored layouts spell it: `"20%"` for percentages and a bare
/// number for pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoord", into = "RawCoord")]
pub enum SlotCoord {
    /// Percentage of the canvas width or height
    Percent(f32),
    /// Absolute canvas pixels
    Pixels(f32),
}

impl SlotCoord {
    /// Resolves the coordinate against the canvas extent along its axis.
    pub fn resolve(self, extent: f32) -> f32 {
        match self {
            SlotCoord::Percent(p) => p / 100.0 * extent,
            SlotCoord::Pixels(px) => px,
        }
    }
}

impl fmt::Display for SlotCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotCoord::Percent(p) => write!(f, "{p}%"),
            SlotCoord::Pixels(px) => write!(f, "{px}px"),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawCoord {
    Number(f32),
    Text(String),
}

impl TryFrom<RawCoord> for SlotCoord {
    type Error = String;

    fn try_from(raw: RawCoord) -> Result<Self, Self::Error> {
        match raw {
            RawCoord::Number(px) => Ok(SlotCoord::Pixels(px)),
            RawCoord::Text(text) => {
                let text = text.trim();
                if let Some(percent) = text.strip_suffix('%') {
                    percent
                        .trim()
                        .parse()
                        .map(SlotCoord::Percent)
                        .map_err(|e| format!("invalid percentage {text:?}: {e}"))
                } else {
                    text.trim_end_matches("px")
                        .parse()
                        .map(SlotCoord::Pixels)
                        .map_err(|e| format!("invalid slot coordinate {text:?}: {e}"))
                }
            }
        }
    }
}

impl From<SlotCoord> for RawCoord {
    fn from(coord: SlotCoord) -> Self {
        match coord {
            SlotCoord::Percent(p) => RawCoord::Text(format!("{p}%")),
            SlotCoord::Pixels(px) => RawCoord::Number(px),
        }
    }
}

/// A named target position of a spread template. The position is the slot's center.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    /// Identifier, unique within its template
    pub id: String,
    /// Position name shown on the table ("Past", "The Crown", ...)
    pub label: String,
    /// Horizontal center
    pub x: SlotCoord,
    /// Vertical center
    pub y: SlotCoord,
}

impl Slot {
    /// Creates a slot positioned by percentages of the canvas.
    pub fn percent(id: impl Into<String>, label: impl Into<String>, x: f32, y: f32) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            x: SlotCoord::Percent(x),
            y: SlotCoord::Percent(y),
        }
    }

    /// Slot center in canvas pixels for a canvas of the given unscaled size.
    pub fn center(&self, canvas_size: Vec2) -> Pos2 {
        Pos2::new(self.x.resolve(canvas_size.x), self.y.resolve(canvas_size.y))
    }
}

/// An advisory, unordered link between two slots of a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotConnection {
    /// One end
    pub from: String,
    /// The other end
    pub to: String,
}

impl SlotConnection {
    /// Creates a connection between two slot ids.
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }

    /// Whether the connection links `a` and `b`, in either direction.
    pub fn links(&self, a: &str, b: &str) -> bool {
        (self.from == a && self.to == b) || (self.from == b && self.to == a)
    }

    /// Whether either end is the given slot.
    pub fn touches(&self, slot_id: &str) -> bool {
        self.from == slot_id || self.to == slot_id
    }
}

/// A named spread layout. A template without slots is free mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpreadTemplate {
    /// Identifier; built-ins use fixed ids, custom layouts `custom-<uuid>`
    pub id: String,
    /// Display name
    pub name: String,
    /// Short description, also fed to the interpretation
    pub description: String,
    /// Ordered slots; order breaks snapping ties
    #[serde(default)]
    pub slots: Vec<Slot>,
    /// Links between slots
    #[serde(default)]
    pub connections: Vec<SlotConnection>,
    /// Whether the layout was authored by the user
    #[serde(default)]
    pub is_custom: bool,
}

impl SpreadTemplate {
    /// Whether the template disables snapping.
    pub fn is_free(&self) -> bool {
        self.slots.is_empty()
    }

    /// Looks up a slot by id.
    pub fn slot(&self, id: &str) -> Option<&Slot> {
        self.slots.iter().find(|s| s.id == id)
    }

    /// Connections whose ends both exist, paired with their slots.
    pub fn resolved_connections(&self) -> impl Iterator<Item = (&Slot, &Slot)> {
        self.connections
            .iter()
            .filter_map(|c| Some((self.slot(&c.from)?, self.slot(&c.to)?)))
    }
}

// --- Clients and readings ---

/// A client of the reader, with their reading history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    /// Identifier
    pub id: String,
    /// Full name
    pub name: String,
    /// Contact e-mail
    #[serde(default)]
    pub email: Option<String>,
    /// Free-form notes
    #[serde(default)]
    pub notes: Option<String>,
    /// Saved readings, newest first
    #[serde(default)]
    pub readings_history: Vec<SavedReading>,
}

impl Client {
    /// Creates a client with a fresh id and no readings.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            email: None,
            notes: None,
            readings_history: Vec::new(),
        }
    }
}

/// A reading saved for later: the table, the layout and the interpretation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedReading {
    /// Identifier
    pub id: String,
    /// When the reading was saved
    pub date: DateTime<Utc>,
    /// Session name or tag
    #[serde(default)]
    pub title: Option<String>,
    /// Layout display name at save time
    pub layout_name: String,
    /// Layout id at save time
    #[serde(default)]
    pub layout_id: Option<String>,
    /// The table
    pub cards: Vec<PlacedCard>,
    /// Interpretation text, if one was produced
    #[serde(default)]
    pub interpretation: Option<String>,
    /// Session configuration at save time
    #[serde(default)]
    pub ai_config_snapshot: Option<AiConfig>,
}

/// Anonymous reading kept when no client is selected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastState {
    /// The table
    pub cards: Vec<PlacedCard>,
    /// Active layout at save time
    #[serde(default)]
    pub layout_id: Option<String>,
    /// When it was saved
    pub date: DateTime<Utc>,
    /// Session configuration at save time
    #[serde(default)]
    pub ai_config_snapshot: Option<AiConfig>,
}

// --- Decks and interpretation configuration ---

/// Visual style of generated card images.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeckStyle {
    /// Traditional artwork
    #[default]
    Classic,
    /// Ethereal artwork
    Mystic,
    /// Dark fantasy artwork
    Dark,
    /// Abstract artwork
    Abstract,
}

impl DeckStyle {
    /// Every style, in menu order.
    pub const ALL: [DeckStyle; 4] = [
        DeckStyle::Classic,
        DeckStyle::Mystic,
        DeckStyle::Dark,
        DeckStyle::Abstract,
    ];

    /// Seed prefix of the generated placeholder images.
    pub fn seed_prefix(self) -> &'static str {
        match self {
            DeckStyle::Classic => "tarot",
            DeckStyle::Mystic => "mystic",
            DeckStyle::Dark => "darkfantasy",
            DeckStyle::Abstract => "abstractart",
        }
    }
}

/// A user deck (the standard Major Arcana deck is stored the same way).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomDeck {
    /// Identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Cards in palette order
    pub cards: Vec<Card>,
}

/// A reusable set of questions for a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionTemplate {
    /// Identifier
    pub id: String,
    /// Menu label
    pub label: String,
    /// Questions, one per line
    pub questions: String,
}

/// A document uploaded as extra context for the interpretation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextFile {
    /// File name
    pub name: String,
    /// Text content
    pub content: String,
}

/// Who wrote a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// The reader
    User,
    /// The interpretation service
    Model,
}

/// One message of the interpretation chat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Author
    pub role: ChatRole,
    /// Text
    pub message: String,
}

/// Page theme of the exported report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PdfTheme {
    /// White page
    #[default]
    Light,
    /// Dark page
    Dark,
}

/// Font family of the exported report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PdfFont {
    /// Serif
    #[default]
    Times,
    /// Sans-serif
    Helvetica,
    /// Monospace
    Courier,
}

/// Which sections the exported report contains and how it looks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfSettings {
    /// Page theme
    pub theme: PdfTheme,
    /// Base64 logo drawn next to the header
    pub logo_image: Option<String>,
    /// Report title
    pub header_text: String,
    /// Line under the title
    pub sub_header_text: Option<String>,
    /// Include the client's name
    pub show_client_name: bool,
    /// Include the export date
    pub show_date: bool,
    /// Include a picture of the table
    pub show_canvas_snapshot: bool,
    /// Include the interpretation text
    pub show_interpretation: bool,
    /// Include one block per card with its slot label
    pub show_individual_slots: bool,
    /// Text at the bottom of every page
    pub footer_text: String,
    /// Hex color for titles and rules
    pub accent_color: String,
    /// Font family
    pub font: PdfFont,
}

impl Default for PdfSettings {
    fn default() -> Self {
        Self {
            theme: PdfTheme::Light,
            logo_image: None,
            header_text: "Tarot Reading".to_string(),
            sub_header_text: Some("Mystic Guidance".to_string()),
            show_client_name: true,
            show_date: true,
            show_canvas_snapshot: true,
            show_interpretation: true,
            show_individual_slots: false,
            footer_text: "Generated by Tarot Canvas".to_string(),
            accent_color: "#D4AF37".to_string(),
            font: PdfFont::Times,
        }
    }
}

/// Interpretation and presentation settings of the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Overrides the default system instruction when not blank
    pub system_instruction: String,
    /// Extra documents given to the interpretation
    pub context_files: Vec<ContextFile>,
    /// Style of generated card images
    pub deck_style: DeckStyle,
    /// Card id to uploaded image
    pub custom_card_images: HashMap<String, String>,
    /// Tag for the next saved reading
    pub session_name: Option<String>,
    /// Decks shown in the palette
    pub custom_decks: Vec<CustomDeck>,
    /// Question sets offered for a session
    pub question_templates: Vec<QuestionTemplate>,
    /// Questions asked in this session
    pub session_questions: Option<String>,
    /// Report settings
    pub pdf_settings: PdfSettings,
    /// Follow-up conversation about the reading
    pub chat_history: Vec<ChatMessage>,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            system_instruction: String::new(),
            context_files: Vec::new(),
            deck_style: DeckStyle::Classic,
            custom_card_images: HashMap::new(),
            session_name: None,
            custom_decks: Vec::new(),
            question_templates: default_question_templates(),
            session_questions: None,
            pdf_settings: PdfSettings::default(),
            chat_history: Vec::new(),
        }
    }
}

/// Question sets available out of the box.
pub fn default_question_templates() -> Vec<QuestionTemplate> {
    let template = |id: &str, label: &str, questions: &str| QuestionTemplate {
        id: id.to_string(),
        label: label.to_string(),
        questions: questions.to_string(),
    };
    vec![
        template(
            "general",
            "General",
            "1. What is the querent's current situation?\n2. What is the greatest challenge right now?\n3. What is the best path forward?",
        ),
        template(
            "love",
            "Love",
            "1. How is the energy of the relationship?\n2. What does the querent need to learn about themselves in love?\n3. What is the likely future of this relationship?",
        ),
        template(
            "career",
            "Career",
            "1. What is the current professional potential?\n2. Are there hidden obstacles at work?\n3. Where should energy be focused to grow?",
        ),
        template(
            "decision",
            "Decision Making",
            "1. What happens if I choose option A?\n2. What happens if I choose option B?\n3. What advice does the universe offer for this choice?",
        ),
    ]
}
