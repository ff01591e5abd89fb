//! Decks the palette can draw cards from.

use crate::types::{AiConfig, Card, CustomDeck, DeckStyle};
use std::collections::HashMap;

/// Deck whose card images follow the configured [`DeckStyle`].
pub const MAJOR_ARCANA_DECK_ID: &str = "major-arcana";

/// The Major Arcana stored as an editable deck in the settings.
pub const STANDARD_DECK_ID: &str = "major-arcana-standard";

const MAJOR_ARCANA: [(&str, &str, &str); 22] = [
    ("0", "The Fool", "Beginnings, spontaneity, faith."),
    ("1", "The Magician", "Manifestation, power, action."),
    ("2", "The High Priestess", "Intuition, mystery, wisdom."),
    ("3", "The Empress", "Fertility, nature, abundance."),
    ("4", "The Emperor", "Authority, structure, control."),
    ("5", "The Hierophant", "Tradition, belief, conformity."),
    ("6", "The Lovers", "Love, union, choices."),
    ("7", "The Chariot", "Control, willpower, victory."),
    ("8", "Strength", "Courage, compassion, focus."),
    ("9", "The Hermit", "Introspection, searching, solitude."),
    ("10", "Wheel of Fortune", "Change, cycles, fate."),
    ("11", "Justice", "Truth, cause and effect, law."),
    ("12", "The Hanged Man", "Sacrifice, release, new perspectives."),
    ("13", "Death", "Endings, transformation, transition."),
    ("14", "Temperance", "Balance, moderation, patience."),
    ("15", "The Devil", "Attachment, materialism, shadow."),
    ("16", "The Tower", "Sudden change, revelation, chaos."),
    ("17", "The Star", "Hope, faith, purpose."),
    ("18", "The Moon", "Illusion, fear, the subconscious."),
    ("19", "The Sun", "Joy, success, celebration."),
    ("20", "Judgement", "Rebirth, calling, absolution."),
    ("21", "The World", "Completion, fulfilment, travel."),
];

/// Source of card lists, keyed by deck id.
pub trait DeckCatalog {
    /// Cards of a deck, with images resolved. Unknown decks are empty.
    fn list_cards(&self, deck_id: &str) -> Vec<Card>;

    /// `(id, name)` of every deck on offer.
    fn decks(&self) -> Vec<(String, String)>;
}

/// The 22 Major Arcana without images.
pub fn major_arcana() -> Vec<Card> {
    MAJOR_ARCANA
        .iter()
        .map(|(id, name, description)| Card::new(*id, *name, *description))
        .collect()
}

/// Image for a card: the user's upload if there is one, else a placeholder seeded by style.
pub fn image_url(card_id: &str, style: DeckStyle, custom_images: &HashMap<String, String>) -> String {
    if let Some(custom) = custom_images.get(card_id) {
        return custom.clone();
    }
    format!(
        "https://picsum.photos/seed/{}{}/300/500",
        style.seed_prefix(),
        card_id
    )
}

/// The Major Arcana as an editable deck with classic images.
pub fn standard_deck() -> CustomDeck {
    let no_uploads = HashMap::new();
    CustomDeck {
        id: STANDARD_DECK_ID.to_string(),
        name: "Major Arcana (Standard)".to_string(),
        cards: major_arcana()
            .into_iter()
            .map(|mut card| {
                card.image = Some(image_url(&card.id, DeckStyle::Classic, &no_uploads));
                card
            })
            .collect(),
    }
}

/// Puts the standard deck first in the settings if it is missing. Returns true if added.
pub fn ensure_standard_deck(config: &mut AiConfig) -> bool {
    if config.custom_decks.iter().any(|d| d.id == STANDARD_DECK_ID) {
        return false;
    }
    log::info!("Adding standard deck to settings");
    config.custom_decks.insert(0, standard_deck());
    true
}

/// Case-insensitive name filter for the palette search box.
pub fn filter_by_name<'a>(cards: &'a [Card], term: &str) -> Vec<&'a Card> {
    let term = term.to_lowercase();
    cards
        .iter()
        .filter(|card| card.name.to_lowercase().contains(&term))
        .collect()
}

/// Decks available under the current settings.
#[derive(Debug, Clone, Copy)]
pub struct DeckLibrary<'a> {
    config: &'a AiConfig,
}

impl<'a> DeckLibrary<'a> {
    /// Creates a view over the settings' style, uploads and custom decks.
    pub fn new(config: &'a AiConfig) -> Self {
        Self { config }
    }
}

impl DeckCatalog for DeckLibrary<'_> {
    fn list_cards(&self, deck_id: &str) -> Vec<Card> {
        let style = self.config.deck_style;
        let uploads = &self.config.custom_card_images;
        if deck_id == MAJOR_ARCANA_DECK_ID {
            return major_arcana()
                .into_iter()
                .map(|mut card| {
                    card.image = Some(image_url(&card.id, style, uploads));
                    card
                })
                .collect();
        }

        let Some(deck) = self.config.custom_decks.iter().find(|d| d.id == deck_id) else {
            log::warn!("Unknown deck {deck_id}");
            return Vec::new();
        };
        deck.cards
            .iter()
            .map(|card| {
                let mut card = card.clone();
                if card.image.as_deref().map_or(true, str::is_empty) {
                    card.image = Some(image_url(&card.id, style, uploads));
                }
                card
            })
            .collect()
    }

    fn decks(&self) -> Vec<(String, String)> {
        std::iter::once((MAJOR_ARCANA_DECK_ID.to_string(), "Major Arcana".to_string()))
            .chain(
                self.config
                    .custom_decks
                    .iter()
                    .map(|d| (d.id.clone(), d.name.clone())),
            )
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_major_arcana_has_22_distinct_cards() {
        let cards = major_arcana();
        assert_eq!(cards.len(), 22);
        assert_eq!(cards[0].name, "The Fool");
        assert_eq!(cards[21].id, "21");
    }

    #[test]
    fn test_image_url_prefers_upload() {
        let mut uploads = HashMap::new();
        uploads.insert("3".to_string(), "data:image/png;base64,AAAA".to_string());

        assert_eq!(image_url("3", DeckStyle::Dark, &uploads), "data:image/png;base64,AAAA");
        assert_eq!(
            image_url("4", DeckStyle::Dark, &uploads),
            "https://picsum.photos/seed/darkfantasy4/300/500"
        );
    }

    #[test]
    fn test_ensure_standard_deck_only_once() {
        let mut config = AiConfig::default();
        config.custom_decks.push(CustomDeck {
            id: "mine".into(),
            name: "Mine".into(),
            cards: Vec::new(),
        });

        assert!(ensure_standard_deck(&mut config));
        assert!(!ensure_standard_deck(&mut config));
        assert_eq!(config.custom_decks.len(), 2);
        assert_eq!(config.custom_decks[0].id, STANDARD_DECK_ID);
        assert_eq!(
            config.custom_decks[0].cards[1].image.as_deref(),
            Some("https://picsum.photos/seed/tarot1/300/500")
        );
    }

    #[test]
    fn test_library_resolves_style_images() {
        let config = AiConfig {
            deck_style: DeckStyle::Mystic,
            ..Default::default()
        };
        let cards = DeckLibrary::new(&config).list_cards(MAJOR_ARCANA_DECK_ID);
        assert_eq!(
            cards[2].image.as_deref(),
            Some("https://picsum.photos/seed/mystic2/300/500")
        );
    }

    #[test]
    fn test_library_custom_deck_keeps_own_images() {
        let mut config = AiConfig::default();
        let mut with_image = Card::new("a", "Ace", "");
        with_image.image = Some("https://example.org/ace.png".into());
        config.custom_decks.push(CustomDeck {
            id: "mine".into(),
            name: "Mine".into(),
            cards: vec![with_image, Card::new("b", "Bee", "")],
        });

        let library = DeckLibrary::new(&config);
        let cards = library.list_cards("mine");
        assert_eq!(cards[0].image.as_deref(), Some("https://example.org/ace.png"));
        assert_eq!(cards[1].image.as_deref(), Some("https://picsum.photos/seed/tarotb/300/500"));
        assert!(library.list_cards("missing").is_empty());
        assert_eq!(library.decks().len(), 2);
    }

    #[test]
    fn test_filter_by_name_ignores_case() {
        let cards = major_arcana();
        let found: Vec<_> = filter_by_name(&cards, "the s").iter().map(|c| c.id.as_str()).collect();
        assert_eq!(found, vec!["17", "19"]);
    }
}
