//! # Tarot Canvas
//!
//! An interactive table for laying out tarot readings. Cards are dragged from a deck
//! palette onto a zoomable, pannable canvas and snap into the positions of a spread
//! layout such as the Celtic Cross.
//!
//! ## Features
//! - Free placement or snapping to the slots of built-in and custom spreads
//! - Undo/redo of every change to the table
//! - Flip, rotate and remove placed cards
//! - Layout builder with connections between positions
//! - Clients with saved readings, session files and reading reports
//! - Interpretation and follow-up chat through a pluggable service

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod catalog;
pub mod constants;
pub mod drag;
pub mod export;
pub mod geometry;
pub mod history;
pub mod interpretation;
pub mod persistence;
pub mod placement;
pub mod session;
pub mod templates;
pub mod types;
pub mod viewport;
mod ui;

// Re-export the data model
pub use types::*;
use persistence::MemoryStore;
use ui::TarotApp;

/// Runs the tarot canvas application.
///
/// Settings, clients and layouts are restored from eframe storage when available.
///
/// # Returns
///
/// Returns `Ok(())` if the application runs successfully, or an `eframe::Error` if
/// initialization fails.
///
/// # Example
///
/// ```no_run
/// use tarot_canvas::run_app;
///
/// fn main() -> Result<(), eframe::Error> {
///     run_app()
/// }
/// ```
#[cfg(not(target_arch = "wasm32"))]
pub fn run_app() -> Result<(), eframe::Error> {
    let options = eframe::NativeOptions::default();
    eframe::run_native(
        "Tarot Canvas",
        options,
        Box::new(|cc| {
            let store = cc.storage.map(MemoryStore::from_storage).unwrap_or_default();
            Ok(Box::new(TarotApp::new(store)))
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::STANDARD_DECK_ID;
    use crate::persistence::KvPersistence;
    use crate::session::Session;

    #[test]
    fn test_fresh_session_starts_on_free_table() {
        let session = Session::load(KvPersistence::new(MemoryStore::new()));
        assert!(session.placements().is_empty());
        assert!(session.active_template().is_free());
        assert_eq!(session.config().custom_decks[0].id, STANDARD_DECK_ID);
    }

    #[test]
    fn test_placed_card_copies_catalog_card() {
        let card = Card::new("13", "Death", "Endings, transformation, transition.");
        let placed = PlacedCard::from_card(&card, eframe::egui::pos2(10.0, 20.0));
        assert_eq!(placed.card_id, "13");
        assert_eq!(placed.rotation, 0);
        assert!(!placed.is_reversed);
    }
}
