//! Windows for editing settings, clients and saved readings.
//!
//! Each window works on a copy of the value and writes it back through the
//! session only when the user applies it.

use super::state::{PendingFileOperation, TarotApp};
use crate::catalog::{MAJOR_ARCANA_DECK_ID, STANDARD_DECK_ID};
use crate::session::NoticeLevel;
use crate::types::{AiConfig, Card, Client, ContextFile, CustomDeck, PdfFont, PdfSettings, PdfTheme, SavedReading};
use eframe::egui;
use uuid::Uuid;

/// Card typed into the deck editor before it is added.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CardDraft {
    pub name: String,
    pub description: String,
    /// Image URL; blank uses a generated image
    pub image: String,
}

/// Settings being edited in the settings window.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingsDraft {
    /// Report settings
    pub pdf: PdfSettings,
    /// Documents sent with the interpretation
    pub context_files: Vec<ContextFile>,
    /// Decks shown in the palette
    pub decks: Vec<CustomDeck>,
    /// Deck open in the deck editor
    pub deck: Option<String>,
    /// Name typed for a new deck
    pub new_deck_name: String,
    /// Card typed for the open deck
    pub new_card: CardDraft,
}

impl SettingsDraft {
    /// Copies the editable parts of `config`.
    pub fn from_config(config: &AiConfig) -> Self {
        Self {
            pdf: config.pdf_settings.clone(),
            context_files: config.context_files.clone(),
            decks: config.custom_decks.clone(),
            deck: config.custom_decks.first().map(|d| d.id.clone()),
            new_deck_name: String::new(),
            new_card: CardDraft::default(),
        }
    }

    /// Adds an empty deck named after `new_deck_name` and opens it. Blank names are refused.
    pub fn add_deck(&mut self) -> Option<String> {
        let name = self.new_deck_name.trim();
        if name.is_empty() {
            return None;
        }
        let id = format!("deck-{}", Uuid::new_v4());
        self.decks.push(CustomDeck {
            id: id.clone(),
            name: name.to_string(),
            cards: Vec::new(),
        });
        self.new_deck_name.clear();
        self.deck = Some(id.clone());
        Some(id)
    }

    /// Removes a deck. The standard deck stays.
    pub fn remove_deck(&mut self, deck_id: &str) -> bool {
        if deck_id == STANDARD_DECK_ID {
            return false;
        }
        let before = self.decks.len();
        self.decks.retain(|d| d.id != deck_id);
        if self.deck.as_deref() == Some(deck_id) {
            self.deck = self.decks.first().map(|d| d.id.clone());
        }
        self.decks.len() != before
    }

    /// Adds `new_card` to the open deck. Returns the new card's id.
    pub fn add_card(&mut self) -> Option<String> {
        let name = self.new_card.name.trim().to_string();
        if name.is_empty() {
            return None;
        }
        let deck_id = self.deck.clone()?;
        let deck = self.decks.iter_mut().find(|d| d.id == deck_id)?;
        let draft = std::mem::take(&mut self.new_card);
        let mut card = Card::new(Uuid::new_v4().to_string(), name, draft.description.trim());
        let image = draft.image.trim();
        if !image.is_empty() {
            card.image = Some(image.to_string());
        }
        let id = card.id.clone();
        deck.cards.push(card);
        Some(id)
    }

    /// Removes a card from the open deck.
    pub fn remove_card(&mut self, card_id: &str) -> bool {
        let Some(deck) = self
            .deck
            .as_deref()
            .and_then(|id| self.decks.iter_mut().find(|d| d.id == id))
        else {
            return false;
        };
        let before = deck.cards.len();
        deck.cards.retain(|c| c.id != card_id);
        deck.cards.len() != before
    }

    /// Writes the draft into `config`, leaving the other settings alone.
    pub fn apply(self, config: &mut AiConfig) {
        config.pdf_settings = self.pdf;
        config.context_files = self.context_files;
        config.custom_decks = self.decks;
    }
}

/// Client being edited, with text fields for the optional values.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientDraft {
    pub client: Client,
    pub email: String,
    pub notes: String,
}

impl ClientDraft {
    fn new(client: &Client) -> Self {
        Self {
            client: client.clone(),
            email: client.email.clone().unwrap_or_default(),
            notes: client.notes.clone().unwrap_or_default(),
        }
    }
}

/// Saved reading being edited.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadingDraft {
    /// Owner of the reading
    pub client_id: String,
    pub reading: SavedReading,
    pub title: String,
    pub interpretation: String,
}

/// Open editor windows.
#[derive(Debug, Default)]
pub struct EditorState {
    /// Settings window
    pub settings: Option<SettingsDraft>,
    /// Client window
    pub client: Option<ClientDraft>,
    /// Reading window
    pub reading: Option<ReadingDraft>,
    /// Last validation error of the client window
    pub error: Option<String>,
}

fn blank_to_none(text: &str) -> Option<String> {
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn hex_to_color(hex: &str) -> egui::Color32 {
    egui::Color32::from_hex(hex.trim()).unwrap_or(egui::Color32::GOLD)
}

fn color_to_hex(color: egui::Color32) -> String {
    format!("#{:02X}{:02X}{:02X}", color.r(), color.g(), color.b())
}

impl TarotApp {
    /// Opens the settings window on the current settings.
    pub fn open_settings(&mut self) {
        self.editors.settings = Some(SettingsDraft::from_config(self.session.config()));
    }

    /// Applies the settings window and closes it.
    pub fn save_settings_change(&mut self) {
        let Some(draft) = self.editors.settings.take() else {
            return;
        };
        self.session.update_config(|config| draft.apply(config));
        let active = self.session.active_deck().to_string();
        if active != MAJOR_ARCANA_DECK_ID && !self.session.config().custom_decks.iter().any(|d| d.id == active) {
            self.session.select_deck(MAJOR_ARCANA_DECK_ID);
        }
        log::info!("Settings saved");
    }

    /// Adds a context document, to the open settings window if there is one.
    pub fn add_context_file(&mut self, path: &str, content: String) {
        let name = std::path::Path::new(path)
            .file_name()
            .map_or_else(|| path.to_string(), |n| n.to_string_lossy().into_owned());
        let file = ContextFile { name, content };
        match self.editors.settings.as_mut() {
            Some(draft) => draft.context_files.push(file),
            None => self.session.update_config(|config| config.context_files.push(file)),
        }
    }

    /// Draws the settings window when it is open.
    pub fn draw_settings_window(&mut self, ctx: &egui::Context) {
        let Some(mut draft) = self.editors.settings.take() else {
            return;
        };
        let mut open = true;
        let mut apply = false;
        let mut cancel = false;
        let mut add_document = false;

        egui::Window::new("Settings")
            .open(&mut open)
            .collapsible(false)
            .default_width(420.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().max_height(520.0).show(ui, |ui| {
                    egui::CollapsingHeader::new("Report")
                        .id_salt("settings_report")
                        .default_open(true)
                        .show(ui, |ui| draw_report_settings(ui, &mut draft.pdf));
                    egui::CollapsingHeader::new("Context documents")
                        .id_salt("settings_context")
                        .show(ui, |ui| {
                            add_document = draw_context_files(ui, &mut draft.context_files);
                        });
                    egui::CollapsingHeader::new("Decks")
                        .id_salt("settings_decks")
                        .show(ui, |ui| draw_deck_editor(ui, &mut draft));
                });
                ui.separator();
                ui.horizontal(|ui| {
                    apply = ui.button("Apply").clicked();
                    cancel = ui.button("Cancel").clicked();
                });
            });

        if add_document {
            self.file.pending_operation = Some(PendingFileOperation::AddContextFile);
        }
        if open && !cancel {
            self.editors.settings = Some(draft);
        }
        if apply {
            self.save_settings_change();
        }
    }

    /// Opens the client window on `client`.
    pub fn start_editing_client(&mut self, client: &Client) {
        self.editors.client = Some(ClientDraft::new(client));
        self.editors.error = None;
    }

    /// Saves the client window. Returns false and keeps the window open when the name is blank.
    pub fn save_client_change(&mut self) -> bool {
        let Some(draft) = self.editors.client.as_ref() else {
            return false;
        };
        let name = draft.client.name.trim();
        if name.is_empty() {
            self.editors.error = Some("Client name cannot be empty".to_string());
            return false;
        }
        let client = Client {
            name: name.to_string(),
            email: blank_to_none(&draft.email),
            notes: blank_to_none(&draft.notes),
            ..draft.client.clone()
        };
        self.editors.client = None;
        self.editors.error = None;
        if !self.session.update_client(client) {
            self.notify(NoticeLevel::Warning, "That client no longer exists");
            return false;
        }
        true
    }

    /// Draws the client window when it is open.
    pub fn draw_client_editor(&mut self, ctx: &egui::Context) {
        let Some(draft) = self.editors.client.as_mut() else {
            return;
        };
        let mut open = true;
        let mut save = false;
        let mut cancel = false;
        let error = self.editors.error.clone();

        egui::Window::new("Edit Client")
            .open(&mut open)
            .collapsible(false)
            .resizable(false)
            .show(ctx, |ui| {
                egui::Grid::new("client_fields").num_columns(2).show(ui, |ui| {
                    ui.label("Name");
                    ui.text_edit_singleline(&mut draft.client.name);
                    ui.end_row();
                    ui.label("E-mail");
                    ui.text_edit_singleline(&mut draft.email);
                    ui.end_row();
                });
                ui.label("Notes");
                ui.add(egui::TextEdit::multiline(&mut draft.notes).desired_rows(4));
                if let Some(error) = &error {
                    let color = ui.visuals().error_fg_color;
                    ui.colored_label(color, error.as_str());
                }
                ui.horizontal(|ui| {
                    save = ui.button("Save").clicked();
                    cancel = ui.button("Cancel").clicked();
                });
            });

        if save {
            self.save_client_change();
        } else if cancel || !open {
            self.editors.client = None;
            self.editors.error = None;
        }
    }

    /// Opens the reading window on a saved reading of `client_id`.
    pub fn start_editing_reading(&mut self, client_id: &str, reading: &SavedReading) {
        self.editors.reading = Some(ReadingDraft {
            client_id: client_id.to_string(),
            reading: reading.clone(),
            title: reading.title.clone().unwrap_or_default(),
            interpretation: reading.interpretation.clone().unwrap_or_default(),
        });
    }

    /// Saves the reading window and closes it.
    pub fn save_reading_change(&mut self) -> bool {
        let Some(draft) = self.editors.reading.take() else {
            return false;
        };
        let reading = SavedReading {
            title: blank_to_none(&draft.title),
            interpretation: blank_to_none(&draft.interpretation),
            ..draft.reading
        };
        if !self.session.update_reading(&draft.client_id, reading) {
            self.notify(NoticeLevel::Warning, "That reading no longer exists");
            return false;
        }
        true
    }

    /// Draws the reading window when it is open.
    pub fn draw_reading_editor(&mut self, ctx: &egui::Context) {
        let Some(draft) = self.editors.reading.as_mut() else {
            return;
        };
        let mut open = true;
        let mut save = false;
        let mut cancel = false;

        egui::Window::new("Edit Reading")
            .open(&mut open)
            .collapsible(false)
            .default_width(380.0)
            .show(ctx, |ui| {
                ui.label(format!(
                    "{} · {}",
                    draft.reading.date.format("%Y-%m-%d %H:%M"),
                    draft.reading.layout_name
                ));
                ui.label("Title");
                ui.text_edit_singleline(&mut draft.title);
                ui.label("Interpretation");
                egui::ScrollArea::vertical().max_height(320.0).show(ui, |ui| {
                    ui.add(
                        egui::TextEdit::multiline(&mut draft.interpretation)
                            .desired_rows(10)
                            .desired_width(f32::INFINITY),
                    );
                });
                ui.horizontal(|ui| {
                    save = ui.button("Save").clicked();
                    cancel = ui.button("Cancel").clicked();
                });
            });

        if save {
            self.save_reading_change();
        } else if cancel || !open {
            self.editors.reading = None;
        }
    }
}

fn draw_report_settings(ui: &mut egui::Ui, pdf: &mut PdfSettings) {
    egui::Grid::new("report_fields").num_columns(2).show(ui, |ui| {
        ui.label("Theme");
        egui::ComboBox::from_id_salt("report_theme")
            .selected_text(format!("{:?}", pdf.theme))
            .show_ui(ui, |ui| {
                ui.selectable_value(&mut pdf.theme, PdfTheme::Light, "Light");
                ui.selectable_value(&mut pdf.theme, PdfTheme::Dark, "Dark");
            });
        ui.end_row();

        ui.label("Font");
        egui::ComboBox::from_id_salt("report_font")
            .selected_text(format!("{:?}", pdf.font))
            .show_ui(ui, |ui| {
                ui.selectable_value(&mut pdf.font, PdfFont::Times, "Times");
                ui.selectable_value(&mut pdf.font, PdfFont::Helvetica, "Helvetica");
                ui.selectable_value(&mut pdf.font, PdfFont::Courier, "Courier");
            });
        ui.end_row();

        ui.label("Header");
        ui.text_edit_singleline(&mut pdf.header_text);
        ui.end_row();

        ui.label("Sub-header");
        let mut sub_header = pdf.sub_header_text.clone().unwrap_or_default();
        if ui.text_edit_singleline(&mut sub_header).changed() {
            pdf.sub_header_text = blank_to_none(&sub_header);
        }
        ui.end_row();

        ui.label("Footer");
        ui.text_edit_singleline(&mut pdf.footer_text);
        ui.end_row();

        ui.label("Accent");
        let mut accent = hex_to_color(&pdf.accent_color);
        if egui::color_picker::color_edit_button_srgba(ui, &mut accent, egui::color_picker::Alpha::Opaque)
            .changed()
        {
            pdf.accent_color = color_to_hex(accent);
        }
        ui.end_row();

        ui.label("Logo URL");
        ui.horizontal(|ui| {
            let mut logo = pdf.logo_image.clone().unwrap_or_default();
            if ui.text_edit_singleline(&mut logo).changed() {
                pdf.logo_image = blank_to_none(&logo);
            }
            if ui
                .add_enabled(pdf.logo_image.is_some(), egui::Button::new("Remove"))
                .clicked()
            {
                pdf.logo_image = None;
            }
        });
        ui.end_row();
    });

    ui.checkbox(&mut pdf.show_client_name, "Client name");
    ui.checkbox(&mut pdf.show_date, "Date");
    ui.checkbox(&mut pdf.show_canvas_snapshot, "Table picture");
    ui.checkbox(&mut pdf.show_interpretation, "Interpretation");
    ui.checkbox(&mut pdf.show_individual_slots, "One block per card");
}

/// Returns true when the user asked to add a document.
fn draw_context_files(ui: &mut egui::Ui, files: &mut Vec<ContextFile>) -> bool {
    if files.is_empty() {
        ui.weak("No documents");
    }
    let mut remove = None;
    for (index, file) in files.iter().enumerate() {
        ui.horizontal(|ui| {
            ui.label(file.name.as_str())
                .on_hover_text(format!("{} characters", file.content.chars().count()));
            if ui.small_button("🗑").clicked() {
                remove = Some(index);
            }
        });
    }
    if let Some(index) = remove {
        files.remove(index);
    }
    ui.button("Add Document").clicked()
}

fn draw_deck_editor(ui: &mut egui::Ui, draft: &mut SettingsDraft) {
    let selected_name = draft
        .deck
        .as_deref()
        .and_then(|id| draft.decks.iter().find(|d| d.id == id))
        .map_or_else(|| "No deck".to_string(), |d| d.name.clone());
    ui.horizontal(|ui| {
        egui::ComboBox::from_id_salt("deck_editor_selector")
            .selected_text(selected_name)
            .show_ui(ui, |ui| {
                for deck in &draft.decks {
                    ui.selectable_value(&mut draft.deck, Some(deck.id.clone()), deck.name.as_str());
                }
            });
        let removable = draft.deck.as_deref().is_some_and(|id| id != STANDARD_DECK_ID);
        if ui
            .add_enabled(removable, egui::Button::new("🗑"))
            .on_hover_text("Delete this deck")
            .clicked()
        {
            if let Some(id) = draft.deck.clone() {
                draft.remove_deck(&id);
            }
        }
    });
    ui.horizontal(|ui| {
        ui.add(
            egui::TextEdit::singleline(&mut draft.new_deck_name)
                .hint_text("New deck")
                .desired_width(160.0),
        );
        if ui.button("Add Deck").clicked() {
            draft.add_deck();
        }
    });

    let Some(deck) = draft
        .deck
        .as_deref()
        .and_then(|id| draft.decks.iter_mut().find(|d| d.id == id))
    else {
        return;
    };
    ui.separator();
    ui.horizontal(|ui| {
        ui.label("Name");
        ui.text_edit_singleline(&mut deck.name);
    });
    let mut remove = None;
    egui::ScrollArea::vertical()
        .id_salt("deck_editor_cards")
        .max_height(180.0)
        .show(ui, |ui| {
            for card in &deck.cards {
                ui.horizontal(|ui| {
                    ui.label(card.name.as_str()).on_hover_text(card.description.as_str());
                    if ui.small_button("🗑").clicked() {
                        remove = Some(card.id.clone());
                    }
                });
            }
        });
    if let Some(card_id) = remove {
        draft.remove_card(&card_id);
    }

    ui.label("New card");
    ui.text_edit_singleline(&mut draft.new_card.name);
    ui.add(egui::TextEdit::singleline(&mut draft.new_card.description).hint_text("Meaning"));
    ui.add(egui::TextEdit::singleline(&mut draft.new_card.image).hint_text("Image URL"));
    if ui.button("Add Card").clicked() {
        draft.add_card();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ensure_standard_deck;

    fn draft() -> SettingsDraft {
        let mut config = AiConfig::default();
        ensure_standard_deck(&mut config);
        SettingsDraft::from_config(&config)
    }

    #[test]
    fn test_add_deck_refuses_blank_name() {
        let mut draft = draft();
        draft.new_deck_name = "   ".into();
        assert_eq!(draft.add_deck(), None);

        draft.new_deck_name = " Lenormand ".into();
        let id = draft.add_deck().expect("named deck");
        assert_eq!(draft.deck.as_deref(), Some(id.as_str()));
        assert_eq!(draft.decks.last().map(|d| d.name.as_str()), Some("Lenormand"));
        assert!(draft.new_deck_name.is_empty());
    }

    #[test]
    fn test_standard_deck_cannot_be_removed() {
        let mut draft = draft();
        assert!(!draft.remove_deck(STANDARD_DECK_ID));
        draft.new_deck_name = "Mine".into();
        let id = draft.add_deck().expect("named deck");
        assert!(draft.remove_deck(&id));
        assert_eq!(draft.deck.as_deref(), Some(STANDARD_DECK_ID));
    }

    #[test]
    fn test_add_card_goes_to_open_deck() {
        let mut draft = draft();
        draft.new_deck_name = "Mine".into();
        draft.add_deck();
        draft.new_card = CardDraft {
            name: "Ace".into(),
            description: "Beginnings".into(),
            image: String::new(),
        };
        let card_id = draft.add_card().expect("card added");

        let deck = draft.decks.last().expect("deck");
        assert_eq!(deck.cards.len(), 1);
        assert_eq!(deck.cards[0].description, "Beginnings");
        assert_eq!(deck.cards[0].image, None);
        assert_eq!(draft.new_card, CardDraft::default());
        assert_eq!(draft.add_card(), None);

        assert!(draft.remove_card(&card_id));
        assert!(draft.decks.last().is_some_and(|d| d.cards.is_empty()));
    }

    #[test]
    fn test_apply_leaves_other_settings_alone() {
        let mut config = AiConfig {
            system_instruction: "Be brief".into(),
            ..Default::default()
        };
        let mut draft = SettingsDraft::from_config(&config);
        draft.pdf.footer_text = "Bye".into();
        draft.context_files.push(ContextFile {
            name: "notes.txt".into(),
            content: "Mercury retrograde".into(),
        });
        draft.apply(&mut config);

        assert_eq!(config.pdf_settings.footer_text, "Bye");
        assert_eq!(config.context_files.len(), 1);
        assert_eq!(config.system_instruction, "Be brief");
    }

    #[test]
    fn test_accent_color_round_trips_through_picker() {
        assert_eq!(color_to_hex(hex_to_color("#D4AF37")), "#D4AF37");
        assert_eq!(hex_to_color("not a color"), egui::Color32::GOLD);
    }
}
