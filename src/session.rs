//! The application session: everything the reader works with, and its storage lifecycle.
//!
//! A [`Session`] is loaded once at startup from a [`Persistence`] backend and writes every
//! change back to it. In-memory state is the source of truth: when storage fails the
//! change stays and a [`Notice`] is queued for the user.

use crate::catalog::{ensure_standard_deck, MAJOR_ARCANA_DECK_ID, STANDARD_DECK_ID};
use crate::interpretation::{InterpretError, InterpretRequest, InterpretationTracker, Interpreter};
use crate::persistence::{LayoutKind, Persistence, PersistenceError};
use crate::placement::PlacementStore;
use crate::templates::{TemplateError, TemplateRegistry};
use crate::types::{AiConfig, Client, LastState, PlacedCard, SavedReading, SpreadTemplate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Severity of a user notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    /// Something completed
    Info,
    /// Something failed but nothing was lost
    Warning,
}

/// A message for the status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Severity
    pub level: NoticeLevel,
    /// Text shown to the user
    pub text: String,
}

/// Where [`Session::save_reading`] put the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Added to the active client's history under this reading id
    Client(String),
    /// Kept as the anonymous last state
    Anonymous,
    /// The table is empty
    NothingToSave,
}

/// Errors reading or writing a session file.
#[derive(Debug, Error)]
pub enum SessionFileError {
    /// The file is not valid session JSON
    #[error("invalid session file: {0}")]
    Parse(#[from] serde_json::Error),
    /// The file was written by a newer version
    #[error("unsupported session file version {0}")]
    Version(u32),
}

const SESSION_FILE_VERSION: u32 = 1;

/// A portable snapshot of the table, saved and opened as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionFile {
    /// Format version
    pub version: u32,
    /// When the file was written
    pub saved_at: DateTime<Utc>,
    /// Active layout id
    pub layout_id: String,
    /// The layout itself, so custom layouts travel with the file
    #[serde(default)]
    pub layout: Option<SpreadTemplate>,
    /// The table
    pub cards: Vec<PlacedCard>,
    /// Interpretation text
    #[serde(default)]
    pub interpretation: Option<String>,
    /// Session configuration
    #[serde(default)]
    pub config: Option<AiConfig>,
}

impl SessionFile {
    /// Serializes to pretty JSON.
    pub fn to_json(&self) -> Result<String, SessionFileError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parses a session file.
    pub fn from_json(json: &str) -> Result<Self, SessionFileError> {
        let file: SessionFile = serde_json::from_str(json)?;
        if file.version > SESSION_FILE_VERSION {
            return Err(SessionFileError::Version(file.version));
        }
        Ok(file)
    }
}

/// Copies the per-session fields of a snapshot, keeping the user's deck library.
fn merge_snapshot(config: &mut AiConfig, snapshot: &AiConfig) {
    config.system_instruction = snapshot.system_instruction.clone();
    config.context_files = snapshot.context_files.clone();
    config.deck_style = snapshot.deck_style;
    config.session_name = snapshot.session_name.clone();
    config.session_questions = snapshot.session_questions.clone();
    config.pdf_settings = snapshot.pdf_settings.clone();
    config.chat_history = snapshot.chat_history.clone();
}

/// All state of one reader's session.
pub struct Session<P> {
    persistence: P,
    config: AiConfig,
    clients: Vec<Client>,
    active_client: Option<String>,
    active_deck: String,
    placements: PlacementStore,
    templates: TemplateRegistry,
    interpretation: InterpretationTracker,
    notices: Vec<Notice>,
}

impl<P: Persistence> Session<P> {
    /// Loads everything from storage.
    ///
    /// Missing or unreadable blobs count as absent; unreadable ones also raise a notice.
    pub fn load(persistence: P) -> Self {
        let mut notices = Vec::new();
        let mut absent_on_error = |what: &str, err: PersistenceError| {
            log::warn!("Ignoring stored {what}: {err}");
            notices.push(Notice {
                level: NoticeLevel::Warning,
                text: format!("Could not read saved {what}"),
            });
        };

        let mut config = persistence
            .load_settings()
            .unwrap_or_else(|e| {
                absent_on_error("settings", e);
                None
            })
            .unwrap_or_default();
        let clients = persistence.list_clients().unwrap_or_else(|e| {
            absent_on_error("clients", e);
            Vec::new()
        });
        let layouts = persistence.list_layouts().unwrap_or_else(|e| {
            absent_on_error("layouts", e);
            Default::default()
        });

        let deck_added = ensure_standard_deck(&mut config);
        let active_deck = if deck_added || config.custom_decks.iter().any(|d| d.id == STANDARD_DECK_ID) {
            STANDARD_DECK_ID
        } else {
            MAJOR_ARCANA_DECK_ID
        };

        let mut interpretation = InterpretationTracker::new();
        if !config.chat_history.is_empty() {
            interpretation.restore(None, config.chat_history.clone());
        }

        log::info!(
            "Session loaded: {} clients, {} custom layouts, {} presets",
            clients.len(),
            layouts.layouts.len(),
            layouts.presets.len()
        );

        let mut session = Self {
            persistence,
            config,
            clients,
            active_client: None,
            active_deck: active_deck.to_string(),
            placements: PlacementStore::new(),
            templates: TemplateRegistry::new(layouts.layouts, layouts.presets),
            interpretation,
            notices,
        };
        if deck_added {
            session.save_settings();
        }
        session
    }

    fn persist(&mut self, what: &str, result: Result<(), PersistenceError>) {
        if let Err(err) = result {
            log::warn!("Failed to store {what}: {err}");
            self.notices.push(Notice {
                level: NoticeLevel::Warning,
                text: format!("Could not save {what}; the change is kept for this session"),
            });
        }
    }

    fn notify(&mut self, text: impl Into<String>) {
        self.notices.push(Notice {
            level: NoticeLevel::Info,
            text: text.into(),
        });
    }

    /// Drains queued notices.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// The storage backend.
    pub fn persistence(&self) -> &P {
        &self.persistence
    }

    // --- Table ---

    /// The placed cards and their history.
    pub fn placements(&self) -> &PlacementStore {
        &self.placements
    }

    /// Mutable access to the placed cards.
    pub fn placements_mut(&mut self) -> &mut PlacementStore {
        &mut self.placements
    }

    /// Layout registry.
    pub fn templates(&self) -> &TemplateRegistry {
        &self.templates
    }

    /// The active layout.
    pub fn active_template(&self) -> &SpreadTemplate {
        self.templates.active()
    }

    /// Switches layout; unknown ids fall back to free.
    pub fn select_template(&mut self, id: &str) {
        self.templates.select(id);
    }

    // --- Settings ---

    /// Current settings.
    pub fn config(&self) -> &AiConfig {
        &self.config
    }

    /// Changes the settings and stores them.
    pub fn update_config(&mut self, change: impl FnOnce(&mut AiConfig)) {
        change(&mut self.config);
        ensure_standard_deck(&mut self.config);
        self.save_settings();
    }

    fn save_settings(&mut self) {
        let result = self.persistence.save_settings(&self.config);
        self.persist("settings", result);
    }

    /// Deck shown in the palette.
    pub fn active_deck(&self) -> &str {
        &self.active_deck
    }

    /// Chooses the palette deck.
    pub fn select_deck(&mut self, deck_id: &str) {
        self.active_deck = deck_id.to_string();
    }

    // --- Clients ---

    /// Every client, most recently added first.
    pub fn clients(&self) -> &[Client] {
        &self.clients
    }

    /// The selected client.
    pub fn active_client(&self) -> Option<&Client> {
        let id = self.active_client.as_deref()?;
        self.clients.iter().find(|c| c.id == id)
    }

    /// Selects a client, or none.
    pub fn select_client(&mut self, id: Option<&str>) {
        self.active_client = id
            .filter(|id| self.clients.iter().any(|c| c.id == *id))
            .map(str::to_string);
    }

    /// Adds a client at the top of the roster.
    pub fn add_client(&mut self, client: Client) {
        log::info!("Adding client {}", client.id);
        let result = self.persistence.save_client(&client);
        self.clients.insert(0, client);
        self.persist("client", result);
    }

    /// Replaces a client's record. Returns false for unknown clients.
    pub fn update_client(&mut self, client: Client) -> bool {
        let Some(slot) = self.clients.iter_mut().find(|c| c.id == client.id) else {
            return false;
        };
        *slot = client.clone();
        let result = self.persistence.update_client(&client);
        self.persist("client", result);
        true
    }

    /// Removes a client. Deleting the selected client clears the selection.
    pub fn delete_client(&mut self, id: &str) -> bool {
        let before = self.clients.len();
        self.clients.retain(|c| c.id != id);
        if self.clients.len() == before {
            return false;
        }
        if self.active_client.as_deref() == Some(id) {
            self.active_client = None;
        }
        let result = self.persistence.delete_client(id);
        self.persist("client", result);
        true
    }

    // --- Readings ---

    fn snapshot_reading(&self) -> SavedReading {
        let template = self.templates.active();
        SavedReading {
            id: Uuid::new_v4().to_string(),
            date: Utc::now(),
            title: self.config.session_name.clone(),
            layout_name: template.name.clone(),
            layout_id: Some(template.id.clone()),
            cards: self.placements.cards().to_vec(),
            interpretation: self.interpretation.content().map(str::to_string),
            ai_config_snapshot: Some(self.config.clone()),
        }
    }

    /// Saves the table to the selected client, or anonymously when none is selected.
    pub fn save_reading(&mut self) -> SaveOutcome {
        if self.placements.is_empty() {
            return SaveOutcome::NothingToSave;
        }
        let reading = self.snapshot_reading();

        let Some(client_id) = self.active_client.clone() else {
            let state = LastState {
                cards: reading.cards,
                layout_id: reading.layout_id,
                date: reading.date,
                ai_config_snapshot: reading.ai_config_snapshot,
            };
            let result = self.persistence.save_last_state(&state);
            self.persist("reading", result);
            self.notify("Reading saved locally");
            return SaveOutcome::Anonymous;
        };

        let id = reading.id.clone();
        let result = self.persistence.save_reading(&client_id, &reading);
        if let Some(client) = self.clients.iter_mut().find(|c| c.id == client_id) {
            client.readings_history.insert(0, reading);
        }
        self.persist("reading", result);
        self.notify("Reading saved");
        log::info!("Saved reading {id} for client {client_id}");
        SaveOutcome::Client(id)
    }

    /// Replaces a saved reading of a client.
    pub fn update_reading(&mut self, client_id: &str, reading: SavedReading) -> bool {
        let Some(slot) = self
            .clients
            .iter_mut()
            .filter(|c| c.id == client_id)
            .flat_map(|c| c.readings_history.iter_mut())
            .find(|r| r.id == reading.id)
        else {
            return false;
        };
        *slot = reading.clone();
        let result = self.persistence.update_reading(&reading);
        self.persist("reading", result);
        true
    }

    /// Deletes a saved reading of a client.
    pub fn delete_reading(&mut self, client_id: &str, reading_id: &str) -> bool {
        let Some(client) = self.clients.iter_mut().find(|c| c.id == client_id) else {
            return false;
        };
        let before = client.readings_history.len();
        client.readings_history.retain(|r| r.id != reading_id);
        if client.readings_history.len() == before {
            return false;
        }
        let result = self.persistence.delete_reading(reading_id);
        self.persist("reading", result);
        true
    }

    /// Puts a saved reading back on the table as an undoable change.
    pub fn load_reading(&mut self, reading: &SavedReading) {
        log::info!("Loading reading {}", reading.id);
        self.placements.load(reading.cards.clone());
        if let Some(layout_id) = &reading.layout_id {
            self.templates.select(layout_id);
        }
        match &reading.ai_config_snapshot {
            Some(snapshot) => merge_snapshot(&mut self.config, snapshot),
            None => {
                if reading.title.is_some() {
                    self.config.session_name = reading.title.clone();
                }
            }
        }
        self.interpretation
            .restore(reading.interpretation.clone(), self.config.chat_history.clone());
    }

    /// Selects a client and starts from an empty table, keeping the old one undoable.
    pub fn start_new_reading(&mut self, client_id: &str) {
        self.select_client(Some(client_id));
        self.placements.load(Vec::new());
        self.interpretation.reset();
        self.config.session_name = None;
        self.config.session_questions = None;
        self.config.chat_history.clear();
        self.save_settings();
    }

    /// Restores the anonymous last reading. Returns false when there is none.
    pub fn restore_last_state(&mut self) -> bool {
        let state = match self.persistence.load_last_state() {
            Ok(Some(state)) => state,
            Ok(None) => {
                self.notify("No anonymous reading saved");
                return false;
            }
            Err(err) => {
                log::warn!("Ignoring stored last state: {err}");
                self.notices.push(Notice {
                    level: NoticeLevel::Warning,
                    text: "Could not read the saved reading".to_string(),
                });
                return false;
            }
        };
        self.placements.load(state.cards);
        if let Some(layout_id) = &state.layout_id {
            self.templates.select(layout_id);
        }
        if let Some(snapshot) = &state.ai_config_snapshot {
            merge_snapshot(&mut self.config, snapshot);
        }
        true
    }

    // --- Session files ---

    /// Snapshot of the table for a session file.
    pub fn to_file(&self) -> SessionFile {
        let template = self.templates.active();
        SessionFile {
            version: SESSION_FILE_VERSION,
            saved_at: Utc::now(),
            layout_id: template.id.clone(),
            layout: template.is_custom.then(|| template.clone()),
            cards: self.placements.cards().to_vec(),
            interpretation: self.interpretation.content().map(str::to_string),
            config: Some(self.config.clone()),
        }
    }

    /// Opens a session file onto the table as an undoable change.
    ///
    /// A custom layout carried by the file is added when no layout with its id exists.
    pub fn apply_file(&mut self, file: SessionFile) {
        if let Some(layout) = file.layout {
            if self.templates.get(&layout.id).is_none() {
                let id = layout.id.clone();
                self.templates = TemplateRegistry::new(
                    self.templates.custom().iter().cloned().chain(std::iter::once(layout.clone())).collect(),
                    self.templates.presets().to_vec(),
                );
                let result = self.persistence.save_layout(&layout, LayoutKind::Layout);
                self.persist("layout", result);
                log::info!("Imported layout {id}");
            }
        }
        self.placements.load(file.cards);
        self.templates.select(&file.layout_id);
        if let Some(snapshot) = &file.config {
            merge_snapshot(&mut self.config, snapshot);
        }
        self.interpretation
            .restore(file.interpretation, self.config.chat_history.clone());
    }

    // --- Layouts ---

    /// Stores a new custom layout and makes it active. Returns its id.
    pub fn add_custom_layout(&mut self, template: SpreadTemplate) -> String {
        let id = self.templates.add_custom(template);
        self.templates.select(&id);
        if let Some(stored) = self.templates.get(&id).cloned() {
            let result = self.persistence.save_layout(&stored, LayoutKind::Layout);
            self.persist("layout", result);
            self.notify(format!("Layout \"{}\" created", stored.name));
        }
        id
    }

    /// Deletes a custom layout; the active layout falls back to free if it was this one.
    pub fn delete_custom_layout(&mut self, id: &str) -> Result<(), TemplateError> {
        self.templates.delete_custom(id)?;
        let result = self.persistence.delete_layout(id);
        self.persist("layout", result);
        Ok(())
    }

    /// Stores a builder preset.
    pub fn add_preset(&mut self, preset: SpreadTemplate) {
        let result = self.persistence.save_layout(&preset, LayoutKind::Preset);
        self.notify(format!("Preset \"{}\" saved", preset.name));
        self.templates.add_preset(preset);
        self.persist("preset", result);
    }

    /// Deletes a builder preset.
    pub fn delete_preset(&mut self, id: &str) -> Result<(), TemplateError> {
        self.templates.delete_preset(id)?;
        let result = self.persistence.delete_layout(id);
        self.persist("preset", result);
        Ok(())
    }

    // --- Interpretation ---

    /// Reading and chat state.
    pub fn interpretation(&self) -> &InterpretationTracker {
        &self.interpretation
    }

    /// Requests a reading of the table in the background.
    ///
    /// Returns `Ok(false)` when a reading is already in flight.
    pub fn interpret<F>(&mut self, interpreter: Arc<dyn Interpreter>, on_done: F) -> Result<bool, InterpretError>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.placements.is_empty() {
            return Err(InterpretError::EmptySpread);
        }
        let request = InterpretRequest {
            cards: self.placements.cards().to_vec(),
            config: self.config.clone(),
            template: self.templates.active().clone(),
        };
        Ok(self.interpretation.submit_reading(interpreter, request, on_done))
    }

    /// Sends a follow-up question in the background.
    pub fn send_chat<F>(&mut self, interpreter: Arc<dyn Interpreter>, message: &str, on_done: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let config = self.config.clone();
        self.interpretation.submit_chat(interpreter, message, config, on_done)
    }

    /// Applies finished interpretation replies and keeps the chat in the settings.
    pub fn poll_interpretation(&mut self) -> bool {
        if self.interpretation.poll() == 0 {
            return false;
        }
        self.config.chat_history = self.interpretation.messages().to_vec();
        self.save_settings();
        true
    }
}
