//! Application state structures.
//!
//! The reading itself lives in the [`Session`]; the structs here only hold what the
//! front end needs between frames.

use super::editors::EditorState;
use crate::drag::DragSession;
use crate::interpretation::{GeminiInterpreter, Interpreter};
use crate::persistence::{KvPersistence, MemoryStore};
use crate::session::{Notice, Session};
use crate::templates::LayoutDraft;
use crate::types::InstanceId;
use crate::viewport::Viewport;
use eframe::egui;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;

/// Session type used by the application.
pub type AppSession = Session<KvPersistence<MemoryStore>>;

/// State related to canvas display and navigation.
pub struct CanvasState {
    /// Zoom and pan
    pub viewport: Viewport,
    /// Whether empty slots are outlined
    pub show_slots: bool,
    /// Screen rectangle of the canvas on the last frame
    pub rect: egui::Rect,
}

impl Default for CanvasState {
    fn default() -> Self {
        Self {
            viewport: Viewport::default(),
            show_slots: true,
            rect: egui::Rect::from_min_size(egui::Pos2::ZERO, egui::vec2(1200.0, 800.0)),
        }
    }
}

impl CanvasState {
    /// Unscaled canvas size that percentage slots resolve against.
    pub fn size(&self) -> egui::Vec2 {
        self.rect.size()
    }
}

/// State related to user interaction with the canvas and panels.
#[derive(Default)]
pub struct InteractionState {
    /// Drag in progress, from the palette or the table
    pub drag: Option<DragSession>,
    /// Screen position where a table card was grabbed
    pub drag_start: Option<egui::Pos2>,
    /// Card under the pointer
    pub hovered_card: Option<InstanceId>,
    /// Card the keyboard shortcuts and context menu act on
    pub selected_card: Option<InstanceId>,
    /// Palette search text
    pub palette_search: String,
    /// Chat input text
    pub chat_input: String,
    /// Name typed for a new client
    pub new_client_name: String,
    /// Whether the "save without a client" dialog is open
    pub confirm_anonymous_save: bool,
    /// Right-click menu of a card
    pub card_menu: CardMenuState,
}

/// State of the right-click menu offering flip, rotate and remove.
#[derive(Default)]
pub struct CardMenuState {
    /// Card the menu acts on
    pub card: Option<InstanceId>,
    /// Screen position where the menu appears
    pub screen_pos: egui::Pos2,
    /// Flag to prevent the menu from closing on the click that opened it
    pub just_opened: bool,
}

/// State of the layout builder window.
#[derive(Default)]
pub struct BuilderState {
    /// Whether the window is open
    pub open: bool,
    /// Layout being edited
    pub draft: LayoutDraft,
    /// Name typed for a new preset
    pub preset_name: String,
    /// Last validation error
    pub error: Option<String>,
}

impl BuilderState {
    /// Opens the builder on an empty draft.
    pub fn start(&mut self) {
        *self = Self {
            open: true,
            ..Self::default()
        };
    }
}

/// State related to file operations.
///
/// Dialogs run asynchronously and report back through the channel.
pub struct FileState {
    /// File operation requested this frame
    pub pending_operation: Option<PendingFileOperation>,
    /// Channel for receiving file operation results from async contexts
    pub file_operation_sender: Option<Sender<FileOperationResult>>,
    pub file_operation_receiver: Option<Receiver<FileOperationResult>>,
}

impl Default for FileState {
    fn default() -> Self {
        let (sender, receiver) = channel();
        Self {
            pending_operation: None,
            file_operation_sender: Some(sender),
            file_operation_receiver: Some(receiver),
        }
    }
}

/// Represents a pending file operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingFileOperation {
    /// Write the table to a session file
    SaveSession,
    /// Read a session file onto the table
    OpenSession,
    /// Write the reading report
    ExportReport,
    /// Read a text document into the interpretation context
    AddContextFile,
}

/// Messages sent from async file operations back to the main app.
#[derive(Debug)]
pub enum FileOperationResult {
    /// Save operation completed successfully with the given path
    SaveCompleted(String),
    /// Load operation completed successfully with path and content
    LoadCompleted(String, String),
    /// Context document read with path and content
    ContextLoaded(String, String),
    /// Operation failed with an error message
    OperationFailed(String),
}

/// The main application structure.
///
/// This struct implements the `eframe::App` trait and handles all user interface
/// rendering and interaction logic.
pub struct TarotApp {
    /// Table, clients, layouts and settings
    pub session: AppSession,
    /// Service that reads the cards
    pub interpreter: Arc<dyn Interpreter>,
    /// Canvas navigation and display state
    pub canvas: CanvasState,
    /// User interaction state
    pub interaction: InteractionState,
    /// Layout builder window
    pub builder: BuilderState,
    /// Settings, client and reading windows
    pub editors: EditorState,
    /// File operations state
    pub file: FileState,
    /// Latest message for the status bar
    pub status: Option<Notice>,
}

impl Default for TarotApp {
    fn default() -> Self {
        Self::new(MemoryStore::new())
    }
}

impl TarotApp {
    /// Creates the app over a store, reading the interpretation key from the environment.
    pub fn new(store: MemoryStore) -> Self {
        Self::with_interpreter(store, Arc::new(GeminiInterpreter::from_env()))
    }

    /// Creates the app with a given interpretation service.
    pub fn with_interpreter(store: MemoryStore, interpreter: Arc<dyn Interpreter>) -> Self {
        let session = Session::load(KvPersistence::new(store));
        log::info!(
            "Session loaded with {} clients and {} layouts",
            session.clients().len(),
            session.templates().custom().len()
        );
        Self {
            session,
            interpreter,
            canvas: CanvasState::default(),
            interaction: InteractionState::default(),
            builder: BuilderState::default(),
            editors: EditorState::default(),
            file: FileState::default(),
            status: None,
        }
    }
}
