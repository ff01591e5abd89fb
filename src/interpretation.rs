//! Interpretation of the table by an external text service.
//!
//! The service itself sits behind [`Interpreter`]. This module assembles the prompt and
//! tracks requests: each one gets a sequence number, and a reply that does not carry the
//! latest number is dropped, so a slow answer for an earlier table can never overwrite a
//! newer reading.

use crate::types::{AiConfig, ChatMessage, ChatRole, PlacedCard, SpreadTemplate};
use std::fmt::Write as _;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use thiserror::Error;

/// Environment variable holding the service credential.
pub const API_KEY_VAR: &str = "API_KEY";

/// Used when the settings carry no system instruction of their own.
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "\
You are an experienced, mystical and empathetic tarot reader.
Your task is to interpret a tarot spread provided by the user.
The user will give a list of cards, their state (Upright or Reversed) and their positions.
Focus on symbolic meaning and on how the cards interact, and give practical and spiritual advice.
IMPORTANT: give special weight to REVERSED cards, explaining how they show blocked or internalised energy, or shadow aspects that need attention.
Keep the tone mysterious but welcoming.
Use Markdown formatting to make the reading pleasant to read (bold, italics, lists).";

const EMPTY_READING: &str = "The interpretation could not be generated right now.";
const CHAT_FAILED: &str = "Error processing message.";

/// Failures of the interpretation service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InterpretError {
    /// No credential configured
    #[error("API key not found; set the API_KEY environment variable")]
    MissingCredentials,
    /// Nothing on the table to interpret
    #[error("place some cards on the table first")]
    EmptySpread,
    /// The service failed or could not be reached
    #[error("interpretation service error: {0}")]
    Service(String),
}

/// Everything needed to interpret one table.
#[derive(Debug, Clone)]
pub struct InterpretRequest {
    /// Cards in z-order
    pub cards: Vec<PlacedCard>,
    /// Session configuration
    pub config: AiConfig,
    /// Active layout
    pub template: SpreadTemplate,
}

/// A follow-up question about the reading.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Conversation so far, not including `message`
    pub history: Vec<ChatMessage>,
    /// The new question
    pub message: String,
    /// Session configuration
    pub config: AiConfig,
}

/// An external text service that reads tarot spreads.
pub trait Interpreter: Send + Sync {
    /// Produces a reading of the table.
    fn interpret(&self, request: &InterpretRequest) -> Result<String, InterpretError>;

    /// Answers a follow-up message.
    fn chat(&self, request: &ChatRequest) -> Result<String, InterpretError>;
}

/// Model used for readings and chat.
pub const GEMINI_MODEL: &str = "gemini-2.5-flash";

const GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const READING_TEMPERATURE: f64 = 0.8;

/// Client for the Gemini `generateContent` endpoint.
///
/// Calls block until the service answers; [`InterpretationTracker`] runs them off the
/// UI thread.
#[derive(Debug, Clone)]
pub struct GeminiInterpreter {
    api_key: Option<String>,
    model: String,
}

impl Default for GeminiInterpreter {
    fn default() -> Self {
        Self::with_key(None)
    }
}

impl GeminiInterpreter {
    /// Reads the credential from [`API_KEY_VAR`].
    pub fn from_env() -> Self {
        Self::with_key(std::env::var(API_KEY_VAR).ok())
    }

    /// Uses the given credential; blank keys count as missing.
    pub fn with_key(api_key: Option<String>) -> Self {
        Self {
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            model: GEMINI_MODEL.to_string(),
        }
    }

    /// Talks to another model of the same family.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Full URL of the `generateContent` call for the configured model.
    pub fn endpoint(&self) -> String {
        format!("{GEMINI_ENDPOINT}/{}:generateContent", self.model)
    }

    fn api_key(&self) -> Result<&str, InterpretError> {
        self.api_key.as_deref().ok_or(InterpretError::MissingCredentials)
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn send(&self, api_key: &str, body: &serde_json::Value) -> Result<String, InterpretError> {
        let response = ureq::post(&self.endpoint())
            .set("x-goog-api-key", api_key)
            .set("Content-Type", "application/json")
            .send_string(&body.to_string());
        let text = match response {
            Ok(response) => response
                .into_string()
                .map_err(|e| InterpretError::Service(format!("Failed to read response: {e}")))?,
            Err(ureq::Error::Status(code, response)) => {
                let detail = response.into_string().unwrap_or_default();
                let message = parse_reply(&detail)
                    .err()
                    .map(|err| err.to_string())
                    .unwrap_or(detail);
                return Err(InterpretError::Service(format!("HTTP {code}: {message}")));
            }
            Err(e) => return Err(InterpretError::Service(e.to_string())),
        };
        parse_reply(&text)
    }

    // Blocking HTTP is unavailable in the browser
    #[cfg(target_arch = "wasm32")]
    fn send(&self, _api_key: &str, _body: &serde_json::Value) -> Result<String, InterpretError> {
        Err(InterpretError::Service(
            "the web build cannot reach the interpretation service".to_string(),
        ))
    }
}

impl Interpreter for GeminiInterpreter {
    fn interpret(&self, request: &InterpretRequest) -> Result<String, InterpretError> {
        let api_key = self.api_key()?;
        if request.cards.is_empty() {
            return Err(InterpretError::EmptySpread);
        }
        let body = reading_body(request);
        log::debug!("Sending reading of {} cards to {}", request.cards.len(), self.model);
        self.send(api_key, &body)
    }

    fn chat(&self, request: &ChatRequest) -> Result<String, InterpretError> {
        let api_key = self.api_key()?;
        self.send(api_key, &chat_body(request))
    }
}

fn text_content(role: ChatRole, text: &str) -> serde_json::Value {
    let role = match role {
        ChatRole::User => "user",
        ChatRole::Model => "model",
    };
    serde_json::json!({ "role": role, "parts": [{ "text": text }] })
}

/// Request body asking for a reading of the table.
pub fn reading_body(request: &InterpretRequest) -> serde_json::Value {
    serde_json::json!({
        "systemInstruction": { "parts": [{ "text": system_instruction(&request.config) }] },
        "contents": [text_content(ChatRole::User, &build_prompt(request))],
        "generationConfig": { "temperature": READING_TEMPERATURE },
    })
}

/// Request body continuing the conversation with a new user message.
pub fn chat_body(request: &ChatRequest) -> serde_json::Value {
    let contents: Vec<_> = request
        .history
        .iter()
        .map(|m| text_content(m.role, &m.message))
        .chain(std::iter::once(text_content(ChatRole::User, &request.message)))
        .collect();
    serde_json::json!({
        "systemInstruction": { "parts": [{ "text": system_instruction(&request.config) }] },
        "contents": contents,
    })
}

/// Extracts the answer text from a `generateContent` response.
///
/// An empty string means the service answered without text.
pub fn parse_reply(body: &str) -> Result<String, InterpretError> {
    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| InterpretError::Service(format!("malformed response: {e}")))?;
    if let Some(error) = value.get("error") {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("unknown error");
        return Err(InterpretError::Service(message.to_string()));
    }
    let text = value
        .pointer("/candidates/0/content/parts")
        .and_then(|parts| parts.as_array())
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
                .collect::<String>()
        })
        .unwrap_or_default();
    Ok(text)
}

/// The configured system instruction, or the default when it is blank.
pub fn system_instruction(config: &AiConfig) -> &str {
    if config.system_instruction.trim().is_empty() {
        DEFAULT_SYSTEM_INSTRUCTION
    } else {
        &config.system_instruction
    }
}

/// Assembles the reading prompt for a table.
pub fn build_prompt(request: &InterpretRequest) -> String {
    let config = &request.config;
    let template = &request.template;
    let mut prompt = String::new();

    if !config.context_files.is_empty() {
        prompt.push_str("\n\nADDITIONAL CONTEXT / SPECIFIC KNOWLEDGE:\n");
        for file in &config.context_files {
            let _ = writeln!(
                prompt,
                "--- Start of file: {} ---\n{}\n--- End of file ---",
                file.name, file.content
            );
        }
        prompt.push_str("\nUse the context above to guide the interpretation where relevant.\n");
    }

    let _ = writeln!(
        prompt,
        "LAYOUT USED: \"{}\"\nLayout description: {}",
        template.name, template.description
    );

    let connections: Vec<_> = template.resolved_connections().collect();
    if !connections.is_empty() {
        prompt.push_str("\n\nCONNECTIONS BETWEEN POSITIONS (analyse the tension or synergy between these cards):\n");
        for (a, b) in connections {
            let _ = writeln!(prompt, "- Connection between \"{}\" and \"{}\"", a.label, b.label);
        }
    }

    if let Some(questions) = config.session_questions.as_deref().filter(|q| !q.trim().is_empty()) {
        let _ = write!(
            prompt,
            "\n\nTHE QUERENT'S QUESTIONS:\n{questions}\n(Answer these questions directly in the reading)"
        );
    }

    let cards = request
        .cards
        .iter()
        .enumerate()
        .map(|(i, card)| {
            let orientation = if card.is_reversed {
                "REVERSED (signals delay, resistance, inner energy or the opposite of the traditional meaning)"
            } else {
                "UPRIGHT (energy flowing freely, direct manifestation)"
            };
            let meaning = if card.description.is_empty() {
                String::new()
            } else {
                format!("\n   - Meaning: \"{}\"", card.description)
            };
            format!(
                "Card {}: {}{}\n   - State: {}\n   - Position: X={}, Y={}",
                i + 1,
                card.name,
                meaning,
                orientation,
                card.x.round(),
                card.y.round()
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    let _ = write!(
        prompt,
        "\n\nPlease give a complete and deep reading of this tarot spread:\n\n\
         CARDS ON THE TABLE:\n{cards}\n\n\
         Reading guidelines:\n\
         1. Open with a synthesis of the overall energy of the table, based on the layout \"{}\".\n\
         2. Relate each card to its position in the layout where applicable.\n\
         3. Point out EXPLICITLY how reversed cards influence the situation.\n\
         4. Analyse the requested interactions and connections between cards.\n\
         5. Close with clear advice or guidance.",
        template.name
    );
    prompt
}

/// A finished request, delivered back to the UI thread.
#[derive(Debug)]
pub enum InterpretationEvent {
    /// Reply to a reading request
    Reading {
        /// Sequence number of the request
        seq: u64,
        /// Service result
        result: Result<String, InterpretError>,
    },
    /// Reply to a chat message
    Chat {
        /// Sequence number of the request
        seq: u64,
        /// Service result
        result: Result<String, InterpretError>,
    },
}

/// Reading and chat state of the active table.
pub struct InterpretationTracker {
    content: Option<String>,
    messages: Vec<ChatMessage>,
    loading: bool,
    sending: bool,
    next_seq: u64,
    latest_reading: Option<u64>,
    latest_chat: Option<u64>,
    sender: Sender<InterpretationEvent>,
    receiver: Receiver<InterpretationEvent>,
}

impl Default for InterpretationTracker {
    fn default() -> Self {
        let (sender, receiver) = channel();
        Self {
            content: None,
            messages: Vec::new(),
            loading: false,
            sending: false,
            next_seq: 0,
            latest_reading: None,
            latest_chat: None,
            sender,
            receiver,
        }
    }
}

impl InterpretationTracker {
    /// Creates an idle tracker with no reading.
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest reading text, or failure placeholder.
    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    /// The chat transcript.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Whether a reading is in flight.
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Whether a chat reply is in flight.
    pub fn is_sending(&self) -> bool {
        self.sending
    }

    fn issue(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    /// Marks a reading as requested. Returns its sequence number, or `None` while another
    /// reading is still in flight.
    pub fn begin_reading(&mut self) -> Option<u64> {
        if self.loading {
            return None;
        }
        let seq = self.issue();
        self.latest_reading = Some(seq);
        self.loading = true;
        Some(seq)
    }

    /// Applies a reading reply. Returns false if the reply was stale and dropped.
    ///
    /// Failures become a visible message. A new reading restarts the chat from it.
    pub fn complete_reading(&mut self, seq: u64, result: Result<String, InterpretError>) -> bool {
        if self.latest_reading != Some(seq) {
            log::warn!("Discarding stale interpretation reply #{seq}");
            return false;
        }
        self.latest_reading = None;
        self.loading = false;
        let text = match result {
            Ok(text) if text.trim().is_empty() => EMPTY_READING.to_string(),
            Ok(text) => text,
            Err(err) => {
                log::warn!("Interpretation failed: {err}");
                format!("Error while interpreting: {err}")
            }
        };
        self.messages = vec![ChatMessage {
            role: ChatRole::Model,
            message: text.clone(),
        }];
        self.content = Some(text);
        true
    }

    /// Adds a user message to the transcript and marks a reply as requested.
    ///
    /// Returns the sequence number and the history to send (without the new message), or
    /// `None` for blank input or while a reply is pending.
    pub fn begin_chat(&mut self, message: &str) -> Option<(u64, Vec<ChatMessage>)> {
        if message.trim().is_empty() || self.sending {
            return None;
        }
        let history = self.messages.clone();
        self.messages.push(ChatMessage {
            role: ChatRole::User,
            message: message.to_string(),
        });
        let seq = self.issue();
        self.latest_chat = Some(seq);
        self.sending = true;
        Some((seq, history))
    }

    /// Applies a chat reply. Returns false if the reply was stale and dropped.
    pub fn complete_chat(&mut self, seq: u64, result: Result<String, InterpretError>) -> bool {
        if self.latest_chat != Some(seq) {
            log::warn!("Discarding stale chat reply #{seq}");
            return false;
        }
        self.latest_chat = None;
        self.sending = false;
        let message = result.unwrap_or_else(|err| {
            log::warn!("Chat failed: {err}");
            CHAT_FAILED.to_string()
        });
        self.messages.push(ChatMessage {
            role: ChatRole::Model,
            message,
        });
        true
    }

    /// Forgets the current reading. Replies still in flight will be dropped.
    pub fn reset(&mut self) {
        self.restore(None, Vec::new());
    }

    /// Shows a saved reading and its transcript. Replies still in flight will be dropped.
    pub fn restore(&mut self, content: Option<String>, messages: Vec<ChatMessage>) {
        self.latest_reading = None;
        self.latest_chat = None;
        self.loading = false;
        self.sending = false;
        self.messages = match (&content, messages.is_empty()) {
            (Some(text), true) => vec![ChatMessage {
                role: ChatRole::Model,
                message: text.clone(),
            }],
            _ => messages,
        };
        self.content = content;
    }

    /// Requests a reading in the background. Returns false if one is already in flight.
    ///
    /// `on_done` runs after the reply is queued, typically to request a repaint.
    pub fn submit_reading<F>(&mut self, interpreter: Arc<dyn Interpreter>, request: InterpretRequest, on_done: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let Some(seq) = self.begin_reading() else {
            return false;
        };
        log::info!("Requesting interpretation #{seq} for {} cards", request.cards.len());
        let sender = self.sender.clone();
        spawn_task(move || {
            let result = interpreter.interpret(&request);
            let _ = sender.send(InterpretationEvent::Reading { seq, result });
            on_done();
        });
        true
    }

    /// Sends a chat message in the background. Returns false if nothing was sent.
    pub fn submit_chat<F>(&mut self, interpreter: Arc<dyn Interpreter>, message: &str, config: AiConfig, on_done: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let Some((seq, history)) = self.begin_chat(message) else {
            return false;
        };
        let request = ChatRequest {
            history,
            message: message.to_string(),
            config,
        };
        let sender = self.sender.clone();
        spawn_task(move || {
            let result = interpreter.chat(&request);
            let _ = sender.send(InterpretationEvent::Chat { seq, result });
            on_done();
        });
        true
    }

    /// Applies every reply that has arrived. Returns how many were applied.
    pub fn poll(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.receiver.try_recv() {
            let fresh = match event {
                InterpretationEvent::Reading { seq, result } => self.complete_reading(seq, result),
                InterpretationEvent::Chat { seq, result } => self.complete_chat(seq, result),
            };
            if fresh {
                applied += 1;
            }
        }
        applied
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn spawn_task<F>(task: F)
where
    F: FnOnce() + Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn_blocking(task);
        }
        Err(_) => {
            std::thread::spawn(task);
        }
    }
}

#[cfg(target_arch = "wasm32")]
fn spawn_task<F>(task: F)
where
    F: FnOnce() + Send + 'static,
{
    wasm_bindgen_futures::spawn_local(async move { task() });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::builtin;
    use crate::types::{Card, ContextFile, SlotConnection};
    use eframe::egui::Pos2;
    use std::time::{Duration, Instant};

    struct Scripted(Result<String, InterpretError>);

    impl Interpreter for Scripted {
        fn interpret(&self, _request: &InterpretRequest) -> Result<String, InterpretError> {
            self.0.clone()
        }

        fn chat(&self, request: &ChatRequest) -> Result<String, InterpretError> {
            self.0.clone().map(|text| format!("{text} ({} before)", request.history.len()))
        }
    }

    fn request() -> InterpretRequest {
        let mut fool = PlacedCard::from_card(&Card::new("0", "The Fool", "Beginnings"), Pos2::new(140.4, 199.6));
        fool.is_reversed = true;
        InterpretRequest {
            cards: vec![fool],
            config: AiConfig::default(),
            template: builtin("three_card").unwrap().clone(),
        }
    }

    fn wait_for(tracker: &mut InterpretationTracker) -> usize {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let applied = tracker.poll();
            if applied > 0 || Instant::now() > deadline {
                return applied;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_prompt_lists_cards_with_orientation_and_rounded_position() {
        let prompt = build_prompt(&request());
        assert!(prompt.contains("LAYOUT USED: \"Three Card Spread\""));
        assert!(prompt.contains("Card 1: The Fool\n   - Meaning: \"Beginnings\""));
        assert!(prompt.contains("REVERSED"));
        assert!(prompt.contains("X=140, Y=200"));
        assert!(!prompt.contains("CONNECTIONS"));
        assert!(!prompt.contains("ADDITIONAL CONTEXT"));
    }

    #[test]
    fn test_prompt_includes_context_questions_and_valid_connections() {
        let mut request = request();
        request.config.context_files.push(ContextFile {
            name: "notes.txt".into(),
            content: "Mercury is retrograde.".into(),
        });
        request.config.session_questions = Some("Will I move abroad?".into());
        request.template.connections = vec![
            SlotConnection::new("past", "future"),
            SlotConnection::new("past", "gone"),
        ];

        let prompt = build_prompt(&request);
        assert!(prompt.contains("--- Start of file: notes.txt ---\nMercury is retrograde."));
        assert!(prompt.contains("Will I move abroad?"));
        assert!(prompt.contains("- Connection between \"Past\" and \"Future\""));
        assert_eq!(prompt.matches("- Connection between").count(), 1);
    }

    #[test]
    fn test_blank_system_instruction_uses_default() {
        let mut config = AiConfig::default();
        config.system_instruction = "   ".into();
        assert_eq!(system_instruction(&config), DEFAULT_SYSTEM_INSTRUCTION);

        config.system_instruction = "Be brief.".into();
        assert_eq!(system_instruction(&config), "Be brief.");
    }

    #[test]
    fn test_gemini_interpreter_checks_key_before_spread() {
        let interpreter = GeminiInterpreter::with_key(Some("  ".into()));
        assert_eq!(interpreter.interpret(&request()), Err(InterpretError::MissingCredentials));

        let mut empty = request();
        empty.cards.clear();
        let interpreter = GeminiInterpreter::with_key(Some("key".into()));
        assert_eq!(interpreter.interpret(&empty), Err(InterpretError::EmptySpread));

        let chat = ChatRequest {
            history: Vec::new(),
            message: "Hello".into(),
            config: AiConfig::default(),
        };
        assert_eq!(GeminiInterpreter::default().chat(&chat), Err(InterpretError::MissingCredentials));
    }

    #[test]
    fn test_reading_body_carries_instruction_prompt_and_temperature() {
        let mut request = request();
        request.config.system_instruction = "Be brief.".into();
        let body = reading_body(&request);

        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "Be brief.");
        assert_eq!(body["contents"].as_array().map(Vec::len), Some(1));
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], build_prompt(&request).as_str());
        assert_eq!(body["generationConfig"]["temperature"], 0.8);
    }

    #[test]
    fn test_chat_body_replays_history_then_new_message() {
        let request = ChatRequest {
            history: vec![
                ChatMessage { role: ChatRole::Model, message: "The Fool leads.".into() },
                ChatMessage { role: ChatRole::User, message: "And work?".into() },
                ChatMessage { role: ChatRole::Model, message: "Change is near.".into() },
            ],
            message: "When?".into(),
            config: AiConfig::default(),
        };
        let body = chat_body(&request);
        let contents = body["contents"].as_array().unwrap();

        let roles: Vec<_> = contents.iter().map(|c| c["role"].as_str().unwrap()).collect();
        assert_eq!(roles, vec!["model", "user", "model", "user"]);
        assert_eq!(contents[3]["parts"][0]["text"], "When?");
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], DEFAULT_SYSTEM_INSTRUCTION);
        assert!(body.get("generationConfig").is_none());
    }

    #[test]
    fn test_parse_reply_joins_parts_and_surfaces_errors() {
        let ok = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"The sun "},{"text":"rises."}]}}]}"#;
        assert_eq!(parse_reply(ok), Ok("The sun rises.".to_string()));

        assert_eq!(parse_reply(r#"{"candidates":[]}"#), Ok(String::new()));

        let failed = r#"{"error":{"code":400,"message":"API key not valid."}}"#;
        assert_eq!(parse_reply(failed), Err(InterpretError::Service("API key not valid.".into())));
        assert!(matches!(parse_reply("<html>"), Err(InterpretError::Service(_))));
    }

    #[test]
    fn test_endpoint_names_model() {
        let interpreter = GeminiInterpreter::with_key(Some("key".into())).with_model("gemini-2.0-flash");
        assert!(interpreter.endpoint().ends_with("/models/gemini-2.0-flash:generateContent"));
    }

    #[test]
    fn test_second_reading_blocked_while_loading() {
        let mut tracker = InterpretationTracker::new();
        let seq = tracker.begin_reading().unwrap();
        assert!(tracker.begin_reading().is_none());

        assert!(tracker.complete_reading(seq, Ok("The sun rises.".into())));
        assert!(!tracker.is_loading());
        assert_eq!(tracker.content(), Some("The sun rises."));
        assert!(tracker.begin_reading().is_some());
    }

    #[test]
    fn test_stale_reply_after_reset_is_discarded() {
        let mut tracker = InterpretationTracker::new();
        let old = tracker.begin_reading().unwrap();
        tracker.reset();
        let new = tracker.begin_reading().unwrap();

        assert!(!tracker.complete_reading(old, Ok("old table".into())));
        assert!(tracker.is_loading());
        assert!(tracker.complete_reading(new, Ok("new table".into())));
        assert_eq!(tracker.content(), Some("new table"));
    }

    #[test]
    fn test_failure_becomes_placeholder_and_clears_loading() {
        let mut tracker = InterpretationTracker::new();
        let seq = tracker.begin_reading().unwrap();
        tracker.complete_reading(seq, Err(InterpretError::MissingCredentials));

        assert!(!tracker.is_loading());
        assert!(tracker.content().unwrap().starts_with("Error while interpreting"));
    }

    #[test]
    fn test_chat_flow() {
        let mut tracker = InterpretationTracker::new();
        let seq = tracker.begin_reading().unwrap();
        tracker.complete_reading(seq, Ok("Reading".into()));

        assert!(tracker.begin_chat("  ").is_none());
        let (seq, history) = tracker.begin_chat("And love?").unwrap();
        assert_eq!(history.len(), 1);
        assert!(tracker.begin_chat("again").is_none());

        tracker.complete_chat(seq, Err(InterpretError::Service("down".into())));
        let roles: Vec<_> = tracker.messages().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![ChatRole::Model, ChatRole::User, ChatRole::Model]);
        assert_eq!(tracker.messages()[2].message, CHAT_FAILED);
    }

    #[test]
    fn test_restore_seeds_transcript_from_content() {
        let mut tracker = InterpretationTracker::new();
        tracker.restore(Some("Saved reading".into()), Vec::new());
        assert_eq!(tracker.messages().len(), 1);
        assert_eq!(tracker.content(), Some("Saved reading"));
    }

    #[test]
    fn test_background_reading_is_delivered() {
        let mut tracker = InterpretationTracker::new();
        let interpreter: Arc<dyn Interpreter> = Arc::new(Scripted(Ok("Done".into())));
        assert!(tracker.submit_reading(interpreter.clone(), request(), || {}));
        assert!(!tracker.submit_reading(interpreter.clone(), request(), || {}));

        assert_eq!(wait_for(&mut tracker), 1);
        assert_eq!(tracker.content(), Some("Done"));

        assert!(tracker.submit_chat(interpreter, "More?", AiConfig::default(), || {}));
        assert_eq!(wait_for(&mut tracker), 1);
        assert_eq!(tracker.messages().last().unwrap().message, "Done (1 before)");
    }
}
