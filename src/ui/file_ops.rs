//! File operations for session files and reading reports.
//!
//! This module handles all file I/O operations including native file dialogs
//! and WASM-compatible browser-based file operations.

use super::state::{FileOperationResult, PendingFileOperation, TarotApp};
use crate::export::{ExportRequest, Exporter, ReportOutline, TextExporter};
use crate::session::{NoticeLevel, SessionFile};
use eframe::egui;
use std::sync::mpsc::Sender;

/// Default name offered when saving a session file.
const SESSION_FILE_NAME: &str = "tarot-session.json";

/// Runs a dialog future on the tokio runtime the binary starts.
#[cfg(not(target_arch = "wasm32"))]
fn spawn_dialog<F>(task: F)
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(task);
        }
        Err(err) => log::error!("No async runtime for file dialog: {err}"),
    }
}

/// What an open dialog reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpenKind {
    Session,
    Context,
}

impl OpenKind {
    fn filter_name(self) -> &'static str {
        match self {
            OpenKind::Session => "JSON",
            OpenKind::Context => "Text",
        }
    }

    fn extensions(self) -> &'static [&'static str] {
        match self {
            OpenKind::Session => &["json"],
            OpenKind::Context => &["txt", "md"],
        }
    }

    /// `accept` attribute of the browser file input.
    #[cfg(target_arch = "wasm32")]
    fn accept(self) -> &'static str {
        match self {
            OpenKind::Session => ".json,application/json",
            OpenKind::Context => ".txt,.md,text/plain,text/markdown",
        }
    }

    fn loaded(self, path: String, content: String) -> FileOperationResult {
        match self {
            OpenKind::Session => FileOperationResult::LoadCompleted(path, content),
            OpenKind::Context => FileOperationResult::ContextLoaded(path, content),
        }
    }
}

fn report(sender: &Option<Sender<FileOperationResult>>, result: FileOperationResult) {
    if let Some(tx) = sender {
        let _ = tx.send(result);
    }
}

impl TarotApp {
    /// Handles pending file operations for both native and WASM platforms.
    ///
    /// This method processes completed async file operations and initiates new ones.
    ///
    /// # Arguments
    ///
    /// * `ctx` - The egui context for requesting repaints
    pub fn handle_pending_operations(&mut self, ctx: &egui::Context) {
        let mut completed = Vec::new();
        if let Some(receiver) = &self.file.file_operation_receiver {
            while let Ok(result) = receiver.try_recv() {
                completed.push(result);
            }
        }
        for result in completed {
            self.apply_file_result(result);
        }

        let Some(operation) = self.file.pending_operation.take() else {
            return;
        };
        match operation {
            PendingFileOperation::SaveSession => match self.session.to_file().to_json() {
                Ok(json) => self.save_file(ctx, SESSION_FILE_NAME, "JSON", "json", json.into_bytes()),
                Err(err) => self.notify(NoticeLevel::Warning, err.to_string()),
            },
            PendingFileOperation::OpenSession => self.open_text_file(ctx, OpenKind::Session),
            PendingFileOperation::AddContextFile => self.open_text_file(ctx, OpenKind::Context),
            PendingFileOperation::ExportReport => self.export_report(ctx),
        }
    }

    fn apply_file_result(&mut self, result: FileOperationResult) {
        match result {
            FileOperationResult::SaveCompleted(path) => {
                log::info!("Saved {path}");
                self.notify(NoticeLevel::Info, format!("Saved {path}"));
            }
            FileOperationResult::LoadCompleted(path, content) => match SessionFile::from_json(&content) {
                Ok(file) => {
                    log::info!("Opened session file {path}");
                    self.session.apply_file(file);
                    self.interaction.selected_card = None;
                    self.notify(NoticeLevel::Info, format!("Opened {path}"));
                }
                Err(err) => {
                    log::error!("Failed to open {path}: {err}");
                    self.notify(NoticeLevel::Warning, err.to_string());
                }
            },
            FileOperationResult::ContextLoaded(path, content) => {
                self.add_context_file(&path, content);
                self.notify(NoticeLevel::Info, format!("Added {path} to the context"));
            }
            FileOperationResult::OperationFailed(error) => {
                log::error!("File operation failed: {error}");
                self.notify(NoticeLevel::Warning, error);
            }
        }
    }

    /// Everything the report needs about the current reading.
    pub fn export_request(&self) -> ExportRequest {
        ExportRequest {
            placements: self.session.placements().cards().to_vec(),
            template: self.session.active_template().clone(),
            settings: self.session.config().pdf_settings.clone(),
            client_name: self.session.active_client().map(|c| c.name.clone()),
            interpretation: self.session.interpretation().content().map(str::to_string),
            canvas_size: self.canvas.size(),
            date: chrono::Utc::now(),
        }
    }

    /// Builds the report of the current reading and saves it.
    fn export_report(&mut self, ctx: &egui::Context) {
        let request = self.export_request();
        let exporter = TextExporter;
        let rendered = ReportOutline::build(&request)
            .and_then(|outline| Ok((exporter.export(&outline)?, outline.file_name)));
        match rendered {
            Ok((bytes, name)) => {
                let file_name = format!("{name}.{}", exporter.extension());
                self.save_file(ctx, &file_name, "Report", exporter.extension(), bytes);
            }
            Err(err) => self.notify(NoticeLevel::Warning, err.to_string()),
        }
    }

    /// Offers `content` for saving under `file_name`.
    ///
    /// # Arguments
    ///
    /// * `ctx` - The egui context for requesting repaints
    /// * `file_name` - Suggested file name
    /// * `filter_name` - Label of the dialog's file filter
    /// * `extension` - Extension accepted by the filter
    /// * `content` - Bytes to write
    fn save_file(
        &mut self,
        ctx: &egui::Context,
        file_name: &str,
        filter_name: &str,
        extension: &str,
        content: Vec<u8>,
    ) {
        let ctx = ctx.clone();
        let sender = self.file.file_operation_sender.clone();

        #[cfg(target_arch = "wasm32")]
        {
            let _ = (filter_name, extension);
            // Use synchronous download for Firefox compatibility
            let text = String::from_utf8_lossy(&content);
            match Self::trigger_download(file_name, &text) {
                Ok(()) => report(&sender, FileOperationResult::SaveCompleted(file_name.to_string())),
                Err(e) => report(&sender, FileOperationResult::OperationFailed(e)),
            }
            ctx.request_repaint();
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            let file_name = file_name.to_string();
            let filter_name = filter_name.to_string();
            let extension = extension.to_string();
            spawn_dialog(async move {
                if let Some(handle) = rfd::AsyncFileDialog::new()
                    .add_filter(filter_name.as_str(), &[extension.as_str()])
                    .set_file_name(file_name.as_str())
                    .save_file()
                    .await
                {
                    let path = handle.path();
                    match std::fs::write(path, content) {
                        Ok(()) => report(&sender, FileOperationResult::SaveCompleted(path.display().to_string())),
                        Err(e) => report(
                            &sender,
                            FileOperationResult::OperationFailed(format!("Failed to save file: {e}")),
                        ),
                    }
                }
                ctx.request_repaint();
            });
        }
    }

    /// Opens a file dialog to read a session file or a context document.
    fn open_text_file(&mut self, ctx: &egui::Context, kind: OpenKind) {
        let ctx = ctx.clone();
        let sender = self.file.file_operation_sender.clone();

        #[cfg(target_arch = "wasm32")]
        {
            wasm_bindgen_futures::spawn_local(async move {
                match Self::show_open_file_picker(kind.accept()).await {
                    Some(file) => {
                        let filename = file.name();
                        match Self::read_file(file).await {
                            Ok(content) => report(&sender, kind.loaded(filename, content)),
                            Err(e) => report(&sender, FileOperationResult::OperationFailed(e)),
                        }
                    }
                    None => log::info!("Open dialog cancelled or API not supported"),
                }
                ctx.request_repaint();
            });
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            spawn_dialog(async move {
                if let Some(handle) = rfd::AsyncFileDialog::new()
                    .add_filter(kind.filter_name(), kind.extensions())
                    .pick_file()
                    .await
                {
                    let path = handle.path();
                    match std::fs::read_to_string(path) {
                        Ok(content) => report(&sender, kind.loaded(path.display().to_string(), content)),
                        Err(e) => report(
                            &sender,
                            FileOperationResult::OperationFailed(format!("Failed to read file: {e}")),
                        ),
                    }
                }
                ctx.request_repaint();
            });
        }
    }

    /// Triggers a file download in the browser (WASM only, Firefox-compatible).
    ///
    /// Creates a temporary anchor element with a blob URL and clicks it.
    ///
    /// # Returns
    ///
    /// `Ok(())` if successful, or an error message if the operation fails.
    #[cfg(target_arch = "wasm32")]
    fn trigger_download(filename: &str, content: &str) -> Result<(), String> {
        use eframe::wasm_bindgen::{JsCast, JsValue};

        let window = web_sys::window().ok_or("No window found")?;
        let document = window.document().ok_or("No document found")?;

        let blob_parts = js_sys::Array::new();
        blob_parts.push(&JsValue::from_str(content));
        let blob_options = web_sys::BlobPropertyBag::new();
        blob_options.set_type(if filename.ends_with(".json") {
            "application/json"
        } else {
            "text/plain"
        });
        let blob = web_sys::Blob::new_with_str_sequence_and_options(&blob_parts, &blob_options)
            .map_err(|_| "Failed to create blob")?;
        let url = web_sys::Url::create_object_url_with_blob(&blob)
            .map_err(|_| "Failed to create object URL")?;

        let anchor = document
            .create_element("a")
            .map_err(|_| "Failed to create anchor element")?
            .dyn_into::<web_sys::HtmlAnchorElement>()
            .map_err(|_| "Failed to cast to anchor element")?;
        anchor.set_href(&url);
        anchor.set_download(filename);

        let body = document.body().ok_or("No body found")?;
        body.append_child(&anchor).map_err(|_| "Failed to append anchor")?;
        anchor.click();
        body.remove_child(&anchor).map_err(|_| "Failed to remove anchor")?;

        web_sys::Url::revoke_object_url(&url).map_err(|_| "Failed to revoke object URL")?;
        Ok(())
    }

    /// Opens a file picker in the browser and waits for the user's choice (WASM only).
    #[cfg(target_arch = "wasm32")]
    async fn show_open_file_picker(accept: &str) -> Option<web_sys::File> {
        use eframe::wasm_bindgen::closure::Closure;
        use eframe::wasm_bindgen::JsCast;

        let window = web_sys::window()?;
        let document = window.document()?;
        let input = document
            .create_element("input")
            .ok()?
            .dyn_into::<web_sys::HtmlInputElement>()
            .ok()?;
        input.set_type("file");
        input.set_accept(accept);

        let (sender, receiver) = futures::channel::oneshot::channel::<Option<web_sys::File>>();
        let sender = std::rc::Rc::new(std::cell::RefCell::new(Some(sender)));
        let onchange = Closure::wrap(Box::new(move |event: web_sys::Event| {
            let file = event
                .target()
                .and_then(|t| t.dyn_into::<web_sys::HtmlInputElement>().ok())
                .and_then(|input| input.files())
                .and_then(|files| files.get(0));
            if let Some(sender) = sender.borrow_mut().take() {
                let _ = sender.send(file);
            }
        }) as Box<dyn FnMut(_)>);
        input.set_onchange(Some(onchange.as_ref().unchecked_ref()));
        onchange.forget();

        document.body()?.append_child(&input).ok()?;
        input.click();
        let file = receiver.await.ok()??;
        document.body()?.remove_child(&input).ok()?;
        Some(file)
    }

    /// Reads a browser `File` as text (WASM only).
    #[cfg(target_arch = "wasm32")]
    async fn read_file(file: web_sys::File) -> Result<String, String> {
        use eframe::wasm_bindgen::closure::Closure;
        use eframe::wasm_bindgen::{JsCast, JsValue};

        let file_reader =
            web_sys::FileReader::new().map_err(|_| "Failed to create FileReader".to_string())?;

        let promise = js_sys::Promise::new(&mut |resolve, reject| {
            let reader = file_reader.clone();
            let onload = Closure::wrap(Box::new(move |_event: web_sys::ProgressEvent| {
                if let Ok(result) = reader.result() {
                    let _ = resolve.call1(&JsValue::NULL, &result);
                }
            }) as Box<dyn FnMut(_)>);
            file_reader.set_onload(Some(onload.as_ref().unchecked_ref()));
            onload.forget();

            let onerror = Closure::wrap(Box::new(move |_event: web_sys::ProgressEvent| {
                let _ = reject.call1(&JsValue::NULL, &JsValue::from_str("Failed to read file"));
            }) as Box<dyn FnMut(_)>);
            file_reader.set_onerror(Some(onerror.as_ref().unchecked_ref()));
            onerror.forget();
        });

        file_reader
            .read_as_text(&file)
            .map_err(|_| "Failed to start reading file".to_string())?;
        let result = wasm_bindgen_futures::JsFuture::from(promise)
            .await
            .map_err(|e| format!("Failed to read file: {e:?}"))?;
        result
            .as_string()
            .ok_or_else(|| "File content is not a string".to_string())
    }
}
