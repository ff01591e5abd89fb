//! User interface for the reading table.
//!
//! # Module Organization
//!
//! - `state` - Front-end state structures and the main TarotApp
//! - `canvas` - Canvas navigation, zooming, panning and card dragging
//! - `rendering` - Drawing slots, connections and cards
//! - `panels` - Toolbar, palette, interpretation panel, dialogs and layout builder
//! - `editors` - Settings, client and saved reading windows
//! - `file_ops` - Session files and report export for native and WASM

mod canvas;
mod editors;
mod file_ops;
mod panels;
mod rendering;
mod state;

pub use state::TarotApp;

use crate::session::{Notice, NoticeLevel};
use eframe::egui;

impl eframe::App for TarotApp {
    /// Writes settings, clients and layouts to eframe storage.
    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        self.session.persistence().store().write_to(storage);
    }

    /// Main update function called by egui for each frame.
    ///
    /// Lays out the toolbar, the palette on the left, the interpretation panel on the
    /// right and the canvas in the middle, then resolves any drag that ended.
    ///
    /// # Arguments
    ///
    /// * `ctx` - The egui context
    /// * `_frame` - The eframe frame
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        ctx.set_visuals(egui::Visuals::dark());

        // Handle pending file operations
        self.handle_pending_operations(ctx);

        // Apply finished interpretation replies
        if self.session.poll_interpretation() {
            ctx.request_repaint();
        }
        for notice in self.session.take_notices() {
            self.status = Some(notice);
        }

        self.handle_undo_redo_keys(ctx);

        egui::TopBottomPanel::top("top_toolbar").show(ctx, |ui| {
            self.draw_toolbar(ui);
        });
        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            self.draw_status_bar(ui);
        });
        egui::SidePanel::left("palette_panel")
            .resizable(true)
            .default_width(240.0)
            .show(ctx, |ui| {
                self.draw_palette(ui);
            });
        egui::SidePanel::right("interpretation_panel")
            .resizable(true)
            .default_width(320.0)
            .show(ctx, |ui| {
                self.draw_interpretation_panel(ui);
            });
        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                self.draw_canvas(ui);
            });

        self.draw_zoom_controls(ctx);
        self.draw_layout_builder(ctx);
        self.draw_anonymous_save_dialog(ctx);
        self.draw_settings_window(ctx);
        self.draw_client_editor(ctx);
        self.draw_reading_editor(ctx);

        // Palette drags end over the canvas, so drops resolve after every panel ran
        self.handle_drag_release(ctx);

        if self.session.interpretation().is_loading() || self.session.interpretation().is_sending() {
            ctx.request_repaint_after(std::time::Duration::from_millis(200));
        }
    }
}

impl TarotApp {
    /// Shows a message in the status bar.
    pub fn notify(&mut self, level: NoticeLevel, text: impl Into<String>) {
        let text = text.into();
        match level {
            NoticeLevel::Info => log::info!("{text}"),
            NoticeLevel::Warning => log::warn!("{text}"),
        }
        self.status = Some(Notice { level, text });
    }

    /// Handles Ctrl/Cmd+Z for undo and Ctrl/Cmd+Shift+Z or Ctrl/Cmd+Y for redo.
    ///
    /// # Arguments
    ///
    /// * `ctx` - The egui context for checking input
    fn handle_undo_redo_keys(&mut self, ctx: &egui::Context) {
        // Text fields keep their own undo
        if ctx.wants_keyboard_input() {
            return;
        }
        let (undo, redo) = ctx.input(|i| {
            let undo = i.key_pressed(egui::Key::Z) && i.modifiers.command && !i.modifiers.shift;
            let redo = (i.key_pressed(egui::Key::Z) && i.modifiers.command && i.modifiers.shift)
                || (i.key_pressed(egui::Key::Y) && i.modifiers.command);
            (undo, redo)
        });
        if undo {
            self.session.placements_mut().undo();
        } else if redo {
            self.session.placements_mut().redo();
        }
    }
}
