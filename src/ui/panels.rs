//! Side panels, toolbar, dialogs and the layout builder window.

use super::state::{PendingFileOperation, TarotApp};
use crate::catalog::{filter_by_name, DeckCatalog, DeckLibrary};
use crate::drag::DragSession;
use crate::session::{NoticeLevel, SaveOutcome};
use crate::templates::FREE_TEMPLATE_ID;
use crate::types::{ChatRole, Client, DeckStyle};
use eframe::egui;

/// Radius of a slot marker in the builder area.
const BUILDER_SLOT_RADIUS: f32 = 14.0;

impl TarotApp {
    /// Draws the toolbar across the top of the window.
    pub fn draw_toolbar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal_wrapped(|ui| {
            let placements = self.session.placements();
            let (can_undo, can_redo) = (placements.can_undo(), placements.can_redo());
            ui.add_enabled_ui(can_undo, |ui| {
                if ui.button("⟲ Undo").clicked() {
                    self.session.placements_mut().undo();
                }
            });
            ui.add_enabled_ui(can_redo, |ui| {
                if ui.button("⟳ Redo").clicked() {
                    self.session.placements_mut().redo();
                }
            });

            ui.separator();
            self.draw_template_selector(ui);

            ui.separator();
            if ui.button("Save Reading").clicked() {
                self.request_save_reading();
            }
            if ui.button("Restore").clicked() {
                self.session.restore_last_state();
            }
            if ui.button("Clear").clicked() {
                self.session.placements_mut().clear();
                self.interaction.selected_card = None;
            }

            ui.separator();
            let loading = self.session.interpretation().is_loading();
            ui.add_enabled_ui(!loading, |ui| {
                if ui.button("✨ Interpret").clicked() {
                    self.request_interpretation(ui.ctx());
                }
            });

            ui.separator();
            if ui.button("Open").clicked() {
                self.file.pending_operation = Some(PendingFileOperation::OpenSession);
            }
            if ui.button("Save Session").clicked() {
                self.file.pending_operation = Some(PendingFileOperation::SaveSession);
            }
            if ui.button("Export Report").clicked() {
                self.file.pending_operation = Some(PendingFileOperation::ExportReport);
            }

            if ui.button("⚙ Settings").clicked() {
                self.open_settings();
            }

            ui.separator();
            ui.checkbox(&mut self.canvas.show_slots, "Show slots");
        });
    }

    fn draw_template_selector(&mut self, ui: &mut egui::Ui) {
        let active_id = self.session.active_template().id.clone();
        let active_name = self.session.active_template().name.clone();
        let mut selected = active_id.clone();
        egui::ComboBox::from_id_salt("template_selector")
            .selected_text(active_name)
            .show_ui(ui, |ui| {
                for template in self.session.templates().all() {
                    ui.selectable_value(&mut selected, template.id.clone(), template.name.as_str());
                }
            });
        if selected != active_id {
            self.session.select_template(&selected);
        }

        let is_custom = self.session.active_template().is_custom;
        ui.add_enabled_ui(is_custom, |ui| {
            if ui.button("🗑").on_hover_text("Delete this layout").clicked() {
                if let Err(err) = self.session.delete_custom_layout(&active_id) {
                    self.notify(NoticeLevel::Warning, err.to_string());
                }
            }
        });
        if ui.button("New Layout").clicked() {
            self.builder.start();
        }
    }

    /// Saves the reading, asking first when no client is selected.
    pub fn request_save_reading(&mut self) {
        if self.session.active_client().is_none() && !self.session.placements().is_empty() {
            self.interaction.confirm_anonymous_save = true;
            return;
        }
        if self.session.save_reading() == SaveOutcome::NothingToSave {
            self.notify(NoticeLevel::Info, "Place some cards before saving");
        }
    }

    /// Starts an interpretation of the table in the background.
    pub fn request_interpretation(&mut self, ctx: &egui::Context) {
        let ctx = ctx.clone();
        match self
            .session
            .interpret(self.interpreter.clone(), move || ctx.request_repaint())
        {
            Ok(true) => log::info!("Interpretation requested"),
            Ok(false) => {}
            Err(err) => self.notify(NoticeLevel::Warning, err.to_string()),
        }
    }

    /// Draws the left panel: client selector, deck selector and the card palette.
    pub fn draw_palette(&mut self, ui: &mut egui::Ui) {
        self.draw_clients(ui);
        ui.separator();

        ui.heading("Cards");
        let library = DeckLibrary::new(self.session.config());
        let decks = library.decks();
        let mut deck = self.session.active_deck().to_string();
        let deck_name = decks
            .iter()
            .find(|(id, _)| *id == deck)
            .map(|(_, name)| name.clone())
            .unwrap_or_default();
        egui::ComboBox::from_id_salt("deck_selector")
            .selected_text(deck_name)
            .show_ui(ui, |ui| {
                for (id, name) in &decks {
                    ui.selectable_value(&mut deck, id.clone(), name.as_str());
                }
            });
        let cards = library.list_cards(&deck);
        if deck != self.session.active_deck() {
            self.session.select_deck(&deck);
        }

        ui.add(egui::TextEdit::singleline(&mut self.interaction.palette_search).hint_text("Search cards"));
        ui.add_space(4.0);

        egui::ScrollArea::vertical()
            .id_salt("palette")
            .auto_shrink([false, false])
            .show(ui, |ui| {
                for card in filter_by_name(&cards, &self.interaction.palette_search) {
                    let response = ui
                        .add_sized(
                            [ui.available_width(), 28.0],
                            egui::Button::new(card.name.as_str()).sense(egui::Sense::drag()),
                        )
                        .on_hover_text(card.description.as_str());
                    if response.drag_started() {
                        log::debug!("Dragging {} from the palette", card.name);
                        self.interaction.drag = Some(DragSession::from_palette(card.clone()));
                        self.interaction.drag_start = None;
                    }
                }
            });
    }

    /// Draws the client selector with the active client's saved readings.
    fn draw_clients(&mut self, ui: &mut egui::Ui) {
        ui.heading("Client");
        let active = self.session.active_client().map(|c| c.id.clone());
        let active_name = self
            .session
            .active_client()
            .map_or_else(|| "No client".to_string(), |c| c.name.clone());
        let mut selected = active.clone();
        egui::ComboBox::from_id_salt("client_selector")
            .selected_text(active_name)
            .show_ui(ui, |ui| {
                ui.selectable_value(&mut selected, None, "No client");
                for client in self.session.clients() {
                    ui.selectable_value(&mut selected, Some(client.id.clone()), client.name.as_str());
                }
            });
        if selected != active {
            self.session.select_client(selected.as_deref());
        }

        ui.horizontal(|ui| {
            ui.add(
                egui::TextEdit::singleline(&mut self.interaction.new_client_name)
                    .hint_text("New client")
                    .desired_width(120.0),
            );
            let name = self.interaction.new_client_name.trim().to_string();
            if ui.add_enabled(!name.is_empty(), egui::Button::new("Add")).clicked() {
                self.session.add_client(Client::new(name));
                self.interaction.new_client_name.clear();
            }
        });

        let Some(client) = self.session.active_client().cloned() else {
            return;
        };
        ui.horizontal(|ui| {
            if ui.button("New Reading").clicked() {
                self.session.start_new_reading(&client.id);
                self.interaction.selected_card = None;
            }
            if ui.button("Edit Client").clicked() {
                self.start_editing_client(&client);
            }
            if ui.button("Delete Client").clicked() {
                self.session.delete_client(&client.id);
            }
        });

        if client.readings_history.is_empty() {
            ui.weak("No saved readings");
            return;
        }
        egui::CollapsingHeader::new(format!("Readings ({})", client.readings_history.len()))
            .id_salt("client_readings")
            .show(ui, |ui| {
                for reading in &client.readings_history {
                    ui.horizontal(|ui| {
                        let title = reading.title.as_deref().unwrap_or(&reading.layout_name);
                        ui.label(format!("{} · {}", reading.date.format("%Y-%m-%d"), title));
                        if ui.small_button("Load").clicked() {
                            self.session.load_reading(reading);
                        }
                        if ui.small_button("✏").on_hover_text("Edit title and interpretation").clicked() {
                            self.start_editing_reading(&client.id, reading);
                        }
                        if ui.small_button("🗑").clicked() {
                            self.session.delete_reading(&client.id, &reading.id);
                        }
                    });
                }
            });
    }

    /// Draws the right panel: session settings, the interpretation and the chat.
    pub fn draw_interpretation_panel(&mut self, ui: &mut egui::Ui) {
        self.draw_session_settings(ui);
        ui.separator();

        ui.heading("Interpretation");
        let tracker = self.session.interpretation();
        let loading = tracker.is_loading();
        let sending = tracker.is_sending();
        let content = tracker.content().map(str::to_string);
        let messages = tracker.messages().to_vec();

        egui::ScrollArea::vertical()
            .id_salt("interpretation")
            .auto_shrink([false, false])
            .max_height(ui.available_height() - 60.0)
            .stick_to_bottom(true)
            .show(ui, |ui| {
                if loading {
                    ui.horizontal(|ui| {
                        ui.spinner();
                        ui.label("Reading the cards…");
                    });
                } else if content.is_none() {
                    ui.weak("Place cards on the table and press Interpret.");
                }
                for message in &messages {
                    let (who, color) = match message.role {
                        ChatRole::User => ("You", ui.visuals().hyperlink_color),
                        ChatRole::Model => ("Reader", ui.visuals().text_color()),
                    };
                    ui.colored_label(color, egui::RichText::new(who).strong());
                    ui.label(message.message.as_str());
                    ui.add_space(6.0);
                }
                if sending {
                    ui.spinner();
                }
            });

        ui.separator();
        let can_chat = content.is_some() && !sending;
        ui.horizontal(|ui| {
            let input = ui.add_enabled(
                can_chat,
                egui::TextEdit::singleline(&mut self.interaction.chat_input)
                    .hint_text("Ask a follow-up question")
                    .desired_width(ui.available_width() - 60.0),
            );
            let submitted = input.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
            if (ui.add_enabled(can_chat, egui::Button::new("Send")).clicked() || submitted) && can_chat {
                let ctx = ui.ctx().clone();
                let message = std::mem::take(&mut self.interaction.chat_input);
                self.session
                    .send_chat(self.interpreter.clone(), &message, move || ctx.request_repaint());
            }
        });
    }

    fn draw_session_settings(&mut self, ui: &mut egui::Ui) {
        egui::CollapsingHeader::new("Session")
            .id_salt("session_settings")
            .default_open(false)
            .show(ui, |ui| {
                let config = self.session.config();
                let mut name = config.session_name.clone().unwrap_or_default();
                let mut questions = config.session_questions.clone().unwrap_or_default();
                let mut instruction = config.system_instruction.clone();
                let mut style = config.deck_style;
                let templates = config.question_templates.clone();

                let mut changed = false;
                ui.label("Session name");
                changed |= ui.text_edit_singleline(&mut name).changed();

                ui.horizontal(|ui| {
                    ui.label("Questions");
                    egui::ComboBox::from_id_salt("question_templates")
                        .selected_text("Templates")
                        .show_ui(ui, |ui| {
                            for template in &templates {
                                if ui.selectable_label(false, template.label.as_str()).clicked() {
                                    questions = template.questions.clone();
                                    changed = true;
                                }
                            }
                        });
                });
                changed |= ui
                    .add(egui::TextEdit::multiline(&mut questions).desired_rows(3))
                    .changed();

                ui.label("Deck style");
                egui::ComboBox::from_id_salt("deck_style")
                    .selected_text(format!("{style:?}"))
                    .show_ui(ui, |ui| {
                        for option in DeckStyle::ALL {
                            changed |= ui
                                .selectable_value(&mut style, option, format!("{option:?}"))
                                .changed();
                        }
                    });

                ui.label("Reader instructions");
                changed |= ui
                    .add(egui::TextEdit::multiline(&mut instruction).desired_rows(3))
                    .changed();

                if changed {
                    self.session.update_config(|config| {
                        config.session_name = Some(name).filter(|n| !n.trim().is_empty());
                        config.session_questions = Some(questions).filter(|q| !q.trim().is_empty());
                        config.system_instruction = instruction;
                        config.deck_style = style;
                    });
                }
            });
    }

    /// Draws the zoom controls in the bottom-right corner of the canvas.
    pub fn draw_zoom_controls(&mut self, ctx: &egui::Context) {
        let corner = self.canvas.rect.right_bottom() - egui::vec2(16.0, 16.0);
        egui::Area::new(egui::Id::new("zoom_controls"))
            .fixed_pos(corner)
            .pivot(egui::Align2::RIGHT_BOTTOM)
            .show(ctx, |ui| {
                egui::Frame::popup(ui.style()).show(ui, |ui| {
                    ui.horizontal(|ui| {
                        if ui.button("−").on_hover_text("Zoom out").clicked() {
                            self.canvas.viewport.zoom_out();
                        }
                        ui.label(format!("{:.0}%", self.canvas.viewport.zoom() * 100.0));
                        if ui.button("+").on_hover_text("Zoom in").clicked() {
                            self.canvas.viewport.zoom_in();
                        }
                        if ui.button("Reset").clicked() {
                            self.canvas.viewport.reset_view();
                        }
                    });
                });
            });
    }

    /// Asks before saving a reading that belongs to no client.
    pub fn draw_anonymous_save_dialog(&mut self, ctx: &egui::Context) {
        if !self.interaction.confirm_anonymous_save {
            return;
        }
        egui::Window::new("No client selected")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, egui::vec2(0.0, 0.0))
            .show(ctx, |ui| {
                ui.label("The reading will be kept on this device without a client. Continue?");
                ui.horizontal(|ui| {
                    if ui.button("Save Anyway").clicked() {
                        self.session.save_reading();
                        self.interaction.confirm_anonymous_save = false;
                    }
                    if ui.button("Cancel").clicked() {
                        self.interaction.confirm_anonymous_save = false;
                    }
                });
            });
    }

    /// Draws the layout builder window while it is open.
    pub fn draw_layout_builder(&mut self, ctx: &egui::Context) {
        if !self.builder.open {
            return;
        }
        let mut open = true;
        egui::Window::new("Layout Builder")
            .open(&mut open)
            .default_width(640.0)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.label("Name");
                    ui.text_edit_singleline(&mut self.builder.draft.name);
                });
                ui.horizontal(|ui| {
                    ui.label("Description");
                    ui.text_edit_singleline(&mut self.builder.draft.description);
                });
                ui.separator();

                ui.horizontal_top(|ui| {
                    ui.vertical(|ui| {
                        ui.set_width(260.0);
                        self.draw_builder_slot_list(ui);
                        ui.separator();
                        self.draw_builder_presets(ui);
                    });
                    self.draw_builder_area(ui);
                });

                if let Some(error) = &self.builder.error {
                    ui.colored_label(ui.visuals().error_fg_color, error.as_str());
                }
                ui.separator();
                if ui.button("Create Layout").clicked() {
                    match self.builder.draft.build() {
                        Ok(template) => {
                            self.session.add_custom_layout(template);
                            self.builder.open = false;
                        }
                        Err(err) => self.builder.error = Some(err.to_string()),
                    }
                }
            });
        if !open {
            self.builder.open = false;
        }
    }

    fn draw_builder_slot_list(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            if ui.button("Add Slot").clicked() {
                self.builder.draft.add_slot();
            }
            if self.builder.draft.is_linking() {
                if ui.button("Cancel Link").clicked() {
                    self.builder.draft.cancel_linking();
                }
            } else if ui.button("Link").on_hover_text("Connect the selected slot").clicked() {
                if let Err(err) = self.builder.draft.start_linking() {
                    self.builder.error = Some(err.to_string());
                }
            }
        });

        let slots = self.builder.draft.slots().to_vec();
        let selected = self.builder.draft.selected().map(str::to_string);
        let last = slots.len().saturating_sub(1);
        for (index, slot) in slots.iter().enumerate() {
            ui.horizontal(|ui| {
                let is_selected = selected.as_deref() == Some(slot.id.as_str());
                if ui.selectable_label(is_selected, format!("{}", index + 1)).clicked() {
                    self.builder_click_slot(&slot.id);
                }
                let mut label = slot.label.clone();
                if ui
                    .add(egui::TextEdit::singleline(&mut label).desired_width(120.0))
                    .changed()
                {
                    let _ = self.builder.draft.rename_slot(&slot.id, label);
                }
                if ui.add_enabled(index > 0, egui::Button::new("⏶").small()).clicked() {
                    self.builder.draft.reorder(index, index - 1);
                }
                if ui.add_enabled(index < last, egui::Button::new("⏷").small()).clicked() {
                    self.builder.draft.reorder(index, index + 1);
                }
                if ui.small_button("🗑").clicked() {
                    let _ = self.builder.draft.remove_slot(&slot.id);
                }
            });
        }

        let connections = self.builder.draft.connections().to_vec();
        if connections.is_empty() {
            return;
        }
        ui.label("Connections");
        let label_of = |id: &str| {
            slots
                .iter()
                .find(|s| s.id == id)
                .map_or_else(|| id.to_string(), |s| s.label.clone())
        };
        for (index, connection) in connections.iter().enumerate() {
            ui.horizontal(|ui| {
                ui.label(format!("{} ↔ {}", label_of(&connection.from), label_of(&connection.to)));
                if ui.small_button("🗑").clicked() {
                    self.builder.draft.remove_connection(index);
                }
            });
        }
    }

    fn draw_builder_presets(&mut self, ui: &mut egui::Ui) {
        ui.label("Presets");
        let presets = self.session.templates().presets().to_vec();
        for preset in &presets {
            ui.horizontal(|ui| {
                if ui.small_button(preset.name.as_str()).clicked() {
                    self.builder.draft.load_preset(preset);
                }
                if ui.small_button("🗑").clicked() {
                    if let Err(err) = self.session.delete_preset(&preset.id) {
                        self.builder.error = Some(err.to_string());
                    }
                }
            });
        }
        ui.horizontal(|ui| {
            ui.add(
                egui::TextEdit::singleline(&mut self.builder.preset_name)
                    .hint_text("Preset name")
                    .desired_width(140.0),
            );
            if ui.button("Save Preset").clicked() {
                match self.builder.draft.save_as_preset(&self.builder.preset_name) {
                    Ok(preset) => {
                        self.session.add_preset(preset);
                        self.builder.preset_name.clear();
                    }
                    Err(err) => self.builder.error = Some(err.to_string()),
                }
            }
        });
    }

    /// The builder area: click a slot to select or link it, click elsewhere to move
    /// the selected slot there.
    fn draw_builder_area(&mut self, ui: &mut egui::Ui) {
        let (response, painter) = ui.allocate_painter(egui::vec2(320.0, 420.0), egui::Sense::click());
        let area = response.rect;
        painter.rect_filled(area, 6.0, egui::Color32::from_rgb(24, 20, 36));

        let slots = self.builder.draft.slots().to_vec();
        let position = |slot: &crate::types::Slot| area.min + slot.center(area.size()).to_vec2();

        for connection in self.builder.draft.connections() {
            let from = slots.iter().find(|s| s.id == connection.from);
            let to = slots.iter().find(|s| s.id == connection.to);
            if let (Some(a), Some(b)) = (from, to) {
                painter.line_segment(
                    [position(a), position(b)],
                    egui::Stroke::new(2.0, egui::Color32::from_gray(140)),
                );
            }
        }
        let selected = self.builder.draft.selected();
        for (index, slot) in slots.iter().enumerate() {
            let center = position(slot);
            let fill = if selected == Some(slot.id.as_str()) {
                egui::Color32::from_rgb(212, 175, 55)
            } else {
                egui::Color32::from_rgb(90, 80, 130)
            };
            painter.circle_filled(center, BUILDER_SLOT_RADIUS, fill);
            painter.text(
                center,
                egui::Align2::CENTER_CENTER,
                index + 1,
                egui::FontId::proportional(12.0),
                egui::Color32::WHITE,
            );
        }

        if !response.clicked() {
            return;
        }
        let Some(pos) = response.interact_pointer_pos() else {
            return;
        };
        let hit = slots
            .iter()
            .find(|slot| position(slot).distance(pos) <= BUILDER_SLOT_RADIUS)
            .map(|slot| slot.id.clone());
        match (hit, self.builder.draft.selected().map(str::to_string)) {
            (Some(id), _) => self.builder_click_slot(&id),
            (None, Some(selected)) => {
                let _ = self.builder.draft.place_slot(&selected, pos, area);
            }
            (None, None) => {}
        }
    }

    fn builder_click_slot(&mut self, id: &str) {
        self.builder.error = self
            .builder
            .draft
            .click_slot(id)
            .err()
            .map(|err| err.to_string());
    }

    /// Draws the status bar with the latest notice and the layout in use.
    pub fn draw_status_bar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            let template = self.session.active_template();
            if template.id != FREE_TEMPLATE_ID {
                ui.label(format!("Layout: {}", template.name));
            } else {
                ui.label("Free placement");
            }
            ui.label(format!("{} cards", self.session.placements().len()));
            if let Some(notice) = &self.status {
                ui.separator();
                match notice.level {
                    NoticeLevel::Info => ui.label(notice.text.as_str()),
                    NoticeLevel::Warning => ui.colored_label(ui.visuals().warn_fg_color, notice.text.as_str()),
                };
            }
        });
    }
}
