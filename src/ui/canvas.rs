//! Canvas interaction and navigation functionality.
//!
//! This module handles canvas panning, zooming, card dragging and the card menu,
//! and the coordinate transformations between screen and canvas space.

use super::rendering::card_contains;
use super::state::TarotApp;
use crate::drag::{DragSession, DropContext, DropOutcome};
use crate::types::InstanceId;
use eframe::egui;

/// Pointer travel below which a grabbed card counts as clicked.
const CLICK_DISTANCE: f32 = 3.0;

impl TarotApp {
    /// Converts screen coordinates to canvas coordinates using the live pan.
    ///
    /// # Arguments
    ///
    /// * `screen_pos` - Position in screen space (pixels)
    ///
    /// # Returns
    ///
    /// The corresponding position in unscaled canvas space
    pub fn screen_to_canvas(&self, screen_pos: egui::Pos2) -> egui::Pos2 {
        self.canvas
            .viewport
            .live_transform()
            .screen_to_canvas(screen_pos, self.canvas.rect.min)
    }

    /// Converts canvas coordinates to screen coordinates using the live pan.
    pub fn canvas_to_screen(&self, canvas_pos: egui::Pos2) -> egui::Pos2 {
        self.canvas
            .viewport
            .live_transform()
            .canvas_to_screen(canvas_pos, self.canvas.rect.min)
    }

    /// Finds the topmost card whose footprint contains a canvas position.
    ///
    /// Cards are searched back to front so the one drawn last wins. Rotated cards are
    /// hit where they are drawn.
    pub fn find_card_at_position(&self, canvas_pos: egui::Pos2) -> Option<InstanceId> {
        self.session
            .placements()
            .cards()
            .iter()
            .rev()
            .find(|card| card_contains(card, canvas_pos))
            .map(|card| card.instance_id)
    }

    /// Draws the canvas and handles all of its interactions for this frame.
    ///
    /// # Arguments
    ///
    /// * `ui` - The egui UI to allocate the canvas in
    pub fn draw_canvas(&mut self, ui: &mut egui::Ui) {
        let (response, painter) =
            ui.allocate_painter(ui.available_size(), egui::Sense::click_and_drag());
        self.canvas.rect = response.rect;

        // Space turns the primary button into a pan button
        self.handle_space_key(ui.ctx());

        self.handle_canvas_panning(ui, &response);
        self.handle_canvas_zoom(ui, &response);
        self.handle_card_dragging(ui, &response);
        self.handle_card_clicks(ui, &response);

        self.render_reading(&painter, response.rect);

        if self.interaction.card_menu.card.is_some() {
            self.draw_card_menu(ui);
        }
    }

    fn handle_space_key(&mut self, ctx: &egui::Context) {
        let held = !ctx.wants_keyboard_input() && ctx.input(|i| i.key_down(egui::Key::Space));
        if held != self.canvas.viewport.space_held() {
            self.canvas.viewport.set_space_held(held);
        }
    }

    /// Handles middle-click or space+left-click canvas panning.
    ///
    /// The pan is only committed when the gesture ends; until then drawing uses the
    /// live offset.
    ///
    /// # Arguments
    ///
    /// * `ui` - The egui UI context
    /// * `response` - The response from the canvas widget
    pub fn handle_canvas_panning(&mut self, ui: &mut egui::Ui, response: &egui::Response) {
        let (pressed, released, press_pos, latest_pos) = ui.input(|i| {
            let pressed = [egui::PointerButton::Primary, egui::PointerButton::Middle]
                .into_iter()
                .find(|button| i.pointer.button_pressed(*button));
            (
                pressed,
                i.pointer.any_released(),
                i.pointer.press_origin(),
                i.pointer.latest_pos(),
            )
        });

        if let (Some(button), Some(pos)) = (pressed, press_pos) {
            if response.rect.contains(pos) && self.interaction.drag.is_none() {
                let on_card = self.find_card_at_position(self.screen_to_canvas(pos)).is_some();
                if self.canvas.viewport.pointer_down(button, pos, on_card) {
                    log::debug!("Pan started at {pos:?}");
                }
            }
        }

        if self.canvas.viewport.is_panning() {
            if let Some(pos) = latest_pos {
                self.canvas.viewport.pointer_move(pos);
            }
            if released {
                self.canvas.viewport.pointer_up();
            }
            ui.ctx().request_repaint();
        }
    }

    /// Handles scroll wheel zooming.
    ///
    /// Each wheel event moves the zoom one step within the allowed range. Only zooms
    /// if the cursor is over the canvas.
    ///
    /// # Arguments
    ///
    /// * `ui` - The egui UI context
    /// * `response` - The response from the canvas widget
    pub fn handle_canvas_zoom(&mut self, ui: &mut egui::Ui, response: &egui::Response) {
        let (scroll_delta, hover_pos) = ui.input(|i| (i.raw_scroll_delta.y, i.pointer.hover_pos()));
        if scroll_delta == 0.0 {
            return;
        }
        let Some(mouse_pos) = hover_pos else {
            return;
        };
        if response.rect.contains(mouse_pos) {
            self.canvas.viewport.apply_wheel(scroll_delta);
        }
    }

    /// Starts dragging a card that is pressed with the primary button and tracks the
    /// pointer of any drag in progress.
    ///
    /// # Arguments
    ///
    /// * `ui` - The egui UI context
    /// * `response` - The response from the canvas widget
    pub fn handle_card_dragging(&mut self, ui: &mut egui::Ui, response: &egui::Response) {
        let (primary_pressed, press_pos, latest_pos) = ui.input(|i| {
            (
                i.pointer.button_pressed(egui::PointerButton::Primary),
                i.pointer.press_origin(),
                i.pointer.latest_pos(),
            )
        });

        self.interaction.hovered_card = latest_pos
            .filter(|pos| response.rect.contains(*pos))
            .and_then(|pos| self.find_card_at_position(self.screen_to_canvas(pos)));
        if self.interaction.hovered_card.is_some() && !self.canvas.viewport.space_held() {
            ui.ctx().set_cursor_icon(egui::CursorIcon::Grab);
        }

        if primary_pressed
            && self.interaction.drag.is_none()
            && !self.canvas.viewport.is_panning()
            && !self.canvas.viewport.space_held()
        {
            if let Some(pos) = press_pos.filter(|pos| response.rect.contains(*pos)) {
                let grab = self.screen_to_canvas(pos);
                let picked = self
                    .find_card_at_position(grab)
                    .and_then(|id| self.session.placements().get(id));
                if let Some(card) = picked {
                    self.interaction.selected_card = Some(card.instance_id);
                    self.interaction.drag = Some(DragSession::from_placement(card, grab));
                    self.interaction.drag_start = Some(pos);
                }
            }
        }

        if let (Some(drag), Some(pos)) = (self.interaction.drag.as_mut(), latest_pos) {
            drag.hover(pos);
        }
    }

    /// Resolves a drag when the pointer is released, wherever that happens.
    ///
    /// Palette drags start outside the canvas, so this runs once per frame after all
    /// panels are drawn. Escape abandons the drag.
    pub fn handle_drag_release(&mut self, ctx: &egui::Context) {
        if self.interaction.drag.is_none() {
            return;
        }
        let (released, escape, latest_pos) = ctx.input(|i| {
            (
                i.pointer.any_released(),
                i.key_pressed(egui::Key::Escape),
                i.pointer.latest_pos(),
            )
        });
        if let (Some(drag), Some(pos)) = (self.interaction.drag.as_mut(), latest_pos) {
            drag.hover(pos);
        }
        ctx.request_repaint();

        if escape {
            if let Some(drag) = self.interaction.drag.take() {
                drag.cancel();
            }
            return;
        }
        if !released {
            return;
        }
        let Some(drag) = self.interaction.drag.take() else {
            return;
        };
        let drag_start = self.interaction.drag_start.take();
        let Some(pointer) = drag.hover_position().or(latest_pos) else {
            drag.cancel();
            return;
        };
        // A press and release in place is a click, not a move
        if drag_start.is_some_and(|start| start.distance(pointer) < CLICK_DISTANCE) {
            drag.cancel();
            return;
        }

        let template = self.session.active_template().clone();
        let context = DropContext {
            container: self.canvas.rect,
            transform: self.canvas.viewport.transform(),
            template: &template,
            canvas_size: self.canvas.size(),
        };
        match drag.drop_at(pointer, &context, self.session.placements_mut()) {
            DropOutcome::Placed(id) | DropOutcome::Moved(id) => {
                self.interaction.selected_card = Some(id);
            }
            DropOutcome::Rejected => {
                log::debug!("Drop rejected: no slot of \"{}\" in range", template.name);
            }
            DropOutcome::Cancelled => {}
        }
    }

    /// Handles clicks on cards: double-click flips, right-click opens the card menu,
    /// and the keyboard acts on the selected card.
    fn handle_card_clicks(&mut self, ui: &mut egui::Ui, response: &egui::Response) {
        let clicked_card = response
            .interact_pointer_pos()
            .and_then(|pos| self.find_card_at_position(self.screen_to_canvas(pos)));

        if response.double_clicked() {
            if let Some(id) = clicked_card {
                self.session.placements_mut().flip(id);
            }
        } else if response.clicked() {
            self.interaction.selected_card = clicked_card;
        }

        if response.secondary_clicked() && !self.canvas.viewport.is_panning() {
            if let (Some(id), Some(pos)) = (clicked_card, response.interact_pointer_pos()) {
                self.interaction.selected_card = Some(id);
                self.interaction.card_menu.card = Some(id);
                self.interaction.card_menu.screen_pos = pos;
                self.interaction.card_menu.just_opened = true;
            }
        }

        if ui.ctx().wants_keyboard_input() {
            return;
        }
        let Some(id) = self.interaction.selected_card else {
            return;
        };
        let (rotate, flip, remove) = ui.input(|i| {
            (
                i.key_pressed(egui::Key::R),
                i.key_pressed(egui::Key::F),
                i.key_pressed(egui::Key::Delete) || i.key_pressed(egui::Key::Backspace),
            )
        });
        let placements = self.session.placements_mut();
        if rotate {
            placements.rotate(id);
        }
        if flip {
            placements.flip(id);
        }
        if remove && placements.remove(id) {
            self.interaction.selected_card = None;
        }
    }

    /// Renders the right-click menu of a card.
    ///
    /// # Arguments
    ///
    /// * `ui` - The egui UI context
    fn draw_card_menu(&mut self, ui: &mut egui::Ui) {
        let Some(id) = self.interaction.card_menu.card else {
            return;
        };
        let area_response = egui::Area::new(egui::Id::new("card_menu"))
            .fixed_pos(self.interaction.card_menu.screen_pos)
            .show(ui.ctx(), |ui| {
                egui::Frame::popup(ui.style()).show(ui, |ui| {
                    ui.vertical(|ui| {
                        if let Some(card) = self.session.placements().get(id) {
                            ui.label(card.name.as_str());
                            ui.separator();
                        }
                        let mut close = false;
                        if ui.button("Flip").clicked() {
                            self.session.placements_mut().flip(id);
                            close = true;
                        }
                        if ui.button("Rotate 45°").clicked() {
                            self.session.placements_mut().rotate(id);
                            close = true;
                        }
                        if ui.button("Remove").clicked() {
                            self.session.placements_mut().remove(id);
                            self.interaction.selected_card = None;
                            close = true;
                        }
                        if close {
                            self.interaction.card_menu.card = None;
                        }
                    });
                })
            });

        // Handle click-outside-to-close after the first frame
        if !self.interaction.card_menu.just_opened && ui.input(|i| i.pointer.any_click()) {
            if let Some(click_pos) = ui.input(|i| i.pointer.interact_pos()) {
                if !area_response.response.rect.contains(click_pos) {
                    self.interaction.card_menu.card = None;
                }
            }
        }
        self.interaction.card_menu.just_opened = false;
    }
}
