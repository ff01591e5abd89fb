//! Canvas rendering functionality for slots, connections and cards.
//!
//! Everything is drawn with the live transform so a pan in progress moves the
//! whole table at once.

use super::state::TarotApp;
use crate::constants::{CARD_CORNER_RADIUS, CARD_HEIGHT, CARD_WIDTH};
use crate::drag::DragSource;
use crate::geometry::{resolve_slot, CanvasTransform};
use crate::types::{card_size, InstanceId, PlacedCard, SpreadTemplate};
use eframe::egui;
use eframe::epaint::StrokeKind;

const TABLE_COLOR: egui::Color32 = egui::Color32::from_rgb(24, 20, 36);
const CARD_FILL: egui::Color32 = egui::Color32::from_rgb(46, 36, 72);
const CARD_BORDER: egui::Color32 = egui::Color32::from_rgb(212, 175, 55);
const SLOT_COLOR: egui::Color32 = egui::Color32::from_rgba_premultiplied(150, 140, 190, 160);
const SLOT_TARGET_COLOR: egui::Color32 = egui::Color32::from_rgb(212, 175, 55);
const CONNECTION_COLOR: egui::Color32 = egui::Color32::from_rgba_premultiplied(120, 110, 160, 120);
const SELECTION_COLOR: egui::Color32 = egui::Color32::from_rgb(100, 150, 255);
const HOVER_COLOR: egui::Color32 = egui::Color32::from_rgb(240, 215, 140);

/// Outline emphasis of a drawn card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardHighlight {
    /// Plain border
    None,
    /// Under the pointer
    Hovered,
    /// The selected card
    Selected,
}

/// Corners of a card footprint turned by `degrees` around its center, clockwise on screen.
pub fn rotated_corners(rect: egui::Rect, degrees: f32) -> [egui::Pos2; 4] {
    let center = rect.center();
    let rot = egui::emath::Rot2::from_angle(degrees.to_radians());
    [
        rect.left_top(),
        rect.right_top(),
        rect.right_bottom(),
        rect.left_bottom(),
    ]
    .map(|corner| center + rot * (corner - center))
}

/// Whether a canvas point falls on a card, honouring the card's rotation.
///
/// Reversal is a half turn and leaves the footprint unchanged.
pub fn card_contains(card: &PlacedCard, canvas_pos: egui::Pos2) -> bool {
    let footprint = card.footprint();
    if card.rotation % 360 == 0 {
        return footprint.contains(canvas_pos);
    }
    let center = footprint.center();
    let unrotate = egui::emath::Rot2::from_angle(-f32::from(card.rotation).to_radians());
    footprint.contains(center + unrotate * (canvas_pos - center))
}

/// Angle a card is drawn at: its rotation plus a half turn when reversed.
pub fn display_angle(card: &PlacedCard) -> f32 {
    let flip = if card.is_reversed { 180.0 } else { 0.0 };
    f32::from(card.rotation) + flip
}

impl TarotApp {
    /// Renders the table: slots and their connections first, then the cards in
    /// z-order, then the card being dragged.
    ///
    /// # Arguments
    ///
    /// * `painter` - The egui painter for drawing operations
    /// * `canvas_rect` - The screen-space rectangle of the canvas area
    pub fn render_reading(&self, painter: &egui::Painter, canvas_rect: egui::Rect) {
        painter.rect_filled(canvas_rect, 0.0, TABLE_COLOR);

        let transform = self.canvas.viewport.live_transform();
        let template = self.session.active_template();
        let target_slot = self.drag_target_slot(template);

        if self.canvas.show_slots && !template.is_free() {
            self.draw_connections(painter, template, &transform);
            self.draw_slots(painter, template, &transform, target_slot.as_deref());
        }

        let dragged = match self.interaction.drag.as_ref().map(|d| d.source()) {
            Some(DragSource::Placement(id)) => Some(*id),
            _ => None,
        };
        let cards = self.session.placements().cards();
        for rendered in self.canvas.viewport.cull(cards, canvas_rect.size()) {
            let card = rendered.card;
            let screen_rect = transform.rect_to_screen(card.footprint(), canvas_rect.min);
            let highlight = self.highlight_for(card.instance_id);
            let alpha = if dragged == Some(card.instance_id) { 0.35 } else { 1.0 };
            self.draw_card(painter, card, screen_rect, highlight, alpha);
        }

        self.draw_drag_preview(painter, &transform, canvas_rect);
    }

    /// Selection wins over hover; nothing is hovered while a drag is in progress.
    pub fn highlight_for(&self, id: InstanceId) -> CardHighlight {
        if self.interaction.selected_card == Some(id) {
            CardHighlight::Selected
        } else if self.interaction.drag.is_none() && self.interaction.hovered_card == Some(id) {
            CardHighlight::Hovered
        } else {
            CardHighlight::None
        }
    }

    /// Slot the dragged card would snap to if dropped now.
    fn drag_target_slot(&self, template: &SpreadTemplate) -> Option<String> {
        let drag = self.interaction.drag.as_ref()?;
        let pointer = drag.hover_position()?;
        if !self.canvas.rect.contains(pointer) {
            return None;
        }
        let raw = drag.raw_top_left(pointer, &self.canvas.viewport.transform(), self.canvas.rect.min);
        resolve_slot(raw, template, self.canvas.size())
            .slot_id()
            .map(str::to_string)
    }

    /// Draws each slot as a dashed card outline with its label above.
    fn draw_slots(
        &self,
        painter: &egui::Painter,
        template: &SpreadTemplate,
        transform: &CanvasTransform,
        target: Option<&str>,
    ) {
        let origin = self.canvas.rect.min;
        let zoom = transform.zoom;
        for slot in &template.slots {
            let center = slot.center(self.canvas.size());
            let footprint = egui::Rect::from_center_size(center, card_size());
            let rect = transform.rect_to_screen(footprint, origin);
            let color = if target == Some(slot.id.as_str()) {
                SLOT_TARGET_COLOR
            } else {
                SLOT_COLOR
            };

            let outline = [
                rect.left_top(),
                rect.right_top(),
                rect.right_bottom(),
                rect.left_bottom(),
                rect.left_top(),
            ];
            painter.extend(egui::Shape::dashed_line(
                &outline,
                egui::Stroke::new(1.5, color),
                8.0 * zoom,
                6.0 * zoom,
            ));
            painter.text(
                rect.center_top() - egui::vec2(0.0, 6.0 * zoom),
                egui::Align2::CENTER_BOTTOM,
                &slot.label,
                egui::FontId::proportional((13.0 * zoom).max(8.0)),
                color,
            );
        }
    }

    /// Draws the advisory lines between connected slot centers.
    fn draw_connections(&self, painter: &egui::Painter, template: &SpreadTemplate, transform: &CanvasTransform) {
        let origin = self.canvas.rect.min;
        let size = self.canvas.size();
        for (from, to) in template.resolved_connections() {
            let a = transform.canvas_to_screen(from.center(size), origin);
            let b = transform.canvas_to_screen(to.center(size), origin);
            painter.line_segment([a, b], egui::Stroke::new(2.0, CONNECTION_COLOR));
        }
    }

    /// Draws one card at its screen rectangle, turned by its rotation and reversal.
    ///
    /// # Arguments
    ///
    /// * `painter` - The egui painter for drawing operations
    /// * `card` - The card to draw
    /// * `screen_rect` - Unrotated footprint in screen space
    /// * `highlight` - Outline emphasis
    /// * `alpha` - Opacity in `[0, 1]`
    pub fn draw_card(
        &self,
        painter: &egui::Painter,
        card: &PlacedCard,
        screen_rect: egui::Rect,
        highlight: CardHighlight,
        alpha: f32,
    ) {
        let angle = display_angle(card);
        let (width, border) = match highlight {
            CardHighlight::None => (1.5, CARD_BORDER),
            CardHighlight::Hovered => (2.5, HOVER_COLOR),
            CardHighlight::Selected => (3.0, SELECTION_COLOR),
        };
        let stroke = egui::Stroke::new(width, border.gamma_multiply(alpha));

        if angle % 360.0 == 0.0 {
            let radius = CARD_CORNER_RADIUS * (screen_rect.width() / CARD_WIDTH);
            painter.rect_filled(screen_rect, radius, CARD_FILL.gamma_multiply(alpha));
            painter.rect_stroke(screen_rect, radius, stroke, StrokeKind::Inside);
        } else {
            painter.add(egui::Shape::convex_polygon(
                rotated_corners(screen_rect, angle).to_vec(),
                CARD_FILL.gamma_multiply(alpha),
                stroke,
            ));
        }

        let scale = screen_rect.height() / CARD_HEIGHT;
        let text_color = egui::Color32::WHITE.gamma_multiply(alpha);
        painter.text(
            screen_rect.center(),
            egui::Align2::CENTER_CENTER,
            &card.name,
            egui::FontId::proportional((14.0 * scale).max(7.0)),
            text_color,
        );

        let mut badges = Vec::new();
        if card.is_reversed {
            badges.push("Reversed".to_string());
        }
        if card.rotation != 0 {
            badges.push(format!("{}°", card.rotation));
        }
        if !badges.is_empty() {
            painter.text(
                screen_rect.center_bottom() + egui::vec2(0.0, 4.0 * scale),
                egui::Align2::CENTER_TOP,
                badges.join(" · "),
                egui::FontId::proportional((11.0 * scale).max(7.0)),
                CARD_BORDER.gamma_multiply(alpha),
            );
        }
    }

    /// Draws the card under the pointer while a drag is in progress.
    fn draw_drag_preview(&self, painter: &egui::Painter, transform: &CanvasTransform, canvas_rect: egui::Rect) {
        let Some(drag) = self.interaction.drag.as_ref() else {
            return;
        };
        let Some(pointer) = drag.hover_position() else {
            return;
        };
        if !canvas_rect.contains(pointer) {
            return;
        }

        let top_left = drag.raw_top_left(pointer, transform, canvas_rect.min);
        let footprint = egui::Rect::from_min_size(top_left, card_size());
        let screen_rect = transform.rect_to_screen(footprint, canvas_rect.min);
        match drag.source() {
            DragSource::Placement(id) => {
                if let Some(card) = self.session.placements().get(*id) {
                    self.draw_card(painter, card, screen_rect, CardHighlight::Selected, 0.8);
                }
            }
            DragSource::Palette(card) => {
                let preview = PlacedCard::from_card(card, top_left);
                self.draw_card(painter, &preview, screen_rect, CardHighlight::None, 0.8);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Card;

    #[test]
    fn test_rotated_corners_quarter_turn() {
        let rect = egui::Rect::from_min_size(egui::pos2(0.0, 0.0), egui::vec2(120.0, 200.0));
        let corners = rotated_corners(rect, 90.0);
        // Top-left swings to the top-right of a landscape footprint
        assert!((corners[0].x - 160.0).abs() < 1e-3);
        assert!((corners[0].y - 40.0).abs() < 1e-3);
    }

    #[test]
    fn test_card_contains_follows_rotation() {
        let mut card = PlacedCard::from_card(&Card::new("0", "The Fool", ""), egui::Pos2::ZERO);
        let beside = egui::pos2(150.0, 100.0);
        let above_center = egui::pos2(60.0, 20.0);
        assert!(!card_contains(&card, beside));
        assert!(card_contains(&card, above_center));

        card.rotation = 90;
        assert!(card_contains(&card, beside));
        assert!(!card_contains(&card, above_center));

        card.rotation = 45;
        assert!(card_contains(&card, card.center()));
        assert!(!card_contains(&card, egui::pos2(2.0, 2.0)));
    }

    #[test]
    fn test_display_angle_adds_half_turn_when_reversed() {
        let mut card = PlacedCard::from_card(&Card::new("1", "The Magician", ""), egui::Pos2::ZERO);
        card.rotation = 45;
        assert_eq!(display_angle(&card), 45.0);
        card.is_reversed = true;
        assert_eq!(display_angle(&card), 225.0);
    }
}
