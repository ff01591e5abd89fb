//! Reading reports.
//!
//! The layout of a report (which sections, which slot each card sits on, what part of
//! the table to picture) is computed here as a [`ReportOutline`]. Turning an outline into
//! a document is the job of an [`Exporter`]; [`TextExporter`] writes a plain-text version.

use crate::constants::{REPORT_SLOT_RADIUS, SNAPSHOT_PADDING};
use crate::types::{PdfFont, PdfSettings, PdfTheme, PlacedCard, SpreadTemplate};
use chrono::{DateTime, Utc};
use eframe::egui::{Color32, Rect, Vec2};
use std::fmt::Write as _;
use thiserror::Error;

const DEFAULT_ACCENT: Color32 = Color32::from_rgb(0xD4, 0xAF, 0x37);

/// Export failures.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Nothing to export
    #[error("the table is empty")]
    EmptyTable,
    /// The document could not be produced
    #[error("failed to render report: {0}")]
    Render(String),
}

/// Input of an export.
#[derive(Debug, Clone)]
pub struct ExportRequest {
    /// Cards in z-order
    pub placements: Vec<PlacedCard>,
    /// Active layout
    pub template: SpreadTemplate,
    /// Report settings
    pub settings: PdfSettings,
    /// Selected client
    pub client_name: Option<String>,
    /// Interpretation text
    pub interpretation: Option<String>,
    /// Unscaled canvas size, for resolving percentage slots
    pub canvas_size: Vec2,
    /// Export time
    pub date: DateTime<Utc>,
}

/// One card block of the detailed analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotEntry {
    /// Slot label, or "Card N"
    pub label: String,
    /// Card name
    pub card_name: String,
    /// Whether the card is reversed
    pub reversed: bool,
    /// Card meaning
    pub description: String,
    /// Card image
    pub image: String,
}

/// A report section, in document order.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportSection {
    /// Title block
    Header {
        /// Title
        title: String,
        /// Line under the title
        subtitle: Option<String>,
        /// Logo image
        logo: Option<String>,
    },
    /// Client line
    Client(String),
    /// Date line
    Date(String),
    /// Picture of the table, cropped to this canvas rectangle
    Snapshot(Rect),
    /// Detailed analysis
    Slots(Vec<SlotEntry>),
    /// Interpretation with Markdown markers removed
    Interpretation(String),
}

/// Everything an exporter needs to lay out a report.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportOutline {
    /// Sections in order
    pub sections: Vec<ReportSection>,
    /// Text at the bottom of every page
    pub footer: String,
    /// Page theme
    pub theme: PdfTheme,
    /// Font family
    pub font: PdfFont,
    /// Title and rule color
    pub accent: Color32,
    /// Suggested file name
    pub file_name: String,
}

/// Turns an outline into a document.
pub trait Exporter {
    /// File extension of the produced document.
    fn extension(&self) -> &'static str;

    /// Renders the report.
    fn export(&self, outline: &ReportOutline) -> Result<Vec<u8>, ExportError>;
}

/// Bounding box of the cards, padded on every side.
pub fn snapshot_crop(cards: &[PlacedCard]) -> Option<Rect> {
    let bounds = cards
        .iter()
        .map(PlacedCard::footprint)
        .reduce(|a, b| a.union(b))?;
    let padded = bounds.expand(SNAPSHOT_PADDING);
    Some(Rect::from_min_max(padded.min.max(eframe::egui::Pos2::ZERO), padded.max))
}

/// Label of the slot a card sits on, or "Card N" (1-based) when it is on none.
pub fn slot_label(card: &PlacedCard, index: usize, template: &SpreadTemplate, canvas_size: Vec2) -> String {
    let center = card.center();
    template
        .slots
        .iter()
        .find(|slot| slot.center(canvas_size).distance(center) < REPORT_SLOT_RADIUS)
        .map(|slot| slot.label.clone())
        .unwrap_or_else(|| format!("Card {}", index + 1))
}

/// Removes Markdown heading and emphasis markers.
pub fn strip_markdown(text: &str) -> String {
    text.chars().filter(|c| !matches!(c, '#' | '*')).collect()
}

fn file_name(client_name: Option<&str>) -> String {
    match client_name {
        Some(name) => format!("tarot-{}", name.split_whitespace().collect::<Vec<_>>().join("-")),
        None => "tarot-reading".to_string(),
    }
}

impl ReportOutline {
    /// Lays out the report for a request.
    pub fn build(request: &ExportRequest) -> Result<Self, ExportError> {
        if request.placements.is_empty() {
            return Err(ExportError::EmptyTable);
        }
        let settings = &request.settings;
        let mut sections = vec![ReportSection::Header {
            title: settings.header_text.clone(),
            subtitle: settings.sub_header_text.clone().filter(|s| !s.is_empty()),
            logo: settings.logo_image.clone(),
        }];

        if settings.show_client_name {
            if let Some(name) = &request.client_name {
                sections.push(ReportSection::Client(name.clone()));
            }
        }
        if settings.show_date {
            sections.push(ReportSection::Date(request.date.format("%Y-%m-%d").to_string()));
        }
        if settings.show_canvas_snapshot {
            if let Some(crop) = snapshot_crop(&request.placements) {
                sections.push(ReportSection::Snapshot(crop));
            }
        }
        if settings.show_individual_slots {
            let entries = request
                .placements
                .iter()
                .enumerate()
                .map(|(i, card)| SlotEntry {
                    label: slot_label(card, i, &request.template, request.canvas_size),
                    card_name: card.name.clone(),
                    reversed: card.is_reversed,
                    description: card.description.clone(),
                    image: card.image.clone(),
                })
                .collect();
            sections.push(ReportSection::Slots(entries));
        }
        if settings.show_interpretation {
            if let Some(text) = request.interpretation.as_deref().filter(|t| !t.trim().is_empty()) {
                sections.push(ReportSection::Interpretation(strip_markdown(text)));
            }
        }

        Ok(Self {
            sections,
            footer: settings.footer_text.clone(),
            theme: settings.theme,
            font: settings.font,
            accent: Color32::from_hex(&settings.accent_color).unwrap_or(DEFAULT_ACCENT),
            file_name: file_name(request.client_name.as_deref()),
        })
    }
}

/// Writes a report as plain text.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextExporter;

impl Exporter for TextExporter {
    fn extension(&self) -> &'static str {
        "txt"
    }

    fn export(&self, outline: &ReportOutline) -> Result<Vec<u8>, ExportError> {
        let mut out = String::new();
        for section in &outline.sections {
            let written = match section {
                ReportSection::Header { title, subtitle, .. } => {
                    let mut block = format!("{title}\n");
                    if let Some(subtitle) = subtitle {
                        block.push_str(subtitle);
                        block.push('\n');
                    }
                    writeln!(out, "{block}{}", "=".repeat(title.chars().count().max(8)))
                }
                ReportSection::Client(name) => writeln!(out, "Client: {name}"),
                ReportSection::Date(date) => writeln!(out, "Date: {date}"),
                ReportSection::Snapshot(crop) => writeln!(
                    out,
                    "\n[Table area {:.0}x{:.0} at ({:.0}, {:.0})]",
                    crop.width(),
                    crop.height(),
                    crop.min.x,
                    crop.min.y
                ),
                ReportSection::Slots(entries) => {
                    let mut block = String::from("\nDetailed Analysis\n-----------------\n");
                    for entry in entries {
                        let reversed = if entry.reversed { " (Reversed)" } else { "" };
                        block.push_str(&format!(
                            "{}\n  {}{}\n  {}\n",
                            entry.label, entry.card_name, reversed, entry.description
                        ));
                    }
                    write!(out, "{block}")
                }
                ReportSection::Interpretation(text) => {
                    write!(out, "\nFull Interpretation\n-------------------\n{text}\n")
                }
            };
            written.map_err(|e| ExportError::Render(e.to_string()))?;
        }
        if !outline.footer.is_empty() {
            writeln!(out, "\n{}", outline.footer).map_err(|e| ExportError::Render(e.to_string()))?;
        }
        Ok(out.into_bytes())
    }
}
