use crate::domain::model::{Indicator, MapView, Position, Slot, StationMarker};
use crate::domain::ports::MarkerRenderer;
use std::io::Write;

/// Renders the map widget as plain text lines.
///
/// Each change is written as one line so the output of a script run reads as
/// a log of what the map would show.
pub struct TerminalRenderer<W: Write + Send> {
    out: W,
}

impl TerminalRenderer<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> TerminalRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, text: String) {
        if let Err(e) = writeln!(self.out, "{}", text) {
            tracing::warn!("Failed to write to terminal: {}", e);
        }
    }
}

impl<W: Write + Send> MarkerRenderer for TerminalRenderer<W> {
    fn set_view(&mut self, view: &MapView) {
        self.line(format!("map centred on {} at zoom {}", view.center, view.zoom));
    }

    fn render_marker(&mut self, marker: &StationMarker) {
        self.line(format!(
            "[{}] + \"{}\" at {}",
            marker.slot.css_class(),
            marker.label,
            marker.position.readout()
        ));
    }

    fn remove_marker(&mut self, slot: Slot) {
        self.line(format!("[{}] x removed", slot.css_class()));
    }

    fn update_position(&mut self, slot: Slot, position: Position) {
        self.line(format!("[{}] > {}", slot.css_class(), position.readout()));
    }

    fn set_draggable(&mut self, slot: Slot, enabled: bool) {
        let state = if enabled { "draggable" } else { "pinned" };
        self.line(format!("[{}] {}", slot.css_class(), state));
    }

    fn show_indicator(&mut self, indicator: Indicator) {
        match indicator {
            Indicator::Neutral => self.line("indicator: -".to_string()),
            _ => self.line(format!(
                "indicator: {} ({})",
                indicator.text(),
                indicator.css_class()
            )),
        }
    }

    fn show_error(&mut self, message: &str) {
        self.line(format!("error: {}", message));
    }
}
