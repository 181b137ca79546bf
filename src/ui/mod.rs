//! UI rendering module for markwatch
//!
//! This module contains all the rendering logic for the terminal user interface,
//! using the ratatui library for TUI components.

pub mod add_marker;
pub mod help_overlay;
pub mod marker_detail;
pub mod marker_list;
pub mod toast;

pub use add_marker::render as render_add_marker;
pub use help_overlay::render as render_help_overlay;
pub use marker_detail::{format_age, render as render_marker_detail};
pub use marker_list::render_marker_list;
pub use toast::render as render_toast;

use ratatui::{
    layout::{Alignment, Rect},
    style::{Color, Style},
    widgets::{Block, Paragraph, Wrap},
    Frame,
};

use crate::app::{App, AppState};
use crate::data::MarkerStatus;

/// Renders the active view, then the help overlay and toast on top
pub fn render(frame: &mut Frame, app: &App) {
    match &app.state {
        AppState::MarkerList => render_marker_list(frame, app),
        AppState::MarkerDetail(marker_id) => render_marker_detail(frame, app, marker_id),
        AppState::AddMarker => render_add_marker(frame, app),
    }
    if app.show_help {
        render_help_overlay(frame);
    }
    render_toast(frame, app);
}

/// Color for a marker status
pub(crate) fn status_color(status: &MarkerStatus) -> Color {
    match status {
        MarkerStatus::Created => Color::Blue,
        MarkerStatus::Active => Color::Green,
        MarkerStatus::Changed => Color::Yellow,
        MarkerStatus::Unknown | MarkerStatus::Other(_) => Color::Gray,
    }
}

/// Renders a centered one-line message inside `block`
pub(crate) fn placeholder(
    frame: &mut Frame,
    block: Block,
    message: &str,
    is_error: bool,
    area: Rect,
) {
    let color = if is_error { Color::Red } else { Color::DarkGray };
    let paragraph = Paragraph::new(message.to_string())
        .block(block)
        .style(Style::default().fg(color))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, area);
}
