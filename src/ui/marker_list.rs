//! Marker list screen rendering
//!
//! Renders every tracked marker as `{id} • {status}` with its name, plus
//! placeholders while the first load is pending or after it failed.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use super::{placeholder, status_color};
use crate::app::App;

/// Renders the marker list view
pub fn render_marker_list(frame: &mut Frame, app: &App) {
    let area = frame.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),    // Marker list
            Constraint::Length(1), // Help text
        ])
        .split(area);

    render_list(frame, app, chunks[0]);
    render_help(frame, chunks[1]);
}

fn render_list(frame: &mut Frame, app: &App, area: Rect) {
    let entry = app.markers_entry();

    let mut title = String::from(" Markers ");
    if entry.is_loading() && entry.value.is_some() {
        title.push_str("(refreshing…) ");
    }
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let Some(markers) = entry.markers() else {
        let message = match &entry.error {
            Some(err) => format!("Could not load markers: {}", err),
            None => "Loading markers...".to_string(),
        };
        placeholder(frame, block, &message, entry.is_error(), area);
        return;
    };

    if markers.is_empty() {
        placeholder(
            frame,
            block,
            "No markers yet. Press a to track a location.",
            false,
            area,
        );
        return;
    }

    let lines: Vec<Line> = markers
        .iter()
        .enumerate()
        .map(|(index, marker)| {
            let is_selected = index == app.selected_index;
            let cursor = if is_selected { "\u{25B8} " } else { "  " }; // ▸ or space
            let id_style = if is_selected {
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::White)
            };

            let mut spans = vec![
                Span::styled(cursor, Style::default().fg(Color::Cyan)),
                Span::styled(marker.marker_id.clone(), id_style),
                Span::raw(" • "),
                Span::styled(
                    marker.status.to_string(),
                    Style::default().fg(status_color(&marker.status)),
                ),
            ];
            if let Some(name) = marker.name.as_deref().filter(|n| !n.trim().is_empty()) {
                spans.push(Span::raw("   "));
                spans.push(Span::styled(
                    name.to_string(),
                    Style::default().fg(Color::DarkGray),
                ));
            }
            Line::from(spans)
        })
        .collect();

    // Keep the selection on screen in long lists
    let visible = area.height.saturating_sub(2) as usize;
    let offset = app.selected_index.saturating_sub(visible.saturating_sub(1));
    let paragraph = Paragraph::new(lines).block(block).scroll((offset as u16, 0));

    frame.render_widget(paragraph, area);
}

fn render_help(frame: &mut Frame, area: Rect) {
    let help_text = Line::from(vec![
        Span::styled("↑/↓", Style::default().fg(Color::Yellow)),
        Span::raw(" Navigate  "),
        Span::styled("Enter", Style::default().fg(Color::Yellow)),
        Span::raw(" Open  "),
        Span::styled("a", Style::default().fg(Color::Yellow)),
        Span::raw(" Add  "),
        Span::styled("d", Style::default().fg(Color::Yellow)),
        Span::raw(" Delete  "),
        Span::styled("r", Style::default().fg(Color::Yellow)),
        Span::raw(" Refresh  "),
        Span::styled("?", Style::default().fg(Color::Yellow)),
        Span::raw(" Help  "),
        Span::styled("q", Style::default().fg(Color::Yellow)),
        Span::raw(" Quit"),
    ]);
    let paragraph = Paragraph::new(help_text).style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, area);
}
