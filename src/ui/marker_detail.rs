//! Marker detail screen rendering
//!
//! Shows one marker: name, status, coordinates, how long it has been tracked,
//! the static map thumbnail link and its change history. While a refetch is
//! pending the previous data stays on screen with a refreshing hint.

use chrono::{DateTime, Utc};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use super::{placeholder, status_color};
use crate::app::App;
use crate::cache::CacheEntry;
use crate::data::{HistoryEvent, Marker};

/// Formats the time between `since` and `now` as a rough age ("3 days ago").
///
/// # Arguments
/// * `since` - The earlier timestamp
/// * `now` - The reference time
///
/// # Returns
/// A human readable string; timestamps in the future read as "just now"
pub fn format_age(since: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now - since;
    let (amount, unit) = if elapsed.num_minutes() < 1 {
        return "just now".to_string();
    } else if elapsed.num_hours() < 1 {
        (elapsed.num_minutes(), "minute")
    } else if elapsed.num_days() < 1 {
        (elapsed.num_hours(), "hour")
    } else if elapsed.num_days() < 30 {
        (elapsed.num_days(), "day")
    } else if elapsed.num_days() < 365 {
        (elapsed.num_days() / 30, "month")
    } else {
        (elapsed.num_days() / 365, "year")
    };
    let plural = if amount == 1 { "" } else { "s" };
    format!("{} {}{} ago", amount, unit, plural)
}

/// Renders the detail view for `marker_id`
pub fn render(frame: &mut Frame, app: &App, marker_id: &str) {
    let area = frame.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),    // Content
            Constraint::Length(1), // Help text
        ])
        .split(area);

    let entry = app.detail_entry().unwrap_or_default();
    match entry.marker() {
        Some(marker) => render_marker(frame, app, marker, &entry, chunks[0]),
        None => render_missing(frame, &entry, marker_id, chunks[0]),
    }

    render_help(frame, chunks[1]);
}

fn render_marker(frame: &mut Frame, app: &App, marker: &Marker, entry: &CacheEntry, area: Rect) {
    let label = Style::default().fg(Color::DarkGray);
    let mut lines = vec![
        Line::from(vec![
            Span::styled("Status      ", label),
            Span::styled(
                marker.status.to_string(),
                Style::default().fg(status_color(&marker.status)),
            ),
        ]),
        Line::from(vec![
            Span::styled("Coordinates ", label),
            Span::raw(marker.coordinate.to_string()),
        ]),
        Line::from(vec![
            Span::styled("Tracking    ", label),
            Span::raw(format!(
                "created {}",
                format_age(marker.date_created, Utc::now())
            )),
        ]),
    ];

    match app.maps_api_key.as_deref() {
        Some(key) => lines.push(Line::from(vec![
            Span::styled("Map         ", label),
            Span::styled(marker.map_thumbnail_url(key), Style::default().fg(Color::Blue)),
        ])),
        None => lines.push(Line::from(vec![
            Span::styled("Map         ", label),
            Span::styled("set a maps API key to see a thumbnail link", label),
        ])),
    }

    if let Some(image) = &marker.current_image {
        lines.push(Line::from(vec![
            Span::styled("Latest image ", label),
            Span::raw(image.image_url.clone()),
        ]));
    }

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "History",
        Style::default().add_modifier(Modifier::BOLD),
    )));
    let history = marker.history();
    if history.is_empty() {
        lines.push(Line::from(Span::styled("  No changes observed yet", label)));
    }
    for event in history {
        lines.push(history_line(&event));
    }

    if let Some(err) = entry.error.as_ref().filter(|_| entry.is_error()) {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!("Last refresh failed: {}", err),
            Style::default().fg(Color::Red),
        )));
    }

    let mut title = format!(" {} ", marker.display_name());
    if entry.is_loading() {
        title.push_str("(refreshing…) ");
    }
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let paragraph = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.detail_scroll_offset, 0));

    frame.render_widget(paragraph, area);
}

fn history_line(event: &HistoryEvent) -> Line<'static> {
    match event {
        HistoryEvent::ImageCaptured { date, url } => Line::from(vec![
            Span::styled(format!("  {:<28}", date), Style::default().fg(Color::Yellow)),
            Span::raw("image captured  "),
            Span::styled(url.clone(), Style::default().fg(Color::DarkGray)),
        ]),
        HistoryEvent::ObjectsDetected { date, objects } => Line::from(vec![
            Span::styled(format!("  {:<28}", date), Style::default().fg(Color::Yellow)),
            Span::raw(format!("detected {}", objects.join(", "))),
        ]),
    }
}

fn render_missing(frame: &mut Frame, entry: &CacheEntry, marker_id: &str, area: Rect) {
    let message = match &entry.error {
        Some(err) if err.is_not_found() => format!("Marker {} no longer exists", marker_id),
        Some(err) => format!("Could not load marker {}: {}", marker_id, err),
        None => "Loading marker...".to_string(),
    };
    let block = Block::default()
        .title(format!(" Marker {} ", marker_id))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));
    placeholder(frame, block, &message, entry.is_error(), area);
}

fn render_help(frame: &mut Frame, area: Rect) {
    let help_text = Line::from(vec![
        Span::styled("↑/↓", Style::default().fg(Color::Yellow)),
        Span::raw(" Scroll  "),
        Span::styled("r", Style::default().fg(Color::Yellow)),
        Span::raw(" Refresh  "),
        Span::styled("d", Style::default().fg(Color::Yellow)),
        Span::raw(" Delete  "),
        Span::styled("Esc", Style::default().fg(Color::Yellow)),
        Span::raw(" Back  "),
        Span::styled("q", Style::default().fg(Color::Yellow)),
        Span::raw(" Quit"),
    ]);
    let paragraph = Paragraph::new(help_text).style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, area);
}
