//! Add-marker form rendering

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::app::{App, FormField};
use crate::sync::MutationState;

/// Renders the form for tracking a new location
pub fn render(frame: &mut Frame, app: &App) {
    let area = frame.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(9), // Form
            Constraint::Min(0),
            Constraint::Length(1), // Help text
        ])
        .split(area);

    render_form(frame, app, chunks[0]);
    render_help(frame, chunks[2]);
}

fn render_form(frame: &mut Frame, app: &App, area: Rect) {
    let form = &app.form;
    let mut lines = vec![
        field_line("Latitude", &form.latitude, form.focus == FormField::Latitude),
        field_line("Longitude", &form.longitude, form.focus == FormField::Longitude),
        field_line("Name", &form.name, form.focus == FormField::Name),
        Line::from(""),
    ];

    let status = match (app.add_state(), &form.error) {
        (MutationState::Loading, _) => Some(Span::styled(
            "Adding marker...",
            Style::default().fg(Color::Yellow),
        )),
        (_, Some(error)) => Some(Span::styled(error.clone(), Style::default().fg(Color::Red))),
        _ => None,
    };
    if let Some(status) = status {
        lines.push(Line::from(status));
    }

    let block = Block::default()
        .title(" Track a new location ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn field_line(label: &str, value: &str, focused: bool) -> Line<'static> {
    let label_style = if focused {
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let cursor = if focused { "_" } else { "" };
    Line::from(vec![
        Span::styled(format!("  {:<11}", label), label_style),
        Span::raw(format!("{}{}", value, cursor)),
    ])
}

fn render_help(frame: &mut Frame, area: Rect) {
    let help_text = Line::from(vec![
        Span::styled("Tab", Style::default().fg(Color::Yellow)),
        Span::raw(" Next field  "),
        Span::styled("Enter", Style::default().fg(Color::Yellow)),
        Span::raw(" Add  "),
        Span::styled("Esc", Style::default().fg(Color::Yellow)),
        Span::raw(" Cancel"),
    ]);
    let paragraph = Paragraph::new(help_text).style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, area);
}
