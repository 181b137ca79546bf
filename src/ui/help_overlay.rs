//! Help overlay listing the shortcuts of every view
//!
//! The content is generated from [`KEY_MAP`], the same table that documents
//! [`App::handle_key`](crate::app::App::handle_key).

use ratatui::{
    layout::{Constraint, Flex, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use crate::app::{key_label, KeyHint, KEY_MAP};

const WIDTH: u16 = 46;
const KEY_COLUMN: usize = 14;

/// Draws the shortcut table centered over the current view
pub fn render(frame: &mut Frame) {
    let lines = shortcut_lines();
    // Two rows for the border; shrink to the terminal if it is shorter.
    let height = (lines.len() as u16 + 2).min(frame.area().height);
    let area = centered(frame.area(), WIDTH.min(frame.area().width), height);

    let block = Block::default()
        .title(" Keyboard Shortcuts ")
        .title_bottom(Line::from(" Esc closes ").right_aligned())
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    frame.render_widget(Clear, area);
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn shortcut_lines() -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for (index, (view, hints)) in KEY_MAP.iter().enumerate() {
        if index > 0 {
            lines.push(Line::default());
        }
        lines.push(Line::styled(
            *view,
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ));
        lines.extend(hints.iter().map(hint_line));
    }
    lines
}

fn hint_line(hint: &KeyHint) -> Line<'static> {
    let keys = hint
        .codes
        .iter()
        .map(key_label)
        .collect::<Vec<_>>()
        .join("/");
    Line::from(vec![
        Span::styled(
            format!(" {:<width$}", keys, width = KEY_COLUMN),
            Style::default().fg(Color::Yellow),
        ),
        Span::raw(hint.action),
    ])
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let [row] = Layout::vertical([Constraint::Length(height)])
        .flex(Flex::Center)
        .areas(area);
    let [cell] = Layout::horizontal([Constraint::Length(width)])
        .flex(Flex::Center)
        .areas(row);
    cell
}
