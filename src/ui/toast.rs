//! Toast line for notifier messages
//!
//! Draws the latest notification on the bottom row, over whatever view is
//! active, until it expires.

use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Clear, Paragraph},
    Frame,
};

use crate::app::App;

/// Renders the current toast, if any, on the last row above the help line
pub fn render(frame: &mut Frame, app: &App) {
    let Some(toast) = &app.toast else {
        return;
    };
    let area = frame.area();
    if area.height < 3 {
        return;
    }
    let row = Rect::new(area.x, area.y + area.height - 2, area.width, 1);

    let (icon, color) = if toast.notification.is_failure() {
        ("\u{2717}", Color::Red) // ✗
    } else {
        ("\u{2713}", Color::Green) // ✓
    };
    let line = Line::from(vec![
        Span::styled(
            format!(" {} ", icon),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ),
        Span::styled(toast.notification.message.clone(), Style::default().fg(color)),
    ]);

    frame.render_widget(Clear, row);
    frame.render_widget(Paragraph::new(line), row);
}
