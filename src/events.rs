use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::app::App;
use crate::store::ExportFormat;

/// Poll for events with a timeout
pub fn poll_event(timeout: Duration) -> Result<Option<Event>> {
    if event::poll(timeout)? {
        Ok(Some(event::read()?))
    } else {
        Ok(None)
    }
}

/// Handle a key event
pub fn handle_key_event(app: &mut App, key: KeyEvent) {
    if key.kind == KeyEventKind::Release {
        return;
    }

    // If help is shown, any key closes it
    if app.show_help {
        app.show_help = false;
        return;
    }

    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => app.quit(),

        // Manual entry line
        KeyCode::Char(c) if c.is_ascii_digit() => app.input_push(c),
        KeyCode::Backspace => app.input_pop(),
        KeyCode::Enter => app.submit_input(),
        KeyCode::Esc => app.clear_input(),

        // Quit only with an empty input line so a half-typed word is not lost
        KeyCode::Char('q') => {
            if app.input.is_empty() {
                app.quit();
            } else {
                app.set_status_message("Clear the input line (Esc) before quitting".to_string());
            }
        }

        // View switching
        KeyCode::Tab | KeyCode::BackTab | KeyCode::Right => app.next_view(),
        KeyCode::Left => app.prev_view(),

        // Export
        KeyCode::Char('e') => app.export(ExportFormat::Csv),
        KeyCode::Char('E') => app.export(ExportFormat::Json),
        KeyCode::Char('x') => app.export(ExportFormat::Xlsx),

        // Help
        KeyCode::Char('?') => app.toggle_help(),

        _ => {}
    }
}
