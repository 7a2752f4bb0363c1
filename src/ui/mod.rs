//! Terminal UI rendering using ratatui.
//!
//! Each view is implemented in its own submodule with a `render` function.
//!
//! ## Submodules
//!
//! - [`readings`]: Table of the rolling window, newest first
//! - [`timeline`]: Fault/normal bar chart of the rolling window
//! - [`common`]: Shared components (header, banner, tabs, input line, status bar, help)
//! - [`theme`]: Light/dark theme support with terminal auto-detection
//!
//! ## Rendering Architecture
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │ Header (common::render_header)       │
//! ├──────────────────────────────────────┤
//! │ Alert banner (common::render_banner) │
//! ├──────────────────────────────────────┤
//! │ Tabs (common::render_tabs)           │
//! ├──────────────────────────────────────┤
//! │ View Content                         │
//! │ (readings/timeline::render)          │
//! ├──────────────────────────────────────┤
//! │ Input line (common::render_input)    │
//! ├──────────────────────────────────────┤
//! │ Status Bar (common::render_status)   │
//! └──────────────────────────────────────┘
//!         ↑
//!    Overlay rendered on top: common::render_help
//! ```

pub mod common;
pub mod readings;
pub mod theme;
pub mod timeline;

pub use theme::Theme;

use ratatui::{
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Style},
    widgets::Paragraph,
    Frame,
};

use crate::app::{App, View};

/// Minimum terminal width for a usable display.
pub const MIN_WIDTH: u16 = 60;
/// Minimum terminal height for a usable display.
pub const MIN_HEIGHT: u16 = 14;

/// Draw one full frame.
pub fn draw(frame: &mut Frame, app: &App) {
    let area = frame.area();

    if area.width < MIN_WIDTH || area.height < MIN_HEIGHT {
        let msg = format!(
            "Terminal too small: {}x{}\nMinimum: {}x{}\n\nResize to continue",
            area.width, area.height, MIN_WIDTH, MIN_HEIGHT
        );
        let paragraph = Paragraph::new(msg)
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::Yellow));
        let centered = Rect::new(0, (area.height / 2).saturating_sub(2), area.width, 5.min(area.height));
        frame.render_widget(paragraph, centered);
        return;
    }

    let chunks = Layout::vertical([
        Constraint::Length(1), // Header bar
        Constraint::Length(1), // Alert banner
        Constraint::Length(1), // Tabs
        Constraint::Min(6),    // Content
        Constraint::Length(3), // Input line
        Constraint::Length(1), // Status bar
    ])
    .split(area);

    common::render_header(frame, app, chunks[0]);
    common::render_banner(frame, app, chunks[1]);
    common::render_tabs(frame, app, chunks[2]);

    match app.current_view {
        View::Readings => readings::render(frame, app, chunks[3]),
        View::Timeline => timeline::render(frame, app, chunks[3]),
    }

    common::render_input(frame, app, chunks[4]);
    common::render_status_bar(frame, app, chunks[5]);

    if app.show_help {
        common::render_help(frame, app, area);
    }
}
