//! Theme configuration for the TUI.
//!
//! Supports light and dark themes with automatic terminal detection.

use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::block::BorderType;

use crate::data::Classification;

/// Color and style theme for the TUI.
///
/// Use [`Theme::auto_detect()`] for automatic theme selection based on
/// terminal background, or [`Theme::dark()`]/[`Theme::light()`] explicitly.
#[derive(Debug, Clone)]
pub struct Theme {
    /// Accent color for highlights and active elements.
    pub highlight: Color,
    /// Color for faulty readings and the alert banner.
    pub faulty: Color,
    /// Color for normal readings.
    pub normal: Color,
    /// Color for rejected input and soft warnings.
    pub warning: Color,
    /// Style for header rows in tables.
    pub header: Style,
    /// Style for the alert banner.
    pub banner: Style,
    /// Style for the active tab.
    pub tab_active: Style,
    /// Style for inactive tabs.
    pub tab_inactive: Style,
    /// Border style (rounded, plain, etc.).
    pub border_type: BorderType,
}

impl Theme {
    /// Create a dark theme suitable for dark terminal backgrounds.
    pub fn dark() -> Self {
        Self {
            highlight: Color::Cyan,
            faulty: Color::Red,
            normal: Color::Green,
            warning: Color::Yellow,
            header: Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            banner: Style::default().fg(Color::White).bg(Color::Red).add_modifier(Modifier::BOLD),
            tab_active: Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            tab_inactive: Style::default().fg(Color::Gray),
            border_type: BorderType::Rounded,
        }
    }

    /// Create a light theme suitable for light terminal backgrounds.
    pub fn light() -> Self {
        Self {
            highlight: Color::Blue,
            faulty: Color::Red,
            normal: Color::Green,
            warning: Color::Magenta,
            header: Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
            banner: Style::default().fg(Color::White).bg(Color::Red).add_modifier(Modifier::BOLD),
            tab_active: Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
            tab_inactive: Style::default().fg(Color::DarkGray),
            border_type: BorderType::Rounded,
        }
    }

    /// Auto-detect based on terminal background
    pub fn auto_detect() -> Self {
        match terminal_light::luma() {
            Ok(luma) if luma > 0.5 => Self::light(),
            _ => Self::dark(),
        }
    }

    /// Get style for a classification
    pub fn status_style(&self, status: Classification) -> Style {
        match status {
            Classification::Normal => Style::default().fg(self.normal),
            Classification::Faulty => Style::default().fg(self.faulty).add_modifier(Modifier::BOLD),
        }
    }
}
