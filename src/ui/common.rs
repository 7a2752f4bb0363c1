//! Common UI components shared across views.
//!
//! This module contains the header bar, alert banner, tab bar, input line,
//! status bar, and help overlay.

use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Tabs},
    Frame,
};

use crate::app::{App, View};

/// Render the header bar with source and session totals.
///
/// Displays: latest status indicator, input source, window fault count and
/// per-session counters.
pub fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let (status_icon, status_style, status_label) = match app.latest() {
        Some(reading) => (
            "●",
            app.theme.status_style(reading.classification()),
            reading.classification().label(),
        ),
        None => ("○", Style::default().add_modifier(Modifier::DIM), "no readings"),
    };

    let totals = app.totals;
    let mut spans = vec![
        Span::styled(format!(" {} ", status_icon), status_style),
        Span::styled("FAULTWATCH ", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw("│ "),
        Span::styled(status_label, status_style),
        Span::raw(" │ "),
        Span::raw(app.source_description().to_string()),
        Span::raw(" │ "),
        Span::styled(
            format!("{}", app.window.fault_count()),
            if app.window.fault_count() > 0 {
                Style::default().fg(app.theme.faulty)
            } else {
                Style::default().add_modifier(Modifier::DIM)
            },
        ),
        Span::raw(format!("/{} faulty in window │ ", app.window.len())),
        Span::styled(
            format!("{}", totals.recorded),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw(" recorded "),
        Span::raw(format!("{} rejected", totals.rejected)),
    ];
    if totals.failed > 0 {
        spans.push(Span::raw(" "));
        spans.push(Span::styled(
            format!("{} NOT RECORDED", totals.failed),
            Style::default().fg(app.theme.faulty).add_modifier(Modifier::BOLD),
        ));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// Render the alert banner while the newest reading is faulty.
pub fn render_banner(frame: &mut Frame, app: &App, area: Rect) {
    let Some(alert) = app.active_alert() else {
        return;
    };

    let text = match alert.advisory {
        Some(ref advisory) => format!(
            " FAULT {} at {}: {} ",
            alert.raw_token, alert.timestamp, advisory
        ),
        None => format!(" FAULT {} at {} ", alert.raw_token, alert.timestamp),
    };
    frame.render_widget(Paragraph::new(text).style(app.theme.banner), area);
}

/// Render the tab bar showing available views.
pub fn render_tabs(frame: &mut Frame, app: &App, area: Rect) {
    let titles: Vec<Line> = [View::Readings, View::Timeline]
        .iter()
        .map(|view| Line::from(format!(" {} ", view.label())))
        .collect();

    let selected = match app.current_view {
        View::Readings => 0,
        View::Timeline => 1,
    };

    let tabs = Tabs::new(titles)
        .select(selected)
        .style(app.theme.tab_inactive)
        .highlight_style(app.theme.tab_active)
        .divider("|");

    frame.render_widget(tabs, area);
}

/// Render the manual entry line.
pub fn render_input(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title(" Status word ")
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.highlight));

    let line = Line::from(vec![
        Span::raw(" "),
        Span::raw(app.input.clone()),
        Span::styled("_", Style::default().add_modifier(Modifier::SLOW_BLINK)),
    ]);
    frame.render_widget(Paragraph::new(line).block(block), area);
}

/// Render the status bar at the bottom.
///
/// Temporary messages (rejections, failures, export results) take priority
/// over the control hints.
pub fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    if let Some(msg) = app.get_status_message() {
        let paragraph =
            Paragraph::new(format!(" {} ", msg)).style(Style::default().fg(app.theme.highlight));
        frame.render_widget(paragraph, area);
        return;
    }

    let mut status = String::from(" 0-9:type Enter:submit Esc:clear Tab:switch e/E/x:export ?:help q:quit");
    if let Some(note) = app.source_note() {
        status.push_str(" | ");
        status.push_str(note);
    }

    let paragraph = Paragraph::new(status).style(Style::default().add_modifier(Modifier::DIM));
    frame.render_widget(paragraph, area);
}

/// Render the help overlay with keyboard shortcuts.
///
/// Displayed as a centered modal on top of the current view.
pub fn render_help(frame: &mut Frame, app: &App, area: Rect) {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let help_text = vec![
        Line::from(vec![Span::styled("Keyboard Shortcuts", app.theme.header)]),
        Line::from(""),
        Line::from(vec![Span::styled(" Entry", bold)]),
        Line::from("  0-9         Type a status word"),
        Line::from("  Backspace   Delete last digit"),
        Line::from("  Enter       Submit"),
        Line::from("  Esc         Clear the line"),
        Line::from(""),
        Line::from(vec![Span::styled(" Views", bold)]),
        Line::from("  Tab ←/→     Readings / Timeline"),
        Line::from(""),
        Line::from(vec![Span::styled(" General", bold)]),
        Line::from("  e           Export log as CSV"),
        Line::from("  E           Export log as JSON"),
        Line::from("  x           Export log as Excel workbook"),
        Line::from("  q           Quit (empty line only)"),
        Line::from(""),
        Line::from(vec![Span::styled(
            "Press any key to close",
            Style::default().add_modifier(Modifier::DIM),
        )]),
    ];

    let block = Block::default()
        .title(" Help ")
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.highlight));

    let paragraph = Paragraph::new(help_text).block(block);

    // Center the help overlay - responsive to terminal size
    let help_width = 42u16.min(area.width.saturating_sub(4));
    let help_height = 19u16.min(area.height.saturating_sub(2));
    let x = area.x + (area.width.saturating_sub(help_width)) / 2;
    let y = area.y + (area.height.saturating_sub(help_height)) / 2;
    let help_area = Rect::new(x, y, help_width, help_height);

    frame.render_widget(Clear, help_area);
    frame.render_widget(paragraph, help_area);
}
