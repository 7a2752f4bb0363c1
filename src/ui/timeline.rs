//! Timeline view rendering.
//!
//! One bar per reading in the window, oldest on the left. Faulty readings
//! are full-height red bars, normal readings short green ones, so runs of
//! faults stand out at a glance.

use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Bar, BarChart, BarGroup, Block, Borders, Paragraph},
    Frame,
};

use crate::app::App;
use crate::data::Classification;

/// Bar height for a faulty reading; normal readings get 1.
const FAULT_HEIGHT: u64 = 4;

/// Render the Timeline view.
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title(" Timeline (oldest → newest) ")
        .borders(Borders::ALL)
        .border_type(app.theme.border_type);

    if app.window.is_empty() {
        let paragraph = Paragraph::new(" Nothing to plot yet.")
            .style(Style::default().add_modifier(Modifier::DIM))
            .block(block);
        frame.render_widget(paragraph, area);
        return;
    }

    let inner = block.inner(area);
    frame.render_widget(block, area);
    let chunks = Layout::vertical([Constraint::Min(3), Constraint::Length(1)]).split(inner);

    let readings = app.window.snapshot();
    let series = app.window.fault_series();
    let bars: Vec<Bar> = readings
        .iter()
        .zip(series)
        .map(|(reading, faulty)| {
            let (value, style) = if faulty == 1 {
                (FAULT_HEIGHT, app.theme.status_style(Classification::Faulty))
            } else {
                (1, app.theme.status_style(Classification::Normal))
            };
            // Seconds only, the full timestamp does not fit under a bar.
            let label = reading.timestamp().format("%S").to_string();
            Bar::default()
                .value(value)
                .text_value(String::new())
                .label(Line::from(label))
                .style(style)
        })
        .collect();

    let chart = BarChart::default()
        .data(BarGroup::default().bars(&bars))
        .bar_width(2)
        .bar_gap(1)
        .max(FAULT_HEIGHT);
    frame.render_widget(chart, chunks[0]);

    let faults = app.window.fault_count();
    let legend = Line::from(vec![
        Span::styled(
            format!(" {} faulty", faults),
            app.theme.status_style(Classification::Faulty),
        ),
        Span::raw("  "),
        Span::styled(
            format!("{} normal", app.window.len() - faults),
            app.theme.status_style(Classification::Normal),
        ),
    ]);
    frame.render_widget(Paragraph::new(legend), chunks[1]);
}
