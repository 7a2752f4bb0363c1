//! Readings view rendering.
//!
//! Displays the rolling window as a table, newest reading first.

use ratatui::{
    layout::{Constraint, Rect},
    style::{Modifier, Style},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table},
    Frame,
};

use crate::app::App;

/// Render the Readings view.
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title(format!(
            " Last {} readings [{}/{}] ",
            app.window.capacity(),
            app.window.len(),
            app.window.capacity()
        ))
        .borders(Borders::ALL)
        .border_type(app.theme.border_type);

    if app.window.is_empty() {
        let paragraph = Paragraph::new(" No readings yet. Type a status word and press Enter.")
            .style(Style::default().add_modifier(Modifier::DIM))
            .block(block);
        frame.render_widget(paragraph, area);
        return;
    }

    let header = Row::new(vec!["Time", "Status word", "Status", "Active bits", "Advisory"])
        .height(1)
        .style(app.theme.header);

    let readings = app.window.snapshot();
    let rows: Vec<Row> = readings
        .iter()
        .rev()
        .map(|r| {
            let bits = r
                .fault_bits()
                .iter()
                .map(|b| b.to_string())
                .collect::<Vec<_>>()
                .join(",");
            Row::new(vec![
                Cell::from(r.timestamp_text()),
                Cell::from(r.raw_token().to_string()),
                Cell::from(r.classification().symbol())
                    .style(app.theme.status_style(r.classification())),
                Cell::from(if bits.is_empty() { "-".to_string() } else { bits }),
                Cell::from(r.advisory().unwrap_or("-").to_string()),
            ])
        })
        .collect();

    let widths = [
        Constraint::Length(19), // Timestamp
        Constraint::Fill(1),    // Status word
        Constraint::Length(6),  // Status
        Constraint::Fill(1),    // Active bits
        Constraint::Fill(3),    // Advisory
    ];

    let table = Table::new(rows, widths).header(header).block(block);
    frame.render_widget(table, area);
}
