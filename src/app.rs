//! Application state for the interactive front end.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch};

use crate::alert::Alert;
use crate::data::{Reading, RollingWindow};
use crate::error::ValidationError;
use crate::ingest::{IngestEvent, IngestHandle, SubmitError};
use crate::store::{self, ExportFormat};
use crate::ui::Theme;

/// How long a status bar message stays visible.
const STATUS_MESSAGE_TTL: Duration = Duration::from_secs(3);

/// The current view/tab in the TUI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    /// Table of the rolling window, newest first.
    Readings,
    /// Fault/normal bar chart of the rolling window.
    Timeline,
}

impl View {
    /// Cycle to the next view.
    pub fn next(self) -> Self {
        match self {
            View::Readings => View::Timeline,
            View::Timeline => View::Readings,
        }
    }

    /// Cycle to the previous view.
    pub fn prev(self) -> Self {
        // Two views: previous and next coincide.
        self.next()
    }

    /// Returns the display label for this view.
    pub fn label(&self) -> &'static str {
        match self {
            View::Readings => "Readings",
            View::Timeline => "Timeline",
        }
    }
}

/// Per-session counters shown in the header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Totals {
    pub recorded: u64,
    pub faults: u64,
    pub rejected: u64,
    pub failed: u64,
}

/// Where the app's data comes from.
#[derive(Debug)]
pub struct AppFeeds {
    pub handle: IngestHandle,
    pub window: watch::Receiver<Vec<Reading>>,
    pub alerts: watch::Receiver<Option<Alert>>,
    pub events: mpsc::UnboundedReceiver<IngestEvent>,
}

/// Main application state.
pub struct App {
    pub running: bool,
    pub current_view: View,
    pub show_help: bool,

    /// Manual entry line.
    pub input: String,
    pub window: RollingWindow,
    pub alert: Option<Alert>,
    pub totals: Totals,

    source_description: String,
    source_note: Option<String>,
    log_path: PathBuf,
    feeds: AppFeeds,

    pub theme: Theme,

    // Status message (temporary feedback)
    pub status_message: Option<(String, Instant)>,
}

impl App {
    /// Create a new App reading from `feeds`.
    pub fn new(
        feeds: AppFeeds,
        source_description: impl Into<String>,
        log_path: impl Into<PathBuf>,
        window_size: usize,
    ) -> Self {
        let mut window = RollingWindow::new(window_size);
        window.seed(feeds.window.borrow().iter().cloned());
        Self {
            running: true,
            current_view: View::Readings,
            show_help: false,
            input: String::new(),
            window,
            alert: None,
            totals: Totals::default(),
            source_description: source_description.into(),
            source_note: None,
            log_path: log_path.into(),
            feeds,
            theme: Theme::auto_detect(),
            status_message: None,
        }
    }

    /// Attach a note about the input source, e.g. why the device is missing.
    pub fn with_source_note(mut self, note: Option<String>) -> Self {
        if let Some(ref note) = note {
            self.set_status_message(note.clone());
        }
        self.source_note = note;
        self
    }

    pub fn with_theme(mut self, theme: Theme) -> Self {
        self.theme = theme;
        self
    }

    /// Returns a description of the current input source.
    pub fn source_description(&self) -> &str {
        &self.source_description
    }

    pub fn source_note(&self) -> Option<&str> {
        self.source_note.as_deref()
    }

    /// Set a temporary status message that will be shown for a few seconds.
    pub fn set_status_message(&mut self, message: String) {
        self.status_message = Some((message, Instant::now()));
    }

    /// Get the current status message if it hasn't expired.
    pub fn get_status_message(&self) -> Option<&str> {
        if let Some((msg, time)) = &self.status_message {
            if time.elapsed() < STATUS_MESSAGE_TTL {
                return Some(msg);
            }
        }
        None
    }

    /// Newest reading in the window.
    pub fn latest(&self) -> Option<&Reading> {
        self.window.latest()
    }

    /// The banner to show: only while the newest reading is faulty.
    pub fn active_alert(&self) -> Option<&Alert> {
        match self.latest() {
            Some(reading) if reading.is_faulty() => self.alert.as_ref(),
            _ => None,
        }
    }

    /// Pull everything the ingestion loop has published since the last call.
    pub fn refresh(&mut self) {
        while let Ok(event) = self.feeds.events.try_recv() {
            self.apply_event(event);
        }

        if self.feeds.window.has_changed().unwrap_or(false) {
            let snapshot = self.feeds.window.borrow_and_update().clone();
            self.window.seed(snapshot);
        }

        if self.feeds.alerts.has_changed().unwrap_or(false) {
            self.alert = self.feeds.alerts.borrow_and_update().clone();
        }
    }

    fn apply_event(&mut self, event: IngestEvent) {
        match event {
            IngestEvent::Ingested { reading, .. } => {
                self.totals.recorded += 1;
                if reading.is_faulty() {
                    self.totals.faults += 1;
                }
            }
            IngestEvent::Rejected { token, error, .. } => {
                self.totals.rejected += 1;
                self.set_status_message(format!("Rejected {:?}: {}", token, error));
            }
            IngestEvent::Failed { token, error } => {
                self.totals.failed += 1;
                self.set_status_message(format!("NOT RECORDED {}: {}", token, error));
            }
            IngestEvent::MirrorFailed { error } => {
                self.set_status_message(format!("Mirror update failed: {}", error));
            }
        }
    }

    /// Switch to the next view.
    pub fn next_view(&mut self) {
        self.current_view = self.current_view.next();
    }

    /// Switch to the previous view.
    pub fn prev_view(&mut self) {
        self.current_view = self.current_view.prev();
    }

    /// Toggle the help overlay.
    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }

    /// Append a digit to the input line.
    pub fn input_push(&mut self, c: char) {
        self.input.push(c);
    }

    /// Remove the last character from the input line.
    pub fn input_pop(&mut self) {
        self.input.pop();
    }

    pub fn clear_input(&mut self) {
        self.input.clear();
    }

    /// Queue the input line for ingestion without blocking the UI.
    ///
    /// The line is kept when the queue is busy so the operator can retry.
    pub fn submit_input(&mut self) {
        let token = self.input.trim().to_string();
        if token.is_empty() {
            self.set_status_message(format!("Rejected: {}", ValidationError::Empty));
            return;
        }
        match self.feeds.handle.try_submit(token.clone()) {
            Ok(()) => {
                self.input.clear();
                self.set_status_message(format!("Submitted {}", token));
            }
            Err(SubmitError::Busy) => {
                self.set_status_message("Busy: ingestion queue is full, press Enter to retry".to_string());
            }
            Err(e @ SubmitError::Closed) => {
                self.set_status_message(format!("Cannot submit: {}", e));
            }
        }
    }

    /// Export destination next to the log, e.g. `machine_status_export.csv`.
    pub fn export_path(&self, format: ExportFormat) -> PathBuf {
        let stem = self
            .log_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("machine_status");
        let name = format!("{}_export.{}", stem, format.extension());
        match self.log_path.parent() {
            Some(dir) if dir != Path::new("") => dir.join(name),
            _ => PathBuf::from(name),
        }
    }

    /// Export the event log and report the result in the status bar.
    pub fn export(&mut self, format: ExportFormat) {
        let dest = self.export_path(format);
        match store::export(&self.log_path, &dest) {
            Ok(summary) => self.set_status_message(format!(
                "Exported {} rows as {} to {}",
                summary.rows,
                summary.format.label(),
                dest.display()
            )),
            Err(e) => self.set_status_message(format!("Export failed: {:#}", e)),
        }
    }

    /// Signal the application to quit.
    pub fn quit(&mut self) {
        self.running = false;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::data::{evaluate, TIMESTAMP_FORMAT};
    use crate::ingest::{Origin, Submission};
    use chrono::NaiveDateTime;
    use tempfile::TempDir;

    pub(crate) struct Fixture {
        pub app: App,
        pub queue: mpsc::Receiver<Submission>,
        pub window: watch::Sender<Vec<Reading>>,
        pub alerts: watch::Sender<Option<Alert>>,
        pub events: mpsc::UnboundedSender<IngestEvent>,
        pub dir: TempDir,
    }

    pub(crate) fn fixture(queue_capacity: usize) -> Fixture {
        let dir = TempDir::new().unwrap();
        let (handle, queue) = IngestHandle::channel(queue_capacity);
        let (window, window_rx) = watch::channel(Vec::new());
        let (alerts, alerts_rx) = watch::channel(None);
        let (events, events_rx) = mpsc::unbounded_channel();
        let feeds = AppFeeds {
            handle,
            window: window_rx,
            alerts: alerts_rx,
            events: events_rx,
        };
        let app = App::new(feeds, "manual entry", dir.path().join("machine_status.csv"), 20)
            .with_theme(Theme::dark());
        Fixture {
            app,
            queue,
            window,
            alerts,
            events,
            dir,
        }
    }

    fn reading(token: &str) -> Reading {
        let ts = NaiveDateTime::parse_from_str("2024-05-01 10:00:00", TIMESTAMP_FORMAT).unwrap();
        evaluate(token, ts).unwrap()
    }

    #[test]
    fn test_view_cycles() {
        assert_eq!(View::Readings.next(), View::Timeline);
        assert_eq!(View::Timeline.next(), View::Readings);
        assert_eq!(View::Readings.prev(), View::Timeline);
    }

    #[test]
    fn test_submit_input_queues_manual_token() {
        let mut f = fixture(4);
        f.app.input = " 0010 ".to_string();
        f.app.submit_input();

        assert!(f.app.input.is_empty());
        let submission = f.queue.try_recv().unwrap();
        assert_eq!(submission.token, "0010");
        assert_eq!(submission.origin, Origin::Manual);
        assert_eq!(f.app.get_status_message(), Some("Submitted 0010"));
    }

    #[test]
    fn test_empty_input_is_rejected_locally() {
        let mut f = fixture(4);
        f.app.input = "   ".to_string();
        f.app.submit_input();
        assert!(f.queue.try_recv().is_err());
        assert_eq!(f.app.get_status_message(), Some("Rejected: empty status word"));
    }

    #[test]
    fn test_busy_queue_keeps_input() {
        let mut f = fixture(1);
        f.app.input = "1".to_string();
        f.app.submit_input();
        f.app.input = "0".to_string();
        f.app.submit_input();

        assert_eq!(f.app.input, "0");
        assert!(f.app.get_status_message().unwrap().starts_with("Busy"));
    }

    #[test]
    fn test_refresh_applies_window_and_events() {
        let mut f = fixture(4);
        let faulty = reading("0010").with_advisory("Tighten the belt.");
        f.window.send_replace(vec![reading("0000"), faulty.clone()]);
        f.alerts.send_replace(Some(Alert::from(&faulty)));
        f.events
            .send(IngestEvent::Ingested {
                reading: faulty,
                origin: Origin::Device,
                advisory: Some("suggested"),
            })
            .unwrap();
        f.events
            .send(IngestEvent::Rejected {
                token: "02a".to_string(),
                origin: Origin::Manual,
                error: ValidationError::InvalidCharacter {
                    character: '2',
                    position: 1,
                },
            })
            .unwrap();

        f.app.refresh();

        assert_eq!(f.app.window.len(), 2);
        assert_eq!(f.app.totals.recorded, 1);
        assert_eq!(f.app.totals.faults, 1);
        assert_eq!(f.app.totals.rejected, 1);
        assert!(f.app.get_status_message().unwrap().contains("02a"));
        let alert = f.app.active_alert().unwrap();
        assert_eq!(alert.advisory.as_deref(), Some("Tighten the belt."));
    }

    #[test]
    fn test_alert_clears_when_latest_is_normal() {
        let mut f = fixture(4);
        let faulty = reading("1");
        f.alerts.send_replace(Some(Alert::from(&faulty)));
        f.window.send_replace(vec![faulty, reading("0")]);
        f.app.refresh();

        assert!(f.app.alert.is_some());
        assert!(f.app.active_alert().is_none());
    }

    #[test]
    fn test_failed_event_is_surfaced() {
        let mut f = fixture(4);
        f.events
            .send(IngestEvent::Failed {
                token: "1".to_string(),
                error: "disk full".to_string(),
            })
            .unwrap();
        f.app.refresh();

        assert_eq!(f.app.totals.failed, 1);
        assert!(f.app.get_status_message().unwrap().contains("NOT RECORDED"));
    }

    #[test]
    fn test_export_path_sits_next_to_log() {
        let f = fixture(4);
        assert_eq!(
            f.app.export_path(ExportFormat::Json),
            f.dir.path().join("machine_status_export.json")
        );
    }

    #[test]
    fn test_export_reports_missing_log() {
        let mut f = fixture(4);
        f.app.export(ExportFormat::Csv);
        assert!(f.app.get_status_message().unwrap().starts_with("Export failed"));
    }
}
