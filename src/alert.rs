//! Fault alerts: an audible cue and a visual status change.
//!
//! Both effects are fire-and-forget. A terminal that cannot beep or a UI that
//! is not listening must never reach back into the ingestion loop.

use std::io::Write;

use tokio::sync::watch;

use crate::data::Reading;

/// Side effects triggered for each faulty reading.
pub trait Notifier: Send + Sync {
    /// Called once per faulty reading. Must not panic or block.
    fn notify(&self, reading: &Reading);
}

/// Latest fault, as shown by the UI banner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub timestamp: String,
    pub raw_token: String,
    pub advisory: Option<String>,
}

impl From<&Reading> for Alert {
    fn from(reading: &Reading) -> Self {
        Self {
            timestamp: reading.timestamp_text(),
            raw_token: reading.raw_token().to_string(),
            advisory: reading.advisory().map(str::to_string),
        }
    }
}

/// Terminal bell plus a watch channel carrying the latest [`Alert`].
#[derive(Debug)]
pub struct AlertNotifier {
    bell: bool,
    alerts: watch::Sender<Option<Alert>>,
}

impl AlertNotifier {
    /// Create the notifier and the receiver the UI reads alerts from.
    pub fn new(bell: bool) -> (Self, watch::Receiver<Option<Alert>>) {
        let (alerts, rx) = watch::channel(None);
        (Self { bell, alerts }, rx)
    }

    fn ring(&self) {
        let mut out = std::io::stdout();
        if let Err(e) = out.write_all(b"\x07").and_then(|_| out.flush()) {
            tracing::debug!(error = %e, "terminal bell failed");
        }
    }
}

impl Notifier for AlertNotifier {
    fn notify(&self, reading: &Reading) {
        tracing::warn!(
            token = reading.raw_token(),
            bits = ?reading.fault_bits(),
            "fault detected"
        );
        if self.bell {
            self.ring();
        }
        // send_replace succeeds even with no receivers left.
        self.alerts.send_replace(Some(Alert::from(reading)));
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::data::{evaluate, TIMESTAMP_FORMAT};
    use chrono::NaiveDateTime;
    use std::sync::{Arc, Mutex};

    /// Notifier that records what it was called with.
    #[derive(Debug, Default, Clone)]
    pub(crate) struct RecordingNotifier {
        pub calls: Arc<Mutex<Vec<String>>>,
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, reading: &Reading) {
            self.calls.lock().unwrap().push(reading.raw_token().to_string());
        }
    }

    fn faulty() -> Reading {
        let ts = NaiveDateTime::parse_from_str("2024-05-01 13:00:00", TIMESTAMP_FORMAT).unwrap();
        evaluate("0100", ts).unwrap().with_advisory("Inspect relay 1")
    }

    #[test]
    fn test_alert_is_published() {
        let (notifier, rx) = AlertNotifier::new(false);
        assert!(rx.borrow().is_none());

        notifier.notify(&faulty());

        let alert = rx.borrow().clone().unwrap();
        assert_eq!(alert.raw_token, "0100");
        assert_eq!(alert.timestamp, "2024-05-01 13:00:00");
        assert_eq!(alert.advisory.as_deref(), Some("Inspect relay 1"));
    }

    #[test]
    fn test_notify_without_listeners_is_harmless() {
        let (notifier, rx) = AlertNotifier::new(false);
        drop(rx);
        notifier.notify(&faulty());
    }
}
