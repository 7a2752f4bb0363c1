//! The single-writer ingestion loop.
//!
//! Two producers feed one bounded queue: the device poller (see
//! [`spawn_poller`]) and foreground manual submissions through an
//! [`IngestHandle`]. One [`Ingestor`] drains the queue, taking each
//! submission all the way through validation, persistence and notification
//! before looking at the next. That is what keeps the event log in arrival
//! order.
//!
//! ```text
//! Idle ─▶ ReadingPending ─▶ Validating ──(invalid)──────────────▶ Idle
//!                               │
//!                               ▼
//!                          Persisting ──(append failed)──────────▶ Idle
//!                               │
//!                 (faulty)      ├──────────▶ Notifying ─┐
//!                 (normal)      │                       ▼
//!                               └──────────────▶ window push ─▶ Idle
//! ```

mod poller;

pub use poller::spawn_poller;

use std::fmt;
use std::time::Duration;

use chrono::NaiveDateTime;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::advisory::{AdvisoryClient, AdvisoryOutcome};
use crate::alert::Notifier;
use crate::data::duration::format_duration;
use crate::data::{evaluate, reading, Reading, RollingWindow};
use crate::error::{IngestError, LogError, ValidationError};
use crate::store::{EventLog, Mirror};

/// Where a raw token came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Device,
    Manual,
}

impl Origin {
    pub fn label(&self) -> &'static str {
        match self {
            Origin::Device => "device",
            Origin::Manual => "manual",
        }
    }
}

/// A raw token waiting in the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub token: String,
    pub origin: Origin,
}

/// Position of the loop in its per-reading state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestState {
    Idle,
    ReadingPending,
    Validating,
    Persisting,
    Notifying,
}

impl fmt::Display for IngestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            IngestState::Idle => "idle",
            IngestState::ReadingPending => "reading pending",
            IngestState::Validating => "validating",
            IngestState::Persisting => "persisting",
            IngestState::Notifying => "notifying",
        };
        f.write_str(label)
    }
}

/// What happened to a submission, reported to the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestEvent {
    /// The reading is in the log and the window.
    Ingested {
        reading: Reading,
        origin: Origin,
        /// Advisory outcome tag for faulty readings ("suggested", "timed_out", "failed").
        advisory: Option<&'static str>,
    },
    /// The token failed validation; nothing was stored.
    Rejected {
        token: String,
        origin: Origin,
        error: ValidationError,
    },
    /// The primary store could not be written; the reading was dropped
    /// from the pipeline and the operator must act.
    Failed { token: String, error: String },
    /// The mirror could not be written; the reading is still in the log.
    MirrorFailed { error: String },
}

/// Receivers for the loop's observable state.
#[derive(Debug)]
pub struct IngestFeeds {
    /// Copy of the rolling window, republished after every reading.
    pub window: watch::Receiver<Vec<Reading>>,
    pub events: mpsc::UnboundedReceiver<IngestEvent>,
}

/// Why a submission could not be queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("ingestion queue is full, try again")]
    Busy,
    #[error("ingestion loop has stopped")]
    Closed,
}

/// Cloneable producer side of the ingestion queue.
#[derive(Debug, Clone)]
pub struct IngestHandle {
    sender: mpsc::Sender<Submission>,
}

impl IngestHandle {
    /// Create a bounded queue and the handle feeding it.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Submission>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    /// Queue a token, waiting for room.
    pub async fn submit(&self, token: impl Into<String>, origin: Origin) -> Result<(), SubmitError> {
        let submission = Submission {
            token: token.into(),
            origin,
        };
        self.sender.send(submission).await.map_err(|_| SubmitError::Closed)
    }

    /// Queue a manual token without blocking (for the UI thread).
    pub fn try_submit(&self, token: impl Into<String>) -> Result<(), SubmitError> {
        let submission = Submission {
            token: token.into(),
            origin: Origin::Manual,
        };
        self.sender.try_send(submission).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SubmitError::Busy,
            mpsc::error::TrySendError::Closed(_) => SubmitError::Closed,
        })
    }
}

type Clock = Box<dyn Fn() -> NaiveDateTime + Send>;

/// Owner of the event log writer and the rolling window.
pub struct Ingestor {
    log: EventLog,
    mirror: Option<Box<dyn Mirror>>,
    advisory: AdvisoryClient,
    notifier: Box<dyn Notifier>,
    window: RollingWindow,
    window_tx: watch::Sender<Vec<Reading>>,
    events: mpsc::UnboundedSender<IngestEvent>,
    state: IngestState,
    last_timestamp: Option<NaiveDateTime>,
    append_attempts: u32,
    retry_delay: Duration,
    clock: Clock,
}

impl fmt::Debug for Ingestor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ingestor")
            .field("log", &self.log)
            .field("mirror", &self.mirror)
            .field("advisory", &self.advisory)
            .field("state", &self.state)
            .field("window_len", &self.window.len())
            .finish_non_exhaustive()
    }
}

impl Ingestor {
    /// Initialise the log and seed the window from its tail.
    pub fn new(
        mut log: EventLog,
        advisory: AdvisoryClient,
        notifier: Box<dyn Notifier>,
        window_size: usize,
    ) -> Result<(Self, IngestFeeds), LogError> {
        log.ensure_initialized()?;

        let mut window = RollingWindow::new(window_size);
        // The window is only a cache; a damaged history must not stop new
        // readings from being recorded.
        let (seed, skipped) = log.tail_skipping_corrupt(window.capacity())?;
        if !skipped.is_empty() {
            tracing::error!(
                path = %log.path().display(),
                rows = ?skipped,
                "event log has corrupt rows, seeding the window from the rest"
            );
        }
        window.seed(seed);
        let last_timestamp = window.latest().map(|r| r.timestamp());
        tracing::info!(
            path = %log.path().display(),
            seeded = window.len(),
            "event log ready"
        );

        let (window_tx, window_rx) = watch::channel(window.snapshot());
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let ingestor = Self {
            log,
            mirror: None,
            advisory,
            notifier,
            window,
            window_tx,
            events: events_tx,
            state: IngestState::Idle,
            last_timestamp,
            append_attempts: 3,
            retry_delay: Duration::from_millis(50),
            clock: Box::new(reading::now),
        };
        let feeds = IngestFeeds {
            window: window_rx,
            events: events_rx,
        };
        Ok((ingestor, feeds))
    }

    pub fn with_mirror(mut self, mirror: Box<dyn Mirror>) -> Self {
        self.mirror = Some(mirror);
        self
    }

    /// Number of append attempts before a reading is reported as failed.
    pub fn with_append_attempts(mut self, attempts: u32) -> Self {
        self.append_attempts = attempts.max(1);
        self
    }

    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> NaiveDateTime + Send + 'static,
    {
        self.clock = Box::new(clock);
        self
    }

    pub fn state(&self) -> IngestState {
        self.state
    }

    pub fn window(&self) -> &RollingWindow {
        &self.window
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    /// Spawn the loop on the current runtime.
    pub fn spawn(self, queue_capacity: usize) -> (IngestHandle, JoinHandle<()>) {
        let (handle, receiver) = IngestHandle::channel(queue_capacity);
        let task = tokio::spawn(self.run(receiver));
        (handle, task)
    }

    /// Process submissions until every producer is gone.
    pub async fn run(mut self, mut receiver: mpsc::Receiver<Submission>) {
        while let Some(submission) = receiver.recv().await {
            // Errors are already reported through the event channel.
            let _ = self.process(submission).await;
        }
        tracing::info!("ingestion loop stopped");
    }

    /// Take one submission through the whole pipeline.
    pub async fn process(&mut self, submission: Submission) -> Result<Reading, IngestError> {
        let Submission { token, origin } = submission;
        self.transition(IngestState::ReadingPending);

        self.transition(IngestState::Validating);
        let reading = match evaluate(&token, (self.clock)()) {
            Ok(reading) => match self.last_timestamp {
                Some(floor) => reading.not_before(floor),
                None => reading,
            },
            Err(error) => {
                tracing::info!(origin = origin.label(), token = %token, %error, "rejected status word");
                self.emit(IngestEvent::Rejected {
                    token,
                    origin,
                    error: error.clone(),
                });
                self.transition(IngestState::Idle);
                return Err(error.into());
            }
        };

        let (reading, advisory) = if reading.is_faulty() {
            let outcome = self.advisory.suggest(&reading.fault_label()).await;
            match &outcome {
                AdvisoryOutcome::Suggested(_) => tracing::debug!("advisory received"),
                AdvisoryOutcome::TimedOut => tracing::warn!(
                    timeout = %format_duration(self.advisory.timeout()),
                    "advisory lookup timed out"
                ),
                AdvisoryOutcome::Failed(e) => tracing::warn!(error = %e, "advisory lookup failed"),
            }
            let kind = outcome.kind();
            (reading.with_advisory(outcome.into_text()), Some(kind))
        } else {
            (reading, None)
        };

        self.transition(IngestState::Persisting);
        if let Err(source) = self.append_with_retry(&reading).await {
            tracing::error!(token = reading.raw_token(), error = %source, "reading not recorded");
            self.emit(IngestEvent::Failed {
                token: reading.raw_token().to_string(),
                error: source.to_string(),
            });
            self.transition(IngestState::Idle);
            return Err(IngestError::Io {
                attempts: self.append_attempts,
                source,
            });
        }
        self.last_timestamp = Some(reading.timestamp());
        self.mirror(&reading);

        if reading.is_faulty() {
            self.transition(IngestState::Notifying);
            self.notifier.notify(&reading);
        }

        self.window.push(reading.clone());
        self.window_tx.send_replace(self.window.snapshot());

        tracing::info!(
            origin = origin.label(),
            token = reading.raw_token(),
            status = %reading.classification(),
            "reading recorded"
        );
        self.emit(IngestEvent::Ingested {
            reading: reading.clone(),
            origin,
            advisory,
        });
        self.transition(IngestState::Idle);
        Ok(reading)
    }

    async fn append_with_retry(&mut self, reading: &Reading) -> Result<(), LogError> {
        let mut attempt = 1;
        loop {
            match self.log.append(reading) {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.append_attempts => {
                    tracing::warn!(attempt, error = %e, "append failed, retrying");
                    attempt += 1;
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn mirror(&mut self, reading: &Reading) {
        let Some(mirror) = self.mirror.as_mut() else {
            return;
        };
        if let Err(e) = mirror.mirror(reading) {
            tracing::warn!(mirror = mirror.description(), error = %e, "mirror update failed");
            let error = e.to_string();
            self.emit(IngestEvent::MirrorFailed { error });
        }
    }

    fn transition(&mut self, next: IngestState) {
        tracing::trace!(from = %self.state, to = %next, "ingest state");
        self.state = next;
    }

    fn emit(&self, event: IngestEvent) {
        // The UI may have gone away; ingestion carries on regardless.
        let _ = self.events.send(event);
    }
}
