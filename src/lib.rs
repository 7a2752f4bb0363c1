//! # faultwatch
//!
//! A terminal monitor and library for binary machine status words.
//!
//! Each status word (e.g. `"0010"`) is validated and classified as Normal or
//! Faulty, appended to a durable CSV event log, mirrored best-effort to a JSON
//! Lines file, and kept in a rolling window of the most recent readings for
//! display. Faulty readings get a time-bounded remediation advisory and
//! trigger an alert.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   bounded    ┌──────────────────────────────────────────┐
//! │ device poller│──┐  queue    │ Ingestor (single writer)                 │
//! └──────────────┘  ├─────────▶ │  evaluate ─▶ advisory ─▶ EventLog.append │
//! ┌──────────────┐  │           │            (faulty only)  ─▶ mirror      │
//! │ manual entry │──┘           │  ─▶ notifier (faulty) ─▶ RollingWindow   │
//! └──────────────┘              └────────────────┬─────────────────────────┘
//!                                                │ watch + events
//!                                                ▼
//!                                          app / ui (TUI)
//! ```
//!
//! - **[`data`]**: Readings, the status evaluator and the rolling window
//! - **[`store`]**: The append-only CSV [`EventLog`], the JSON Lines mirror and export
//! - **[`source`]**: Input sources ([`InputSource`] trait): device channel or manual entry
//! - **[`advisory`]**: Time-bounded advisory lookups with a fixed fallback
//! - **[`alert`]**: Terminal bell and alert banner feed
//! - **[`ingest`]**: The ingestion loop and device poller
//! - **[`app`]**, **[`events`]**, **[`ui`]**: The interactive front end
//!
//! ## Usage
//!
//! ### As a CLI tool
//!
//! ```bash
//! # Interactive, manual entry only
//! faultwatch
//!
//! # Read status words from a serial device, one per line
//! faultwatch --device /dev/ttyUSB0
//!
//! # Record one reading and exit
//! faultwatch --submit 0010
//!
//! # Export the log
//! faultwatch --export readings.xlsx
//! ```
//!
//! ### Classifying a status word
//!
//! ```
//! use faultwatch::{evaluate, Classification};
//! use faultwatch::data::reading::now;
//!
//! let reading = evaluate("0010", now()).unwrap();
//! assert_eq!(reading.classification(), Classification::Faulty);
//! assert_eq!(reading.fault_bits(), vec![2]);
//!
//! assert!(evaluate("02a", now()).is_err());
//! ```
//!
//! ### Running the pipeline
//!
//! ```no_run
//! use faultwatch::{AdvisoryClient, AlertNotifier, EventLog, Ingestor, Origin};
//!
//! # tokio_test::block_on(async {
//! let log = EventLog::open("machine_status.csv").unwrap();
//! let (notifier, _alerts) = AlertNotifier::new(true);
//! let advisory = AdvisoryClient::disabled("offline");
//! let (ingestor, mut feeds) = Ingestor::new(log, advisory, Box::new(notifier), 20).unwrap();
//!
//! let (handle, task) = ingestor.spawn(64);
//! handle.submit("0010", Origin::Manual).await.unwrap();
//! println!("{:?}", feeds.events.recv().await);
//!
//! drop(handle);
//! task.await.unwrap();
//! # });
//! ```

pub mod advisory;
pub mod alert;
pub mod app;
pub mod config;
pub mod data;
pub mod error;
pub mod events;
pub mod ingest;
pub mod logging;
pub mod source;
pub mod store;
pub mod ui;

// Re-export main types for convenience
pub use advisory::{AdvisoryClient, AdvisoryOutcome, FALLBACK_ADVISORY};
pub use alert::{Alert, AlertNotifier, Notifier};
pub use app::App;
pub use config::Settings;
pub use data::{evaluate, Classification, Reading, RollingWindow};
pub use error::{AdvisoryError, IngestError, LogError, MirrorError, ValidationError};
pub use ingest::{IngestEvent, IngestHandle, Ingestor, Origin};
pub use source::{DeviceSource, InputSource, ManualSource};
pub use store::{EventLog, JsonLinesMirror, Mirror};
