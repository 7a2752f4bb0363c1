//! Error types for the ingestion pipeline.
//!
//! Each concern gets its own enum so the ingestion loop can decide how far a
//! failure is allowed to travel: validation and mirror errors stay local,
//! log errors abort the reading, advisory errors collapse into a fallback.

use std::path::PathBuf;

use thiserror::Error;

/// A raw token that cannot become a reading.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Nothing left after trimming whitespace.
    #[error("empty status word")]
    Empty,

    /// A character outside the `{0,1}` alphabet.
    #[error("invalid character {character:?} at position {position} (expected 0 or 1)")]
    InvalidCharacter { character: char, position: usize },
}

/// Errors from the durable event log.
#[derive(Debug, Error)]
pub enum LogError {
    /// Underlying filesystem failure.
    #[error("event log I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// CSV encoding or decoding failed.
    #[error("event log CSV error on {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// The file exists but was written with a different header row.
    #[error("event log {path} has unexpected header {found:?}")]
    HeaderMismatch { path: PathBuf, found: Vec<String> },

    /// A row that parses as CSV but is not a valid reading.
    #[error("event log {path} row {row} is corrupt: {reason}")]
    Corrupt {
        path: PathBuf,
        row: u64,
        reason: String,
    },

    /// Another writer already holds this log in the current process.
    #[error("event log {0} is already open for writing")]
    AlreadyOpen(PathBuf),
}

/// Errors from the secondary mirror projection.
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("mirror I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("mirror encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Errors that can occur when asking the advisory service for a suggestion.
#[derive(Debug, Error)]
pub enum AdvisoryError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Failed to parse response.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Authentication failed.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Connection failed.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Timeout waiting for response.
    #[error("Request timed out")]
    Timeout,

    /// No advisory backend is configured.
    #[error("Advisory lookup disabled: {0}")]
    Disabled(String),
}

impl From<reqwest::Error> for AdvisoryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AdvisoryError::Timeout
        } else if err.is_connect() {
            AdvisoryError::Connection(err.to_string())
        } else if err.is_decode() {
            AdvisoryError::Parse(err.to_string())
        } else {
            AdvisoryError::Http(err.to_string())
        }
    }
}

/// Why a submission did not become a persisted reading.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The primary store could not be written; the reading was not ingested.
    #[error("reading not recorded after {attempts} attempt(s): {source}")]
    Io {
        attempts: u32,
        #[source]
        source: LogError,
    },
}
