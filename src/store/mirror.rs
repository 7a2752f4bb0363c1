//! Best-effort secondary projection of the event log.
//!
//! The mirror keeps a queryable copy of every reading next to the CSV log.
//! It is allowed to fail on its own: the ingestion loop reports a mirror
//! failure and moves on, because the CSV log stays authoritative.

use std::fmt::Debug;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::LogRow;
use crate::data::Reading;
use crate::error::MirrorError;

/// Trait for secondary projections of the event log.
pub trait Mirror: Send + Debug {
    /// Duplicate one reading into the projection.
    fn mirror(&mut self, reading: &Reading) -> Result<(), MirrorError>;

    /// Returns a human-readable description of the projection.
    fn description(&self) -> &str;
}

/// Mirror that appends one JSON object per line.
///
/// Each reading costs one append, instead of rewriting a whole spreadsheet
/// on every event.
#[derive(Debug)]
pub struct JsonLinesMirror {
    path: PathBuf,
    description: String,
}

impl JsonLinesMirror {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let description = format!("jsonl: {}", path.display());
        Self { path, description }
    }

    /// Returns the path being written.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Mirror for JsonLinesMirror {
    fn mirror(&mut self, reading: &Reading) -> Result<(), MirrorError> {
        let mut line = serde_json::to_vec(&LogRow::from(reading))?;
        line.push(b'\n');

        let io_error = |source| MirrorError::Io {
            path: self.path.clone(),
            source,
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(io_error)?;
        file.write_all(&line).map_err(io_error)
    }

    fn description(&self) -> &str {
        &self.description
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{evaluate, TIMESTAMP_FORMAT};
    use chrono::NaiveDateTime;
    use tempfile::TempDir;

    fn reading(token: &str) -> Reading {
        let ts = NaiveDateTime::parse_from_str("2024-05-01 11:00:00", TIMESTAMP_FORMAT).unwrap();
        evaluate(token, ts).unwrap()
    }

    #[test]
    fn test_mirror_appends_lines() {
        let dir = TempDir::new().unwrap();
        let mut mirror = JsonLinesMirror::new(dir.path().join("machine_status.jsonl"));

        mirror.mirror(&reading("0000")).unwrap();
        mirror.mirror(&reading("0100").with_advisory("Check sensor 1")).unwrap();

        let content = std::fs::read_to_string(mirror.path()).unwrap();
        let rows: Vec<LogRow> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].advisory, "Check sensor 1");
        assert_eq!(rows[1].clone().into_reading().unwrap().raw_token(), "0100");
    }

    #[test]
    fn test_mirror_failure_is_an_error_value() {
        let dir = TempDir::new().unwrap();
        // A directory cannot be opened for appending.
        let mut mirror = JsonLinesMirror::new(dir.path());
        assert!(matches!(mirror.mirror(&reading("1")), Err(MirrorError::Io { .. })));
        assert!(mirror.description().starts_with("jsonl: "));
    }
}
