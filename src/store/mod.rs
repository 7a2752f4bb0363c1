//! Durable, append-only event log.
//!
//! The log is a CSV file with the header `Timestamp,Raw Token,Status,Advisory`
//! followed by one row per reading in arrival order. It is the single source
//! of truth: the rolling window and the mirror are both derived from it.
//!
//! Only one [`EventLog`] writer may exist per file in a process. Appends take
//! `&mut self`, so the ingestion loop that owns the writer is the only code
//! path that can grow the file.

mod export;
mod mirror;

pub use export::{export, load_export, ExportFormat, ExportSummary};
pub use mirror::{JsonLinesMirror, Mirror};

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::data::{Classification, Reading, TIMESTAMP_FORMAT};
use crate::error::LogError;

/// Column names of the event log, in order.
pub const HEADER: [&str; 4] = ["Timestamp", "Raw Token", "Status", "Advisory"];

/// Paths currently held by an `EventLog` writer in this process.
static OPEN_WRITERS: LazyLock<Mutex<HashSet<PathBuf>>> =
    LazyLock::new(|| Mutex::new(HashSet::new()));

/// One row of the log, shared by the CSV log, the JSON export and the mirror.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRow {
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "Raw Token")]
    pub raw_token: String,
    #[serde(rename = "Status")]
    pub status: Classification,
    #[serde(rename = "Advisory")]
    pub advisory: String,
}

impl From<&Reading> for LogRow {
    fn from(reading: &Reading) -> Self {
        Self {
            timestamp: reading.timestamp_text(),
            raw_token: reading.raw_token().to_string(),
            status: reading.classification(),
            advisory: reading.advisory().unwrap_or_default().to_string(),
        }
    }
}

impl LogRow {
    /// Convert back into a reading, checking every reading invariant.
    pub fn into_reading(self) -> Result<Reading, String> {
        let timestamp = NaiveDateTime::parse_from_str(&self.timestamp, TIMESTAMP_FORMAT)
            .map_err(|e| format!("bad timestamp {:?}: {}", self.timestamp, e))?;
        let advisory = (!self.advisory.is_empty()).then_some(self.advisory);
        Reading::from_parts(timestamp, &self.raw_token, self.status, advisory)
    }
}

/// Writer handle for the durable event log.
#[derive(Debug)]
pub struct EventLog {
    path: PathBuf,
    claim: PathBuf,
}

impl EventLog {
    /// Claim the writer slot for `path`.
    ///
    /// Fails with [`LogError::AlreadyOpen`] if another `EventLog` in this
    /// process already writes to the same file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, LogError> {
        let path = path.as_ref().to_path_buf();
        let claim = writer_key(&path);

        let mut writers = OPEN_WRITERS.lock().unwrap_or_else(|e| e.into_inner());
        if !writers.insert(claim.clone()) {
            return Err(LogError::AlreadyOpen(path));
        }

        Ok(Self { path, claim })
    }

    /// Returns the path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the log with its header if it does not exist yet.
    ///
    /// Never truncates an existing file. A zero-length file gets the header;
    /// a file with any other header is rejected. A last row cut off before
    /// its newline is terminated so the next append starts a fresh row.
    pub fn ensure_initialized(&mut self) -> Result<(), LogError> {
        match OpenOptions::new().write(true).create_new(true).open(&self.path) {
            Ok(mut file) => {
                tracing::info!(path = %self.path.display(), "creating event log");
                self.write_header(&mut file)
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                let len = fs::metadata(&self.path).map_err(|e| self.io_error(e))?.len();
                if len == 0 {
                    let mut file = OpenOptions::new()
                        .append(true)
                        .open(&self.path)
                        .map_err(|e| self.io_error(e))?;
                    return self.write_header(&mut file);
                }
                self.check_header()?;
                self.terminate_last_row()
            }
            Err(e) => Err(self.io_error(e)),
        }
    }

    /// Append one reading as a single write, then sync it to disk.
    ///
    /// The row always starts on a fresh line. If the write or the sync
    /// fails, the file is cut back to its previous length so a retry never
    /// lands after a partial row.
    pub fn append(&mut self, reading: &Reading) -> Result<(), LogError> {
        let mut bytes = encode_rows(std::slice::from_ref(reading), false).map_err(|e| self.csv_error(e))?;

        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_error(e))?;
        let len = file.metadata().map_err(|e| self.io_error(e))?.len();
        if !ends_with_newline(&mut file, len).map_err(|e| self.io_error(e))? {
            tracing::warn!(path = %self.path.display(), "event log ends mid-row, starting a new line");
            bytes.insert(0, b'\n');
        }

        write_or_rollback(&mut file, len, |file| {
            file.write_all(&bytes)?;
            file.sync_data()
        })
        .map_err(|e| self.io_error(e))
    }

    /// Every reading in the log, in file order.
    pub fn read_all(&self) -> Result<Vec<Reading>, LogError> {
        read_all(&self.path)
    }

    /// The last `count` readings in the log, oldest first.
    pub fn tail(&self, count: usize) -> Result<Vec<Reading>, LogError> {
        let mut readings = self.read_all()?;
        let skip = readings.len().saturating_sub(count);
        Ok(readings.split_off(skip))
    }

    /// Like [`tail`](Self::tail), but rows that do not decode are skipped
    /// instead of failing the read. Returns the readings and the skipped row
    /// numbers (row 1 is the header).
    pub fn tail_skipping_corrupt(&self, count: usize) -> Result<(Vec<Reading>, Vec<u64>), LogError> {
        let file = File::open(&self.path).map_err(|e| self.io_error(e))?;
        let mut skipped = Vec::new();
        let mut readings = decode_rows(file, &self.path, |error| match error {
            LogError::Corrupt { row, .. } => {
                skipped.push(row);
                Ok(())
            }
            other => Err(other),
        })?;
        let skip = readings.len().saturating_sub(count);
        Ok((readings.split_off(skip), skipped))
    }

    fn write_header(&self, file: &mut File) -> Result<(), LogError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(HEADER).map_err(|e| self.csv_error(e))?;
        let bytes = writer
            .into_inner()
            .map_err(|e| self.io_error(e.into_error()))?;
        file.write_all(&bytes).map_err(|e| self.io_error(e))?;
        file.sync_data().map_err(|e| self.io_error(e))
    }

    fn terminate_last_row(&self) -> Result<(), LogError> {
        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_error(e))?;
        let len = file.metadata().map_err(|e| self.io_error(e))?.len();
        if ends_with_newline(&mut file, len).map_err(|e| self.io_error(e))? {
            return Ok(());
        }

        tracing::warn!(path = %self.path.display(), "event log ends mid-row, terminating it");
        write_or_rollback(&mut file, len, |file| {
            file.write_all(b"\n")?;
            file.sync_data()
        })
        .map_err(|e| self.io_error(e))
    }

    fn check_header(&self) -> Result<(), LogError> {
        let file = File::open(&self.path).map_err(|e| self.io_error(e))?;
        let mut reader = csv::Reader::from_reader(file);
        let headers = reader.headers().map_err(|e| self.csv_error(e))?;
        verify_header(&self.path, headers)
    }

    fn io_error(&self, source: io::Error) -> LogError {
        LogError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn csv_error(&self, source: csv::Error) -> LogError {
        LogError::Csv {
            path: self.path.clone(),
            source,
        }
    }
}

impl Drop for EventLog {
    fn drop(&mut self) {
        let mut writers = OPEN_WRITERS.lock().unwrap_or_else(|e| e.into_inner());
        writers.remove(&self.claim);
    }
}

/// Read every reading from the log at `path` without claiming the writer.
pub fn read_all(path: &Path) -> Result<Vec<Reading>, LogError> {
    let file = File::open(path).map_err(|source| LogError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    decode_log(file, path)
}

/// Decode a complete log (header plus rows) from any reader.
pub(crate) fn decode_log<R: Read>(input: R, path: &Path) -> Result<Vec<Reading>, LogError> {
    decode_rows(input, path, Err)
}

/// Decode a log, handing each undecodable row to `on_corrupt`. Returning
/// `Ok` skips the row; returning the error stops the read.
fn decode_rows<R, F>(input: R, path: &Path, mut on_corrupt: F) -> Result<Vec<Reading>, LogError>
where
    R: Read,
    F: FnMut(LogError) -> Result<(), LogError>,
{
    let mut reader = csv::Reader::from_reader(input);
    let headers = reader.headers().map_err(|source| LogError::Csv {
        path: path.to_path_buf(),
        source,
    })?;
    verify_header(path, headers)?;

    let mut readings = Vec::new();
    for (index, row) in reader.deserialize::<LogRow>().enumerate() {
        // Row 1 is the header.
        let row_number = index as u64 + 2;
        let row = match row {
            Ok(row) => row,
            Err(source) if source.is_io_error() => {
                return Err(LogError::Csv {
                    path: path.to_path_buf(),
                    source,
                })
            }
            Err(source) => {
                on_corrupt(LogError::Corrupt {
                    path: path.to_path_buf(),
                    row: row_number,
                    reason: source.to_string(),
                })?;
                continue;
            }
        };
        match row.into_reading() {
            Ok(reading) => readings.push(reading),
            Err(reason) => on_corrupt(LogError::Corrupt {
                path: path.to_path_buf(),
                row: row_number,
                reason,
            })?,
        }
    }

    Ok(readings)
}

/// Encode readings as CSV rows, optionally preceded by the header.
pub(crate) fn encode_rows(readings: &[Reading], with_header: bool) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(with_header)
        .from_writer(Vec::new());
    for reading in readings {
        writer.serialize(LogRow::from(reading))?;
    }
    writer.into_inner().map_err(|e| csv::Error::from(e.into_error()))
}

/// Key for the writer registry. Resolves `..` and symlinks where the path
/// (or, before the file exists, its directory) can be canonicalized.
fn writer_key(path: &Path) -> PathBuf {
    if let Ok(canonical) = fs::canonicalize(path) {
        return canonical;
    }
    let dir = match path.parent() {
        Some(dir) if dir != Path::new("") => dir,
        _ => Path::new("."),
    };
    match (fs::canonicalize(dir), path.file_name()) {
        (Ok(dir), Some(name)) => dir.join(name),
        _ => std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf()),
    }
}

fn ends_with_newline(file: &mut File, len: u64) -> io::Result<bool> {
    if len == 0 {
        return Ok(true);
    }
    let mut last = [0u8; 1];
    file.seek(SeekFrom::Start(len - 1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

/// Run `write` against `file`, cutting it back to `len` if the write fails.
fn write_or_rollback<F>(file: &mut File, len: u64, write: F) -> io::Result<()>
where
    F: FnOnce(&mut File) -> io::Result<()>,
{
    let result = write(&mut *file);
    if result.is_err() {
        if let Err(e) = file.set_len(len).and_then(|()| file.sync_data()) {
            tracing::error!(error = %e, "could not roll back a partial event log write");
        }
    }
    result
}

fn verify_header(path: &Path, headers: &csv::StringRecord) -> Result<(), LogError> {
    if headers.iter().eq(HEADER.iter().copied()) {
        Ok(())
    } else {
        Err(LogError::HeaderMismatch {
            path: path.to_path_buf(),
            found: headers.iter().map(str::to_string).collect(),
        })
    }
}
