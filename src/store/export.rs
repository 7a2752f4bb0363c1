//! Export of the event log to a user-chosen destination.
//!
//! Three renderings are supported, chosen by the destination's extension:
//! a verbatim copy of the CSV log, a JSON array of row objects using the
//! same column names, or an Excel workbook with one sheet of rows. The source
//! log is only ever read.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use rust_xlsxwriter::{Format, Workbook};

use super::{decode_log, LogRow, HEADER};
use crate::data::Reading;

/// Output format of an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Byte-for-byte copy of the CSV log.
    Csv,
    /// Pretty-printed JSON array of rows.
    Json,
    /// Excel workbook, header row in bold. Write-only.
    Xlsx,
}

impl ExportFormat {
    /// Pick the format from a file extension (`.csv`, `.json` or `.xlsx`).
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("csv") => Ok(ExportFormat::Csv),
            Some("json") => Ok(ExportFormat::Json),
            Some("xlsx") => Ok(ExportFormat::Xlsx),
            _ => bail!(
                "Unsupported export destination {} (use .csv, .json or .xlsx)",
                path.display()
            ),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "CSV",
            ExportFormat::Json => "JSON",
            ExportFormat::Xlsx => "Excel",
        }
    }

    /// File extension without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
            ExportFormat::Xlsx => "xlsx",
        }
    }
}

/// Result of a successful export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub format: ExportFormat,
    pub rows: usize,
}

/// Export the log at `log_path` to `dest`.
///
/// The log is read once into memory; both the row count and the written
/// output come from that single read, so a concurrent append cannot make the
/// export disagree with itself.
pub fn export(log_path: &Path, dest: &Path) -> Result<ExportSummary> {
    let format = ExportFormat::from_path(dest)?;

    if same_file(log_path, dest) {
        bail!("Refusing to export the log onto itself: {}", dest.display());
    }

    let bytes = fs::read(log_path)
        .with_context(|| format!("Failed to read event log {}", log_path.display()))?;
    let readings = decode_log(bytes.as_slice(), log_path)?;

    match format {
        ExportFormat::Csv => fs::write(dest, &bytes)
            .with_context(|| format!("Failed to write export {}", dest.display())),
        ExportFormat::Json => {
            let rows: Vec<LogRow> = readings.iter().map(LogRow::from).collect();
            fs::write(dest, serde_json::to_vec_pretty(&rows)?)
                .with_context(|| format!("Failed to write export {}", dest.display()))
        }
        ExportFormat::Xlsx => write_workbook(&readings, dest),
    }?;

    tracing::info!(
        dest = %dest.display(),
        format = format.label(),
        rows = readings.len(),
        "exported event log"
    );

    Ok(ExportSummary {
        format,
        rows: readings.len(),
    })
}

/// Read a CSV or JSON export back into readings.
pub fn load_export(path: &Path) -> Result<Vec<Reading>> {
    match ExportFormat::from_path(path)? {
        ExportFormat::Xlsx => bail!("Cannot load {}: Excel exports are write-only", path.display()),
        ExportFormat::Csv => Ok(super::read_all(path)?),
        ExportFormat::Json => {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read export {}", path.display()))?;
            let rows: Vec<LogRow> = serde_json::from_str(&content)?;
            rows.into_iter()
                .enumerate()
                .map(|(i, row)| {
                    row.into_reading()
                        .map_err(|reason| anyhow::anyhow!("Export row {} is invalid: {}", i + 1, reason))
                })
                .collect()
        }
    }
}

fn write_workbook(readings: &[Reading], dest: &Path) -> Result<()> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Readings")?;

    let bold = Format::new().set_bold();
    for (col, name) in (0u16..).zip(HEADER) {
        sheet.write_string_with_format(0, col, name, &bold)?;
    }
    for (row, reading) in (1u32..).zip(readings) {
        let row_data = LogRow::from(reading);
        sheet.write_string(row, 0, row_data.timestamp)?;
        sheet.write_string(row, 1, row_data.raw_token)?;
        sheet.write_string(row, 2, row_data.status.label())?;
        sheet.write_string(row, 3, row_data.advisory)?;
    }
    sheet.set_column_width(0, 20)?;
    sheet.set_column_width(3, 60)?;

    workbook
        .save(dest)
        .with_context(|| format!("Failed to write export {}", dest.display()))
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{evaluate, TIMESTAMP_FORMAT};
    use crate::store::EventLog;
    use chrono::NaiveDateTime;
    use tempfile::TempDir;

    fn populated(dir: &TempDir) -> EventLog {
        let base = NaiveDateTime::parse_from_str("2024-05-01 10:00:00", TIMESTAMP_FORMAT).unwrap();
        let mut log = EventLog::open(dir.path().join("machine_status.csv")).unwrap();
        log.ensure_initialized().unwrap();
        for (i, token) in ["0000", "0010", "0000", "1001"].iter().enumerate() {
            let reading = evaluate(token, base + chrono::Duration::seconds(i as i64))
                .unwrap()
                .with_advisory("advisory unavailable");
            log.append(&reading).unwrap();
        }
        log
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ExportFormat::from_path(Path::new("a.csv")).unwrap(), ExportFormat::Csv);
        assert_eq!(ExportFormat::from_path(Path::new("a.JSON")).unwrap(), ExportFormat::Json);
        assert_eq!(ExportFormat::from_path(Path::new("a.xlsx")).unwrap(), ExportFormat::Xlsx);
        assert!(ExportFormat::from_path(Path::new("a.xls")).is_err());
        assert!(ExportFormat::from_path(Path::new("noext")).is_err());
    }

    #[test]
    fn test_csv_export_is_verbatim_and_round_trips() {
        let dir = TempDir::new().unwrap();
        let log = populated(&dir);
        let original = fs::read(log.path()).unwrap();
        let dest = dir.path().join("out.csv");

        let summary = export(log.path(), &dest).unwrap();
        assert_eq!(summary, ExportSummary { format: ExportFormat::Csv, rows: 4 });
        assert_eq!(fs::read(&dest).unwrap(), original);
        assert_eq!(fs::read(log.path()).unwrap(), original);
        assert_eq!(load_export(&dest).unwrap(), log.read_all().unwrap());
    }

    #[test]
    fn test_json_export_round_trips() {
        let dir = TempDir::new().unwrap();
        let log = populated(&dir);
        let dest = dir.path().join("out.json");

        let summary = export(log.path(), &dest).unwrap();
        assert_eq!(summary.rows, 4);

        let json: serde_json::Value = serde_json::from_slice(&fs::read(&dest).unwrap()).unwrap();
        assert_eq!(json[1]["Status"], "Faulty");
        assert_eq!(json[0]["Advisory"], "");
        assert_eq!(load_export(&dest).unwrap(), log.read_all().unwrap());
    }

    #[test]
    fn test_xlsx_export_writes_workbook() {
        let dir = TempDir::new().unwrap();
        let log = populated(&dir);
        let before = fs::read(log.path()).unwrap();
        let dest = dir.path().join("out.xlsx");

        let summary = export(log.path(), &dest).unwrap();
        assert_eq!(summary, ExportSummary { format: ExportFormat::Xlsx, rows: 4 });
        // Workbooks are zip archives.
        assert!(fs::read(&dest).unwrap().starts_with(b"PK"));
        assert_eq!(fs::read(log.path()).unwrap(), before);
        assert!(load_export(&dest).is_err());
    }

    #[test]
    fn test_export_onto_log_is_refused() {
        let dir = TempDir::new().unwrap();
        let log = populated(&dir);
        let before = fs::read(log.path()).unwrap();

        assert!(export(log.path(), log.path()).is_err());
        assert_eq!(fs::read(log.path()).unwrap(), before);
    }

    #[test]
    fn test_export_missing_log_fails() {
        let dir = TempDir::new().unwrap();
        assert!(export(&dir.path().join("nope.csv"), &dir.path().join("out.csv")).is_err());
    }
}
