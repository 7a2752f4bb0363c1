//! Layered settings.
//!
//! Sources, lowest priority first: built-in defaults, an optional TOML file,
//! then `FAULTWATCH_*` environment variables (`__` separates nested keys, e.g.
//! `FAULTWATCH_ADVISORY__MODEL`). Command-line flags are applied on top by
//! the binary.
//!
//! ```toml
//! log_path = "machine_status.csv"
//! poll_interval = "1s"
//!
//! [advisory]
//! model = "gpt-4"
//! timeout = "5s"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::data::duration::parse_duration;
use crate::data::DEFAULT_WINDOW_SIZE;

/// Config file picked up from the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "faultwatch.toml";

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// CSV event log.
    pub log_path: PathBuf,
    /// JSON Lines mirror; an empty path disables it.
    pub mirror_path: PathBuf,
    pub window_size: usize,
    /// Device poll period, e.g. "1s".
    pub poll_interval: String,
    pub queue_capacity: usize,
    pub append_attempts: u32,
    /// Ring the terminal bell on faults.
    pub bell: bool,
    /// Trace output file used while the TUI owns the terminal.
    pub trace_path: PathBuf,
    pub advisory: AdvisorySettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_path: PathBuf::from("machine_status.csv"),
            mirror_path: PathBuf::from("machine_status.jsonl"),
            window_size: DEFAULT_WINDOW_SIZE,
            poll_interval: "1s".to_string(),
            queue_capacity: 64,
            append_attempts: 3,
            bell: true,
            trace_path: PathBuf::from("faultwatch.log"),
            advisory: AdvisorySettings::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct AdvisorySettings {
    pub endpoint: String,
    pub model: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub timeout: String,
}

impl Default for AdvisorySettings {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout: "5s".to_string(),
        }
    }
}

impl AdvisorySettings {
    pub fn timeout(&self) -> Result<Duration> {
        parse_duration(&self.timeout).context("invalid advisory.timeout")
    }
}

impl Settings {
    /// Load settings from `path` (required if given) or from
    /// [`DEFAULT_CONFIG_FILE`] if it exists, plus the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::from(Path::new(DEFAULT_CONFIG_FILE)).required(false),
        };

        let config = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix("FAULTWATCH")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to load configuration")?;

        let settings: Settings = config
            .try_deserialize()
            .context("Invalid configuration")?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check the values that are stored as strings.
    pub fn validate(&self) -> Result<()> {
        self.poll_interval()?;
        self.advisory.timeout()?;
        Ok(())
    }

    pub fn poll_interval(&self) -> Result<Duration> {
        let period = parse_duration(&self.poll_interval).context("invalid poll_interval")?;
        anyhow::ensure!(!period.is_zero(), "poll_interval must be greater than zero");
        Ok(period)
    }

    /// Mirror path, or `None` when mirroring is switched off.
    pub fn mirror_path(&self) -> Option<&Path> {
        (!self.mirror_path.as_os_str().is_empty()).then_some(self.mirror_path.as_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.window_size, 20);
        assert_eq!(settings.poll_interval().unwrap(), Duration::from_secs(1));
        assert_eq!(settings.advisory.timeout().unwrap(), Duration::from_secs(5));
        assert_eq!(settings.mirror_path(), Some(Path::new("machine_status.jsonl")));
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
log_path = "/var/lib/faultwatch/status.csv"
mirror_path = ""
poll_interval = "250ms"
bell = false

[advisory]
model = "gpt-4o-mini"
"#
        )
        .unwrap();

        let settings = Settings::load(Some(file.path())).unwrap();
        assert_eq!(settings.log_path, PathBuf::from("/var/lib/faultwatch/status.csv"));
        assert_eq!(settings.mirror_path(), None);
        assert_eq!(settings.poll_interval().unwrap(), Duration::from_millis(250));
        assert!(!settings.bell);
        assert_eq!(settings.advisory.model, "gpt-4o-mini");
        // Untouched keys keep their defaults.
        assert_eq!(settings.window_size, 20);
        assert_eq!(settings.advisory.api_key_env, "OPENAI_API_KEY");
    }

    #[test]
    fn test_bad_duration_is_rejected() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, r#"poll_interval = "often""#).unwrap();
        assert!(Settings::load(Some(file.path())).is_err());
    }

    #[test]
    fn test_zero_poll_interval_is_rejected() {
        let settings = Settings {
            poll_interval: "0s".to_string(),
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().with_extension("toml");
        assert!(Settings::load(Some(&path)).is_err());
    }
}
