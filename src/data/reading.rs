//! Readings and the status evaluator.
//!
//! A reading is a validated, classified status word. The evaluator is the
//! only way to build one from untrusted input.

use std::fmt;

use chrono::{Local, NaiveDateTime, SubsecRound};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Format used for timestamps in the event log and the UI.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Classification of a status word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Classification {
    Normal,
    Faulty,
}

impl Classification {
    /// Returns a short symbol for display.
    pub fn symbol(&self) -> &'static str {
        match self {
            Classification::Normal => "OK",
            Classification::Faulty => "FAULT",
        }
    }

    /// Literal written to the `Status` column.
    pub fn label(&self) -> &'static str {
        match self {
            Classification::Normal => "Normal",
            Classification::Faulty => "Faulty",
        }
    }

    pub fn is_faulty(&self) -> bool {
        matches!(self, Classification::Faulty)
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One timestamped, classified observation.
///
/// Readings are immutable once built. The only constructors are
/// [`evaluate`] (for fresh input) and the event log decoder, which re-checks
/// every invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reading {
    timestamp: NaiveDateTime,
    raw_token: String,
    classification: Classification,
    advisory: Option<String>,
}

impl Reading {
    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    pub fn raw_token(&self) -> &str {
        &self.raw_token
    }

    pub fn classification(&self) -> Classification {
        self.classification
    }

    pub fn advisory(&self) -> Option<&str> {
        self.advisory.as_deref()
    }

    pub fn is_faulty(&self) -> bool {
        self.classification.is_faulty()
    }

    /// Timestamp rendered in the log format.
    pub fn timestamp_text(&self) -> String {
        self.timestamp.format(TIMESTAMP_FORMAT).to_string()
    }

    /// Zero-based positions of the `1` bits, left to right.
    pub fn fault_bits(&self) -> Vec<usize> {
        self.raw_token
            .char_indices()
            .filter(|(_, c)| *c == '1')
            .map(|(i, _)| i)
            .collect()
    }

    /// Label sent to the advisory service for this reading.
    pub fn fault_label(&self) -> String {
        let bits: Vec<String> = self.fault_bits().iter().map(|b| b.to_string()).collect();
        format!(
            "machine fault detected (status word {}, active bits {})",
            self.raw_token,
            bits.join(",")
        )
    }

    /// Attach the advisory text to a faulty reading.
    ///
    /// Normal readings never carry an advisory, so this is a no-op for them.
    /// Blank text is treated as absent.
    pub fn with_advisory(mut self, advisory: impl Into<String>) -> Self {
        let advisory = advisory.into();
        if self.is_faulty() && !advisory.trim().is_empty() {
            self.advisory = Some(advisory);
        }
        self
    }

    /// Move the timestamp forward so it is not earlier than `floor`.
    pub(crate) fn not_before(mut self, floor: NaiveDateTime) -> Self {
        if self.timestamp < floor {
            self.timestamp = floor;
        }
        self
    }

    /// Rebuild a reading from stored columns, re-validating every invariant.
    pub(crate) fn from_parts(
        timestamp: NaiveDateTime,
        raw_token: &str,
        classification: Classification,
        advisory: Option<String>,
    ) -> Result<Self, String> {
        let reading = evaluate(raw_token, timestamp).map_err(|e| e.to_string())?;
        if reading.classification != classification {
            return Err(format!(
                "status {} does not match status word {}",
                classification, reading.raw_token
            ));
        }
        match advisory {
            Some(text) if !text.is_empty() => {
                if !reading.is_faulty() {
                    return Err("normal reading carries an advisory".to_string());
                }
                Ok(reading.with_advisory(text))
            }
            _ => Ok(reading),
        }
    }
}

/// Validate and classify a raw token.
///
/// The token is trimmed first. It must be non-empty and contain only `0` and
/// `1`; any `1` makes the reading [`Classification::Faulty`].
pub fn evaluate(raw_token: &str, timestamp: NaiveDateTime) -> Result<Reading, ValidationError> {
    let token = raw_token.trim();
    if token.is_empty() {
        return Err(ValidationError::Empty);
    }

    if let Some((position, character)) = token.chars().enumerate().find(|(_, c)| !matches!(c, '0' | '1')) {
        return Err(ValidationError::InvalidCharacter {
            character,
            position,
        });
    }

    let classification = if token.contains('1') {
        Classification::Faulty
    } else {
        Classification::Normal
    };

    Ok(Reading {
        timestamp,
        raw_token: token.to_string(),
        classification,
        advisory: None,
    })
}

/// Current local time truncated to whole seconds, the resolution of the log.
pub fn now() -> NaiveDateTime {
    Local::now().naive_local().trunc_subsecs(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts() -> NaiveDateTime {
        NaiveDateTime::parse_from_str("2024-05-01 12:00:00", TIMESTAMP_FORMAT).unwrap()
    }

    #[test]
    fn test_all_zero_is_normal() {
        let reading = evaluate("0000", ts()).unwrap();
        assert_eq!(reading.classification(), Classification::Normal);
        assert!(reading.advisory().is_none());
        assert!(reading.fault_bits().is_empty());
    }

    #[test]
    fn test_any_one_is_faulty() {
        for token in ["1", "0010", "1000", "1111", "0000000000000001"] {
            let reading = evaluate(token, ts()).unwrap();
            assert_eq!(reading.classification(), Classification::Faulty, "{token}");
        }
    }

    #[test]
    fn test_exhaustive_short_words() {
        // Every binary word up to 6 bits: faulty iff it has a set bit.
        for len in 1..=6u32 {
            for value in 0..(1u32 << len) {
                let token = format!("{:0width$b}", value, width = len as usize);
                let reading = evaluate(&token, ts()).unwrap();
                assert_eq!(reading.is_faulty(), value != 0, "{token}");
            }
        }
    }

    #[test]
    fn test_input_is_trimmed() {
        let reading = evaluate("  0101\r\n", ts()).unwrap();
        assert_eq!(reading.raw_token(), "0101");
    }

    #[test]
    fn test_empty_is_rejected() {
        assert_eq!(evaluate("", ts()), Err(ValidationError::Empty));
        assert_eq!(evaluate("   \n", ts()), Err(ValidationError::Empty));
    }

    #[test]
    fn test_foreign_characters_are_rejected() {
        assert_eq!(
            evaluate("02a", ts()),
            Err(ValidationError::InvalidCharacter {
                character: '2',
                position: 1
            })
        );
        assert!(evaluate("0 1", ts()).is_err());
        assert!(evaluate("0b01", ts()).is_err());
        assert!(evaluate("１", ts()).is_err());
    }

    #[test]
    fn test_fault_bits_and_label() {
        let reading = evaluate("0110", ts()).unwrap();
        assert_eq!(reading.fault_bits(), vec![1, 2]);
        assert_eq!(
            reading.fault_label(),
            "machine fault detected (status word 0110, active bits 1,2)"
        );
    }

    #[test]
    fn test_advisory_only_attaches_to_faults() {
        let normal = evaluate("00", ts()).unwrap().with_advisory("check belts");
        assert!(normal.advisory().is_none());

        let faulty = evaluate("01", ts()).unwrap().with_advisory("check belts");
        assert_eq!(faulty.advisory(), Some("check belts"));

        let blank = evaluate("01", ts()).unwrap().with_advisory("  ");
        assert!(blank.advisory().is_none());
    }

    #[test]
    fn test_from_parts_rejects_inconsistent_rows() {
        assert!(Reading::from_parts(ts(), "0000", Classification::Faulty, None).is_err());
        assert!(Reading::from_parts(ts(), "0000", Classification::Normal, Some("x".into())).is_err());
        assert!(Reading::from_parts(ts(), "0x", Classification::Normal, None).is_err());

        let ok = Reading::from_parts(ts(), "10", Classification::Faulty, Some("fix".into())).unwrap();
        assert_eq!(ok.advisory(), Some("fix"));
    }

    #[test]
    fn test_not_before_clamps_timestamp() {
        let later = ts() + chrono::Duration::seconds(5);
        let reading = evaluate("0", ts()).unwrap().not_before(later);
        assert_eq!(reading.timestamp(), later);

        let reading = evaluate("0", later).unwrap().not_before(ts());
        assert_eq!(reading.timestamp(), later);
    }
}
