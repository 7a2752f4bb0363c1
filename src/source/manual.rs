//! Manual-entry source.
//!
//! Used when no device is configured, or when the configured device could
//! not be opened. It never produces tokens by itself: every reading comes from
//! an operator submission through the ingestion handle.

use super::InputSource;

/// A source standing in for "no live device".
#[derive(Debug)]
pub struct ManualSource {
    description: String,
    reason: Option<String>,
}

impl ManualSource {
    /// Manual entry by choice.
    pub fn new() -> Self {
        Self {
            description: "manual entry".to_string(),
            reason: None,
        }
    }

    /// Manual entry because the device could not be reached.
    ///
    /// The reason stays visible through [`InputSource::error`].
    pub fn fallback(reason: impl Into<String>) -> Self {
        Self {
            description: "manual entry (no device)".to_string(),
            reason: Some(reason.into()),
        }
    }
}

impl Default for ManualSource {
    fn default() -> Self {
        Self::new()
    }
}

impl InputSource for ManualSource {
    fn poll(&mut self) -> Option<String> {
        None
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn error(&self) -> Option<String> {
        self.reason.clone()
    }

    fn is_live(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_source_is_not_live() {
        let mut source = ManualSource::new();
        assert!(!source.is_live());
        assert!(source.poll().is_none());
        assert!(source.error().is_none());
        assert_eq!(source.description(), "manual entry");
    }

    #[test]
    fn test_fallback_keeps_reason() {
        let source = ManualSource::fallback("Failed to open device /dev/ttyUSB0");
        assert_eq!(source.description(), "manual entry (no device)");
        assert!(source.error().unwrap().contains("/dev/ttyUSB0"));
    }
}
