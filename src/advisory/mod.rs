//! Best-effort remediation advice for faulty readings.
//!
//! The advisory service is untrusted and unreliable. Every lookup goes
//! through [`AdvisoryClient::suggest`], which bounds it with a timeout and
//! returns a typed [`AdvisoryOutcome`]. Only when the reading is assembled is
//! the outcome collapsed to text, so logs can still tell a timeout from an
//! auth failure while the operator sees one uniform fallback.

mod http;

pub use http::{HttpAdvisor, HttpAdvisorBuilder};

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::AdvisorySettings;
use crate::error::AdvisoryError;

/// Text stored in place of a suggestion when the lookup fails.
pub const FALLBACK_ADVISORY: &str = "advisory unavailable";

/// Default bound on a single lookup.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// A backend that can turn a fault label into a short suggestion.
#[async_trait]
pub trait Advisor: Send + Sync + Debug {
    async fn lookup(&self, fault_label: &str) -> Result<String, AdvisoryError>;

    fn description(&self) -> &str;
}

/// Advisor used when no backend is configured. Fails immediately.
#[derive(Debug, Clone)]
pub struct DisabledAdvisor {
    reason: String,
}

impl DisabledAdvisor {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Advisor for DisabledAdvisor {
    async fn lookup(&self, _fault_label: &str) -> Result<String, AdvisoryError> {
        Err(AdvisoryError::Disabled(self.reason.clone()))
    }

    fn description(&self) -> &str {
        "disabled"
    }
}

/// Result of one bounded lookup.
#[derive(Debug)]
pub enum AdvisoryOutcome {
    Suggested(String),
    TimedOut,
    Failed(AdvisoryError),
}

impl AdvisoryOutcome {
    /// Short tag for logs and events.
    pub fn kind(&self) -> &'static str {
        match self {
            AdvisoryOutcome::Suggested(_) => "suggested",
            AdvisoryOutcome::TimedOut => "timed_out",
            AdvisoryOutcome::Failed(_) => "failed",
        }
    }

    /// The suggestion, or [`FALLBACK_ADVISORY`].
    pub fn into_text(self) -> String {
        match self {
            AdvisoryOutcome::Suggested(text) => text,
            AdvisoryOutcome::TimedOut | AdvisoryOutcome::Failed(_) => FALLBACK_ADVISORY.to_string(),
        }
    }
}

/// Time-bounded front for an [`Advisor`].
///
/// Stateless: identical faults are looked up again every time.
#[derive(Debug, Clone)]
pub struct AdvisoryClient {
    advisor: Arc<dyn Advisor>,
    timeout: Duration,
}

impl AdvisoryClient {
    pub fn new(advisor: Arc<dyn Advisor>, timeout: Duration) -> Self {
        Self { advisor, timeout }
    }

    /// A client that always falls back.
    pub fn disabled(reason: impl Into<String>) -> Self {
        Self::new(Arc::new(DisabledAdvisor::new(reason)), DEFAULT_TIMEOUT)
    }

    /// Build the HTTP client from settings, or a disabled one if the API key
    /// environment variable is unset.
    pub fn from_settings(settings: &AdvisorySettings) -> anyhow::Result<Self> {
        let timeout = settings.timeout()?;
        let api_key = match std::env::var(&settings.api_key_env) {
            Ok(key) if !key.trim().is_empty() => key,
            _ => {
                tracing::info!(
                    env = %settings.api_key_env,
                    "no advisory API key configured, suggestions disabled"
                );
                return Ok(Self::disabled(format!("{} not set", settings.api_key_env)));
            }
        };

        let advisor = HttpAdvisor::builder()
            .endpoint(&settings.endpoint)
            .model(&settings.model)
            .api_key(api_key)
            .timeout(timeout)
            .build()?;
        Ok(Self::new(Arc::new(advisor), timeout))
    }

    pub fn description(&self) -> &str {
        self.advisor.description()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Ask for a suggestion. Always returns within the configured timeout.
    pub async fn suggest(&self, fault_label: &str) -> AdvisoryOutcome {
        match tokio::time::timeout(self.timeout, self.advisor.lookup(fault_label)).await {
            Ok(Ok(text)) => {
                let text = text.trim();
                if text.is_empty() {
                    AdvisoryOutcome::Failed(AdvisoryError::Parse("empty suggestion".to_string()))
                } else {
                    AdvisoryOutcome::Suggested(text.to_string())
                }
            }
            Ok(Err(AdvisoryError::Timeout)) | Err(_) => AdvisoryOutcome::TimedOut,
            Ok(Err(e)) => AdvisoryOutcome::Failed(e),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Advisor with a canned answer and an optional delay.
    #[derive(Debug)]
    pub(crate) struct FixedAdvisor {
        pub answer: Result<String, String>,
        pub delay: Duration,
    }

    #[async_trait]
    impl Advisor for FixedAdvisor {
        async fn lookup(&self, _fault_label: &str) -> Result<String, AdvisoryError> {
            tokio::time::sleep(self.delay).await;
            self.answer.clone().map_err(AdvisoryError::Http)
        }

        fn description(&self) -> &str {
            "fixed"
        }
    }

    pub(crate) fn client(answer: Result<&str, &str>, delay: Duration) -> AdvisoryClient {
        let advisor = FixedAdvisor {
            answer: answer.map(str::to_string).map_err(str::to_string),
            delay,
        };
        AdvisoryClient::new(Arc::new(advisor), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_suggestion_is_returned() {
        let outcome = client(Ok("  Replace the fuse.\n"), Duration::ZERO).suggest("fault").await;
        assert_eq!(outcome.kind(), "suggested");
        assert_eq!(outcome.into_text(), "Replace the fuse.");
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_advisor_times_out() {
        let outcome = client(Ok("too late"), Duration::from_secs(60)).suggest("fault").await;
        assert!(matches!(outcome, AdvisoryOutcome::TimedOut));
        assert_eq!(outcome.into_text(), FALLBACK_ADVISORY);
    }

    #[tokio::test]
    async fn test_failure_falls_back() {
        let outcome = client(Err("500"), Duration::ZERO).suggest("fault").await;
        assert!(matches!(outcome, AdvisoryOutcome::Failed(AdvisoryError::Http(_))));
        assert_eq!(outcome.into_text(), FALLBACK_ADVISORY);
    }

    #[tokio::test]
    async fn test_empty_answer_is_a_failure() {
        let outcome = client(Ok("   "), Duration::ZERO).suggest("fault").await;
        assert_eq!(outcome.kind(), "failed");
    }

    #[tokio::test]
    async fn test_disabled_client_falls_back() {
        let client = AdvisoryClient::disabled("OPENAI_API_KEY not set");
        let outcome = client.suggest("fault").await;
        assert!(matches!(outcome, AdvisoryOutcome::Failed(AdvisoryError::Disabled(_))));
        assert_eq!(client.description(), "disabled");
    }
}
