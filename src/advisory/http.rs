//! Advisory backend speaking the OpenAI-compatible chat completions API.
//!
//! ## Example
//!
//! ```rust,no_run
//! use faultwatch::advisory::{Advisor, HttpAdvisor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let advisor = HttpAdvisor::builder()
//!         .endpoint("https://api.openai.com/v1/chat/completions")
//!         .api_key(std::env::var("OPENAI_API_KEY")?)
//!         .build()?;
//!
//!     let suggestion = advisor.lookup("machine fault detected").await?;
//!     println!("{}", suggestion);
//!     Ok(())
//! }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{Advisor, DEFAULT_TIMEOUT};
use crate::error::AdvisoryError;

const SYSTEM_PROMPT: &str =
    "You are a maintenance assistant. Reply with one short remediation for the reported machine fault.";

/// Chat-completions advisor.
#[derive(Debug, Clone)]
pub struct HttpAdvisor {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    description: String,
}

impl HttpAdvisor {
    /// Create a new builder for configuring the advisor.
    pub fn builder() -> HttpAdvisorBuilder {
        HttpAdvisorBuilder::default()
    }

    fn request_body<'a>(&'a self, fault_label: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: fault_label,
                },
            ],
        }
    }
}

#[async_trait]
impl Advisor for HttpAdvisor {
    async fn lookup(&self, fault_label: &str) -> Result<String, AdvisoryError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(fault_label))
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(AdvisoryError::Auth(format!("API returned status {}", status)));
        }

        if !status.is_success() {
            return Err(AdvisoryError::Http(format!("API returned status {}", status)));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| AdvisoryError::Parse(e.to_string()))?;

        extract_suggestion(body)
    }

    fn description(&self) -> &str {
        &self.description
    }
}

fn extract_suggestion(body: ChatResponse) -> Result<String, AdvisoryError> {
    body.choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
        .ok_or_else(|| AdvisoryError::Parse("response has no suggestion".to_string()))
}

/// Builder for HttpAdvisor.
#[derive(Debug, Default)]
pub struct HttpAdvisorBuilder {
    endpoint: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
    max_tokens: Option<u32>,
    timeout: Option<Duration>,
}

impl HttpAdvisorBuilder {
    /// Set the chat completions URL.
    pub fn endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = Some(endpoint.trim_end_matches('/').to_string());
        self
    }

    /// Set the bearer token.
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the model name (default: gpt-4).
    pub fn model(mut self, model: &str) -> Self {
        self.model = Some(model.to_string());
        self
    }

    /// Set the response length cap (default: 100 tokens).
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the HTTP request timeout (default: 5 seconds).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the advisor.
    pub fn build(self) -> Result<HttpAdvisor, AdvisoryError> {
        let endpoint = self
            .endpoint
            .unwrap_or_else(|| "https://api.openai.com/v1/chat/completions".to_string());
        let api_key = self
            .api_key
            .ok_or_else(|| AdvisoryError::Auth("no API key configured".to_string()))?;

        let client = Client::builder()
            .timeout(self.timeout.unwrap_or(DEFAULT_TIMEOUT))
            .build()
            .map_err(|e| AdvisoryError::Http(e.to_string()))?;

        let description = format!("http: {}", endpoint);
        Ok(HttpAdvisor {
            client,
            endpoint,
            api_key,
            model: self.model.unwrap_or_else(|| "gpt-4".to_string()),
            max_tokens: self.max_tokens.unwrap_or(100),
            description,
        })
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve exactly one canned HTTP response on a local port.
    async fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "{}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        });
        format!("http://{}/v1/chat/completions", addr)
    }

    fn advisor(endpoint: &str) -> HttpAdvisor {
        HttpAdvisor::builder()
            .endpoint(endpoint)
            .api_key("test-key")
            .timeout(Duration::from_secs(2))
            .build()
            .unwrap()
    }

    #[test]
    fn test_extract_suggestion() {
        let body: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"  Reseat the connector. "}}]}"#,
        )
        .unwrap();
        assert_eq!(extract_suggestion(body).unwrap(), "Reseat the connector.");

        let empty: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(extract_suggestion(empty), Err(AdvisoryError::Parse(_))));

        let null: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap();
        assert!(extract_suggestion(null).is_err());
    }

    #[test]
    fn test_request_body_shape() {
        let advisor = advisor("http://localhost/v1/chat/completions/");
        let body = serde_json::to_value(advisor.request_body("fault x")).unwrap();
        assert_eq!(body["model"], "gpt-4");
        assert_eq!(body["max_tokens"], 100);
        assert_eq!(body["messages"][1]["content"], "fault x");
        assert_eq!(advisor.description(), "http: http://localhost/v1/chat/completions");
    }

    #[test]
    fn test_build_requires_key() {
        assert!(matches!(HttpAdvisor::builder().build(), Err(AdvisoryError::Auth(_))));
    }

    #[tokio::test]
    async fn test_lookup_success() {
        let url = serve_once(
            "HTTP/1.1 200 OK",
            r#"{"choices":[{"message":{"content":"Check the coolant pump."}}]}"#,
        )
        .await;
        assert_eq!(advisor(&url).lookup("fault").await.unwrap(), "Check the coolant pump.");
    }

    #[tokio::test]
    async fn test_lookup_unauthorized() {
        let url = serve_once("HTTP/1.1 401 Unauthorized", "{}").await;
        assert!(matches!(advisor(&url).lookup("fault").await, Err(AdvisoryError::Auth(_))));
    }

    #[tokio::test]
    async fn test_lookup_server_error() {
        let url = serve_once("HTTP/1.1 500 Internal Server Error", "{}").await;
        assert!(matches!(advisor(&url).lookup("fault").await, Err(AdvisoryError::Http(_))));
    }

    #[tokio::test]
    async fn test_lookup_malformed_body() {
        let url = serve_once("HTTP/1.1 200 OK", "not json").await;
        assert!(matches!(advisor(&url).lookup("fault").await, Err(AdvisoryError::Parse(_))));
    }

    #[tokio::test]
    async fn test_lookup_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = advisor(&format!("http://{}/", addr)).lookup("fault").await;
        assert!(matches!(result, Err(AdvisoryError::Connection(_))));
    }
}
