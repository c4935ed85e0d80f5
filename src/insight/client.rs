//! Text-generation client boundary
//!
//! Two implementations of `InsightClient`:
//! - `GeminiClient`: calls the Generative Language REST API (production)
//! - `MockClient`: returns a preconfigured reply (testing)
//!
//! `generate_narrative` wraps a single exchange in a timeout. Every failure
//! comes back as an `InsightError`; nothing here panics.

use crate::config::InsightConfig;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::json;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum InsightError {
    #[error("no API key configured for the text-generation service")]
    MissingApiKey,

    #[error("nothing to analyse: {0}")]
    NoData(String),

    #[error("could not build prompt: {0}")]
    Prompt(String),

    #[error("authentication with the text-generation service failed: {0}")]
    Auth(String),

    #[error("text-generation quota exhausted: {0}")]
    Quota(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("no response within {0:?}")]
    Timeout(Duration),

    #[error("service error (HTTP {status}): {message}")]
    Service { status: u16, message: String },

    #[error("unexpected response: {0}")]
    MalformedResponse(String),

    #[error("text-generation service unavailable: {0}")]
    Unavailable(String),
}

/// Client trait for the text-generation service.
///
/// Abstracts over transport so the dashboard does not depend on how the
/// service is reached.
#[async_trait]
pub trait InsightClient: Send + Sync {
    /// Send one prompt and return the generated text
    async fn generate(&self, prompt: &str) -> Result<String, InsightError>;
}

/// Run one exchange with an upper bound on its duration.
pub async fn generate_narrative(
    client: &dyn InsightClient,
    prompt: &str,
    timeout: Duration,
) -> Result<String, InsightError> {
    debug!(prompt_len = prompt.len(), ?timeout, "requesting narrative");
    match tokio::time::timeout(timeout, client.generate(prompt)).await {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => {
            warn!(error = %e, "narrative generation failed");
            Err(e)
        }
        Err(_) => {
            warn!(?timeout, "narrative generation timed out");
            Err(InsightError::Timeout(timeout))
        }
    }
}

/// Client for the Generative Language `generateContent` endpoint
pub struct GeminiClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
    timeout: Duration,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, base_url: &str, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.into(),
            timeout,
        }
    }

    /// Build from configuration; fails when no API key is set.
    pub fn from_config(config: &InsightConfig) -> Result<Self, InsightError> {
        let key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(InsightError::MissingApiKey)?;
        Ok(Self::new(key, config.model.clone(), &config.base_url, config.timeout()))
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }
}

/// Generated text from a `generateContent` reply: the text parts of the
/// first candidate, concatenated.
pub fn extract_text(body: &serde_json::Value) -> Result<String, InsightError> {
    let parts = body["candidates"][0]["content"]["parts"]
        .as_array()
        .ok_or_else(|| {
            let reason = body["promptFeedback"]["blockReason"]
                .as_str()
                .map(|r| format!("prompt blocked: {}", r))
                .unwrap_or_else(|| "no candidates in response".to_string());
            InsightError::MalformedResponse(reason)
        })?;
    let text: String = parts.iter().filter_map(|p| p["text"].as_str()).collect();
    if text.trim().is_empty() {
        return Err(InsightError::MalformedResponse("empty text in response".to_string()));
    }
    Ok(text)
}

/// Map an unsuccessful HTTP reply to an error.
///
/// A rejected key comes back as HTTP 400 with reason `API_KEY_INVALID`.
pub fn classify_failure(status: StatusCode, body: Option<&serde_json::Value>) -> InsightError {
    let error = body.map(|v| &v["error"]);
    let message = error
        .and_then(|e| e["message"].as_str())
        .map(str::to_string)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown").to_string());
    let key_rejected = error
        .and_then(|e| e["details"].as_array())
        .is_some_and(|details| details.iter().any(|d| d["reason"] == "API_KEY_INVALID"));

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => InsightError::Auth(message),
        StatusCode::BAD_REQUEST if key_rejected => InsightError::Auth(message),
        StatusCode::TOO_MANY_REQUESTS => InsightError::Quota(message),
        _ => InsightError::Service {
            status: status.as_u16(),
            message,
        },
    }
}

#[async_trait]
impl InsightClient for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, InsightError> {
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let resp = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    InsightError::Timeout(self.timeout)
                } else {
                    InsightError::Network(e.without_url().to_string())
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.json::<serde_json::Value>().await.ok();
            return Err(classify_failure(status, body.as_ref()));
        }

        let value: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| InsightError::MalformedResponse(e.without_url().to_string()))?;
        extract_text(&value)
    }
}

/// Mock client for testing; returns a preconfigured reply.
pub struct MockClient {
    reply: Result<String, InsightError>,
    delay: Option<Duration>,
    prompts: Mutex<Vec<String>>,
}

impl MockClient {
    /// A client that answers every prompt with `text`.
    pub fn with_response(text: impl Into<String>) -> Self {
        Self {
            reply: Ok(text.into()),
            delay: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// A client that fails every prompt with `error`.
    pub fn with_failure(error: InsightError) -> Self {
        Self {
            reply: Err(error),
            delay: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// A client that reports as unreachable.
    pub fn unavailable() -> Self {
        Self::with_failure(InsightError::Unavailable("mock client configured as unavailable".to_string()))
    }

    /// Wait before replying.
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Prompts received so far
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl InsightClient for MockClient {
    async fn generate(&self, prompt: &str) -> Result<String, InsightError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.reply.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_client_returns_response() {
        let client = MockClient::with_response("narrative");
        let text = generate_narrative(&client, "prompt", Duration::from_secs(1)).await.unwrap();
        assert_eq!(text, "narrative");
        assert_eq!(client.prompts(), vec!["prompt".to_string()]);
    }

    #[tokio::test]
    async fn mock_unavailable_client_returns_error() {
        let client = MockClient::unavailable();
        let err = generate_narrative(&client, "prompt", Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, InsightError::Unavailable(_)));
    }

    #[tokio::test]
    async fn slow_client_times_out() {
        let client = MockClient::with_response("late").delayed(Duration::from_millis(500));
        let err = generate_narrative(&client, "prompt", Duration::from_millis(20)).await.unwrap_err();
        assert_eq!(err, InsightError::Timeout(Duration::from_millis(20)));
        assert!(err.to_string().contains("no response within"));
    }

    #[test]
    fn extract_text_joins_parts() {
        let body = json!({
            "candidates": [{ "content": { "parts": [{ "text": "Hello, " }, { "text": "world" }] } }]
        });
        assert_eq!(extract_text(&body).unwrap(), "Hello, world");
    }

    #[test]
    fn extract_text_reports_block_reason() {
        let body = json!({ "promptFeedback": { "blockReason": "SAFETY" } });
        match extract_text(&body) {
            Err(InsightError::MalformedResponse(msg)) => assert!(msg.contains("SAFETY")),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn rejected_key_is_auth_error() {
        let body = json!({
            "error": {
                "code": 400,
                "message": "API key not valid. Please pass a valid API key.",
                "status": "INVALID_ARGUMENT",
                "details": [{
                    "@type": "type.googleapis.com/google.rpc.ErrorInfo",
                    "reason": "API_KEY_INVALID",
                    "domain": "googleapis.com"
                }]
            }
        });
        let err = classify_failure(StatusCode::BAD_REQUEST, Some(&body));
        assert_eq!(err, InsightError::Auth("API key not valid. Please pass a valid API key.".into()));

        let other = json!({ "error": { "message": "bad prompt", "status": "INVALID_ARGUMENT" } });
        assert!(matches!(
            classify_failure(StatusCode::BAD_REQUEST, Some(&other)),
            InsightError::Service { status: 400, .. }
        ));
        assert!(matches!(
            classify_failure(StatusCode::TOO_MANY_REQUESTS, None),
            InsightError::Quota(_)
        ));
    }

    #[test]
    fn from_config_requires_key() {
        let config = InsightConfig::default();
        assert!(matches!(GeminiClient::from_config(&config), Err(InsightError::MissingApiKey)));

        let config = InsightConfig {
            api_key: Some("k".into()),
            ..InsightConfig::default()
        };
        let client = GeminiClient::from_config(&config).unwrap();
        assert!(client.endpoint().ends_with("/v1beta/models/gemini-1.5-flash:generateContent"));
    }

    #[cfg(feature = "real_llm")]
    #[tokio::test]
    async fn real_service_answers() {
        let key = std::env::var("GEMINI_API_KEY").expect("GEMINI_API_KEY");
        let client = GeminiClient::new(key, "gemini-1.5-flash", "https://generativelanguage.googleapis.com", Duration::from_secs(60));
        let text = generate_narrative(&client, "Reply with the word: ok", Duration::from_secs(60))
            .await
            .unwrap();
        assert!(!text.is_empty());
    }
}
