//! wabot-inference: client for the hosted prediction endpoint.
//!
//! One POST per question, the chat JID rides along as the session id so the
//! endpoint keeps conversation continuity per chat. No retry, no caching.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("prediction request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("prediction endpoint returned {0}: {1}")]
    Status(StatusCode, String),
}

/// Request body for the prediction endpoint.
#[derive(Debug, Serialize)]
struct PredictionRequest<'a> {
    question: &'a str,
    #[serde(rename = "overrideConfig")]
    override_config: OverrideConfig<'a>,
}

#[derive(Debug, Serialize)]
struct OverrideConfig<'a> {
    #[serde(rename = "sessionId")]
    session_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct PredictionResponse {
    text: String,
}

/// Answer seam the command router depends on.
#[async_trait::async_trait]
pub trait AnswerProvider: Send + Sync {
    /// Relay `question` and return the endpoint's answer text.
    async fn ask(&self, question: &str, session_id: &str) -> Result<String, InferenceError>;
}

/// HTTP client for a Flowise-style prediction endpoint.
pub struct FlowiseClient {
    client: Client,
    url: String,
}

impl FlowiseClient {
    /// Create a client for the prediction endpoint at `url`.
    pub fn new(url: &str) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("failed to build reqwest client");
        Self {
            client,
            url: url.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl AnswerProvider for FlowiseClient {
    async fn ask(&self, question: &str, session_id: &str) -> Result<String, InferenceError> {
        let body = PredictionRequest {
            question,
            override_config: OverrideConfig { session_id },
        };

        let resp = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(session_id, "prediction request failed: {e}");
                InferenceError::from(e)
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            error!(session_id, %status, "prediction endpoint rejected request: {text}");
            return Err(InferenceError::Status(status, text));
        }

        let parsed: PredictionResponse = resp.json().await.map_err(|e| {
            error!(session_id, "prediction response parse failed: {e}");
            InferenceError::from(e)
        })?;
        Ok(parsed.text)
    }
}
