//! Chat completion client
//!
//! Talks to an OpenAI-compatible `/chat/completions` endpoint with fixed
//! generation parameters: greedy decoding and a capped output length.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Config;
use crate::conversation::ChatMessage;

/// Completion errors
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("completion API key not configured")]
    NotConfigured,

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error: {0}")]
    Status(StatusCode),

    #[error("failed to parse response: {0}")]
    Decode(#[source] reqwest::Error),
}

/// Chat completion request
#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

/// Chat completion response
#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

impl CompletionResponse {
    /// Text of the first choice, empty when the provider returned none
    fn into_text(self) -> String {
        self.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default()
    }
}

/// Completion API client
#[derive(Debug, Clone)]
pub struct CompletionClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
    max_tokens: u32,
}

impl CompletionClient {
    /// Create a client from the server configuration
    pub fn new(config: &Config) -> Result<Self, CompletionError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            api_key: config.completion_api_key.clone(),
            base_url: config.completion_base_url.trim_end_matches('/').to_string(),
            model: config.completion_model.clone(),
            max_tokens: config.completion_max_tokens,
        })
    }

    /// Check if API key is configured
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate the next assistant message for `history`
    pub async fn complete(&self, history: &[ChatMessage]) -> Result<String, CompletionError> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or(CompletionError::NotConfigured)?;

        let request = CompletionRequest {
            model: &self.model,
            messages: history,
            temperature: 0.0,
            max_tokens: self.max_tokens,
        };

        debug!(
            "Sending completion request: model={} messages={}",
            self.model,
            history.len()
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("Completion API error: {} - {}", status, body);
            return Err(CompletionError::Status(status));
        }

        let completion: CompletionResponse =
            response.json().await.map_err(CompletionError::Decode)?;

        Ok(completion.into_text())
    }
}
