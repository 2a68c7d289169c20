//! Prompt-to-image generation
//!
//! Three steps:
//! 1. Inference API turns the prompt into raw image bytes (under a deadline)
//! 2. The bytes are uploaded to the file-transfer server
//! 3. The public URL of the uploaded file is returned

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use regex::Regex;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::{ImageUploader, UploadError};
use crate::config::Config;

/// Longest sanitised prompt fragment kept in a file name
const MAX_NAME_PROMPT_LEN: usize = 80;

static UNSAFE_NAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_-]+").unwrap());

/// Image generation errors, tagged by failing stage
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("image API key not configured")]
    NotConfigured,

    #[error("image API did not respond within {0:?}")]
    Timeout(Duration),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("image API rejected credentials: {0}")]
    Auth(StatusCode),

    #[error("image API error: {0}")]
    Upstream(StatusCode),

    #[error("upload failed: {0}")]
    Upload(#[from] UploadError),
}

/// Inference request body
#[derive(Debug, Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
}

/// Image generation client
pub struct ImageClient {
    client: Client,
    api_key: Option<String>,
    api_url: String,
    timeout: Duration,
    public_base_url: String,
    uploader: Arc<dyn ImageUploader>,
}

impl ImageClient {
    /// Create a client from the server configuration
    pub fn new(config: &Config, uploader: Arc<dyn ImageUploader>) -> Result<Self, ImageError> {
        Ok(Self {
            client: Client::builder().build()?,
            api_key: config.image_api_key.clone(),
            api_url: config.image_api_url.clone(),
            timeout: config.image_timeout(),
            public_base_url: config.public_base_url.trim_end_matches('/').to_string(),
            uploader,
        })
    }

    /// Check if API key is configured
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate an image for `prompt` and return its public URL
    ///
    /// Failures at any stage are logged here; the caller only decides what
    /// to show the user.
    pub async fn generate_image(
        &self,
        prompt: &str,
        user_id: &str,
    ) -> Result<String, ImageError> {
        let result = self.run_pipeline(prompt, user_id).await;
        if let Err(e) = &result {
            error!("Error generating image for user {}: {}", user_id, e);
        }
        result
    }

    async fn run_pipeline(&self, prompt: &str, user_id: &str) -> Result<String, ImageError> {
        let data = self.fetch_image(prompt).await?;
        debug!("Received {} bytes of image data", data.len());

        let name = image_file_name(user_id, prompt, Utc::now());
        let uploader = self.uploader.clone();
        let upload_name = name.clone();
        tokio::task::spawn_blocking(move || uploader.upload(&upload_name, &data))
            .await
            .map_err(|e| UploadError::Task(e.to_string()))??;

        let url = format!("{}/{}", self.public_base_url, name);
        info!("Image for user {} uploaded as {}", user_id, name);
        Ok(url)
    }

    /// Call the inference API, giving up after the configured deadline
    async fn fetch_image(&self, prompt: &str) -> Result<Vec<u8>, ImageError> {
        let api_key = self.api_key.as_ref().ok_or(ImageError::NotConfigured)?;

        let request = async {
            debug!("Sending image inference request");
            let response = self
                .client
                .post(&self.api_url)
                .bearer_auth(api_key)
                .json(&InferenceRequest { inputs: prompt })
                .send()
                .await?;

            let status = response.status();
            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                return Err(ImageError::Auth(status));
            }
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                warn!("Image API error: {} - {}", status, body);
                return Err(ImageError::Upstream(status));
            }

            Ok::<_, ImageError>(response.bytes().await?.to_vec())
        };

        // Dropping the request future on expiry cancels the call
        tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| ImageError::Timeout(self.timeout))?
    }
}

/// Build the remote file name for a generated image
///
/// `{user}-{unix millis}-{prompt}.png`, with anything outside
/// `[A-Za-z0-9_-]` collapsed to `_` so the name never leaves the upload
/// root.
pub fn image_file_name(user_id: &str, prompt: &str, now: DateTime<Utc>) -> String {
    let user = sanitize(user_id, MAX_NAME_PROMPT_LEN);
    let subject = sanitize(prompt, MAX_NAME_PROMPT_LEN);
    let subject = if subject.is_empty() {
        "image"
    } else {
        subject.as_str()
    };
    format!("{}-{}-{}.png", user, now.timestamp_millis(), subject)
}

fn sanitize(text: &str, max_len: usize) -> String {
    let cleaned = UNSAFE_NAME_CHARS.replace_all(text, "_");
    let trimmed = cleaned.trim_matches('_');
    // Only ASCII remains, so byte slicing is safe
    trimmed[..trimmed.len().min(max_len)].to_string()
}
