//! Image generation provider integration
//!
//! Provides:
//! - The `Provider` capability used by the generation pipeline
//! - An HTTP client for the ImagePig flux endpoint

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ProviderConfig;

/// Failure talking to, or understanding, the upstream provider
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct ProviderError {
    /// Upstream HTTP status, if a response was received
    pub status: Option<u16>,
    pub message: String,
    /// Upstream response body, for diagnostics
    pub details: Option<serde_json::Value>,
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
            details: None,
        }
    }

    /// Provider answered but gave us nothing usable
    pub fn empty_payload(details: Option<serde_json::Value>) -> Self {
        Self {
            status: None,
            message: "empty image payload".to_string(),
            details,
        }
    }

    pub fn timeout(after: Duration) -> Self {
        Self::new(format!("provider timed out after {:?}", after))
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        Self {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
            details: None,
        }
    }
}

/// Something that turns a prompt into an encoded image
#[async_trait]
pub trait Provider: Send + Sync {
    /// Name for logs
    fn name(&self) -> &str;

    /// Whether a credential is available
    fn is_configured(&self) -> bool;

    /// Issue one generation request; returns the encoded payload as received
    async fn request_image(&self, prompt: &str) -> Result<String, ProviderError>;
}

/// Generation request body
#[derive(Debug, Serialize)]
struct ImageRequest<'a> {
    prompt: &'a str,
}

/// Generation response body
#[derive(Debug, Deserialize)]
struct ImageResponse {
    #[serde(default)]
    image_data: Option<String>,
}

/// ImagePig HTTP client
pub struct ImagePigClient {
    /// HTTP client
    client: Client,
    /// API key
    api_key: Option<String>,
    /// Endpoint URL
    url: String,
}

impl fmt::Debug for ImagePigClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImagePigClient")
            .field("url", &self.url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl ImagePigClient {
    /// Create a client from provider configuration
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key: config.api_key().map(String::from),
            url: config.url.clone(),
        })
    }
}

/// Parse a body as JSON, falling back to a JSON string
fn body_details(body: &str) -> serde_json::Value {
    serde_json::from_str(body).unwrap_or_else(|_| serde_json::Value::String(body.to_string()))
}

#[async_trait]
impl Provider for ImagePigClient {
    fn name(&self) -> &str {
        "imagepig"
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn request_image(&self, prompt: &str) -> Result<String, ProviderError> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| ProviderError::new("ImagePig API key not configured"))?;

        debug!("Sending image generation request to {}", self.url);

        let response = self
            .client
            .post(&self.url)
            .header("Api-Key", api_key)
            .json(&ImageRequest { prompt })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!("ImagePig API error: {} - {}", status, body);
            return Err(ProviderError {
                status: Some(status.as_u16()),
                message: format!("API error: {}", status),
                details: Some(body_details(&body)),
            });
        }

        let parsed: ImageResponse = serde_json::from_str(&body).map_err(|e| ProviderError {
            status: Some(status.as_u16()),
            message: format!("Failed to parse response: {}", e),
            details: Some(body_details(&body)),
        })?;

        match parsed.image_data {
            Some(data) if !data.is_empty() => {
                debug!("Received {} payload bytes", data.len());
                Ok(data)
            }
            _ => Err(ProviderError::empty_payload(Some(body_details(&body)))),
        }
    }
}
