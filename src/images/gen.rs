//! Image generation pipeline
//!
//! One prompt, one provider call, one stored record:
//! 1. Validate the prompt and provider credential
//! 2. Request the image from the provider (no retry)
//! 3. Persist the payload, then hand back the stored record

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info};

use super::store::{ImageRecord, ImageStore, StoreError};
use crate::provider::{Provider, ProviderError};

/// Generation errors
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("{0}")]
    Validation(&'static str),

    #[error("image provider credential not configured")]
    Configuration,

    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

impl GenerateError {
    /// Stable name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Configuration => "configuration",
            Self::Provider(_) => "provider",
            Self::Storage(_) => "storage",
        }
    }

    /// Whether the same request may succeed later without operator action
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Provider(_) | Self::Storage(_))
    }
}

/// Orchestrates prompt -> provider -> store
pub struct GenerationService {
    provider: Arc<dyn Provider>,
    store: Arc<dyn ImageStore>,
    provider_timeout: Duration,
}

impl GenerationService {
    /// The store must bound its own writes; they are never cancelled here
    pub fn new(
        provider: Arc<dyn Provider>,
        store: Arc<dyn ImageStore>,
        provider_timeout: Duration,
    ) -> Self {
        Self {
            provider,
            store,
            provider_timeout,
        }
    }

    /// Generate an image for `prompt` and record it
    ///
    /// The prompt is stored verbatim; whitespace only decides emptiness.
    pub async fn generate(&self, prompt: &str) -> Result<ImageRecord, GenerateError> {
        if prompt.trim().is_empty() {
            return Err(GenerateError::Validation("prompt required"));
        }

        if !self.provider.is_configured() {
            return Err(GenerateError::Configuration);
        }

        debug!("Requesting image from {}", self.provider.name());
        // Single call site; a retry policy would wrap the provider, not this
        let image_data = tokio::time::timeout(
            self.provider_timeout,
            self.provider.request_image(prompt),
        )
        .await
        .map_err(|_| ProviderError::timeout(self.provider_timeout))??;

        if image_data.is_empty() {
            return Err(ProviderError::empty_payload(None).into());
        }

        // Dropping an in-flight write could still let it commit, so await its outcome
        let record = self.store.create(prompt, &image_data).await?;

        info!(
            "Generated image {} via {} ({} payload bytes)",
            record.id,
            self.provider.name(),
            record.image_data.len()
        );
        Ok(record)
    }
}
