//! Image generation and gallery endpoints
//!
//! POST /generate-content  - Generate, store and return an image
//! GET  /images            - List all stored images, oldest first
//! GET  /images/{id}/raw   - Serve a stored image as decoded bytes

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use super::AppState;
use crate::images::{decode_payload, GenerateError};

/// Build the images router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/generate-content", post(generate_content))
        .route("/images", get(list_images))
        .route("/images/{id}/raw", get(get_raw_image))
}

/// Generation request
#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub prompt: Option<String>,
}

/// Successful generation response
#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub message: &'static str,
    pub id: String,
    pub image_data: String,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Generation error kind, absent for gallery errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
}

/// Upstream provider failure response
#[derive(Debug, Serialize)]
pub struct ProviderErrorResponse {
    pub error: &'static str,
    pub kind: &'static str,
    pub retryable: bool,
    pub status: serde_json::Value,
    pub message: String,
    pub details: serde_json::Value,
}

/// Storage failure response
#[derive(Debug, Serialize)]
pub struct StorageErrorResponse {
    pub error: &'static str,
    pub kind: &'static str,
    pub retryable: bool,
    pub message: String,
}

fn error_response(status: StatusCode, error: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            kind: None,
            retryable: None,
        }),
    )
        .into_response()
}

impl GenerateError {
    fn plain_response(&self, status: StatusCode, error: &str) -> Response {
        (
            status,
            Json(ErrorResponse {
                error: error.to_string(),
                kind: Some(self.kind()),
                retryable: Some(self.is_retryable()),
            }),
        )
            .into_response()
    }
}

impl IntoResponse for GenerateError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let retryable = self.is_retryable();

        match self {
            GenerateError::Validation(_) => {
                self.plain_response(StatusCode::BAD_REQUEST, "Prompt is required")
            }
            GenerateError::Configuration => {
                error!("Image provider API key is missing");
                self.plain_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error: API_KEY not configured",
                )
            }
            GenerateError::Provider(e) => {
                warn!("Image provider failed: {}", e);
                let status = e
                    .status
                    .map(serde_json::Value::from)
                    .unwrap_or_else(|| "unknown".into());
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ProviderErrorResponse {
                        error: "Failed to generate image",
                        kind,
                        retryable,
                        status,
                        message: e.message,
                        details: e
                            .details
                            .unwrap_or_else(|| "No detailed error information".into()),
                    }),
                )
                    .into_response()
            }
            GenerateError::Storage(e) => {
                error!("Generated image could not be stored: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(StorageErrorResponse {
                        error: "Failed to store image",
                        kind,
                        retryable,
                        message: e.to_string(),
                    }),
                )
                    .into_response()
            }
        }
    }
}

/// Generate an image from a prompt
async fn generate_content(
    State(state): State<AppState>,
    body: Result<Json<GenerateRequest>, JsonRejection>,
) -> Response {
    let prompt = match body {
        Ok(Json(GenerateRequest {
            prompt: Some(prompt),
        })) => prompt,
        Ok(_) => return GenerateError::Validation("prompt required").into_response(),
        Err(rejection) => {
            warn!("Rejected generation request: {}", rejection);
            return GenerateError::Validation("prompt required").into_response();
        }
    };

    // Run detached so a client disconnect cannot abandon a half-finished generation
    let generation = state.generation.clone();
    let task = tokio::spawn(async move { generation.generate(&prompt).await });

    match task.await {
        Ok(Ok(record)) => (
            StatusCode::OK,
            Json(GenerateResponse {
                message: "Image generated successfully",
                id: record.id,
                image_data: record.image_data,
            }),
        )
            .into_response(),
        Ok(Err(e)) => e.into_response(),
        Err(e) => {
            error!("Generation task failed: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to generate image")
        }
    }
}

/// List every stored image
async fn list_images(State(state): State<AppState>) -> Response {
    match state.gallery.list().await {
        Ok(images) => (StatusCode::OK, Json(images)).into_response(),
        Err(e) => {
            error!("Failed to fetch images: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch images")
        }
    }
}

/// Serve a stored image as raw bytes
async fn get_raw_image(Path(id): Path<String>, State(state): State<AppState>) -> Response {
    let record = match state.gallery.get(&id).await {
        Ok(Some(record)) => record,
        Ok(None) => return error_response(StatusCode::NOT_FOUND, "Image not found"),
        Err(e) => {
            error!("Failed to fetch image {}: {}", id, e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch image");
        }
    };

    match decode_payload(&record.image_data) {
        Ok(image) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, image.mime_type.to_string()),
                (
                    header::CACHE_CONTROL,
                    "public, max-age=31536000, immutable".to_string(),
                ),
                (
                    header::CONTENT_DISPOSITION,
                    format!(
                        "attachment; filename=\"ai-image-{}.{}\"",
                        record.id, image.extension
                    ),
                ),
            ],
            image.data,
        )
            .into_response(),
        Err(e) => {
            warn!("Image {} has an undecodable payload: {}", id, e);
            error_response(
                StatusCode::UNPROCESSABLE_ENTITY,
                "Stored image payload is not decodable",
            )
        }
    }
}
