//! Image record persistence
//!
//! Records are append-only: created once after a successful generation,
//! never updated or deleted here. Listing order is insertion order.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::debug;

/// A generated image together with the prompt that produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    pub id: String,
    pub prompt: String,
    /// Encoded payload exactly as the provider returned it
    pub image_data: String,
    pub created_at: String,
}

/// Storage errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid record: {0}")]
    InvalidRecord(&'static str),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("storage timed out after {0:?}")]
    Timeout(Duration),
}

/// Durable, ordered persistence of image records
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Persist a new record; atomic, visible to readers only once committed
    async fn create(&self, prompt: &str, image_data: &str) -> Result<ImageRecord, StoreError>;

    /// All records, oldest first
    async fn list_all(&self) -> Result<Vec<ImageRecord>, StoreError>;

    /// Look up a single record by id
    async fn get(&self, id: &str) -> Result<Option<ImageRecord>, StoreError>;
}

/// Run a store read, failing with `StoreError::Timeout` past the deadline
///
/// Not for writes: a dropped write may still commit.
pub async fn bounded<T, F>(timeout: Duration, op: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(timeout, op).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(timeout)),
    }
}

/// SQLite-backed image store
#[derive(Clone)]
pub struct SqliteImageStore {
    pool: SqlitePool,
}

impl SqliteImageStore {
    /// Create a new image store over an already-migrated pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ImageStore for SqliteImageStore {
    async fn create(&self, prompt: &str, image_data: &str) -> Result<ImageRecord, StoreError> {
        if prompt.is_empty() {
            return Err(StoreError::InvalidRecord("prompt is empty"));
        }
        if image_data.is_empty() {
            return Err(StoreError::InvalidRecord("image data is empty"));
        }

        let record = ImageRecord {
            id: uuid::Uuid::new_v4().to_string(),
            prompt: prompt.to_string(),
            image_data: image_data.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
        };

        // Single statement, so the row is committed whole or not at all
        sqlx::query(
            "INSERT INTO images (id, prompt, image_data, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&record.id)
        .bind(&record.prompt)
        .bind(&record.image_data)
        .bind(&record.created_at)
        .execute(&self.pool)
        .await?;

        debug!(
            "Stored image {} ({} payload bytes)",
            record.id,
            record.image_data.len()
        );
        Ok(record)
    }

    async fn list_all(&self) -> Result<Vec<ImageRecord>, StoreError> {
        let records: Vec<ImageRecord> = sqlx::query_as(
            "SELECT id, prompt, image_data, created_at FROM images ORDER BY seq ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        debug!("Listed {} images", records.len());
        Ok(records)
    }

    async fn get(&self, id: &str) -> Result<Option<ImageRecord>, StoreError> {
        let record: Option<ImageRecord> = sqlx::query_as(
            "SELECT id, prompt, image_data, created_at FROM images WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }
}
