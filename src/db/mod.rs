//! Database module - SQLite pool and image schema

#[cfg(test)]
pub mod test_utils;

use std::str::FromStr;
use std::time::Duration;

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::info;

/// Lock wait and pool acquire deadline when none is configured
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Database handle wrapping SQLite connection pool
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open a database connection and apply migrations
    /// If path is None, uses in-memory database (for testing)
    pub async fn new(path: Option<&str>) -> Result<Self> {
        Self::with_timeout(path, DEFAULT_TIMEOUT).await
    }

    /// Open a database whose statements give up after `timeout`
    ///
    /// SQLite itself enforces the deadline (busy timeout), so a write that
    /// reports failure has not committed.
    pub async fn with_timeout(path: Option<&str>, timeout: Duration) -> Result<Self> {
        let conn_str = match path {
            Some(p) => format!("sqlite:{}?mode=rwc", p),
            None => "sqlite::memory:".to_string(),
        };

        let options = SqliteConnectOptions::from_str(&conn_str)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(timeout);

        // Keep one connection open so an in-memory database outlives idle pools
        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .min_connections(1)
            .acquire_timeout(timeout)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.run_migrations().await?;

        Ok(db)
    }

    /// Run database migrations
    async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations...");

        // seq defines insertion order; id is the external reference
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS images (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT UNIQUE NOT NULL,
                prompt TEXT NOT NULL CHECK (length(prompt) > 0),
                image_data TEXT NOT NULL CHECK (length(image_data) > 0),
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        info!("Database migrations complete");
        Ok(())
    }

    /// Get the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Check if database is healthy
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Close all pooled connections, flushing pending writes
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Database closed");
    }
}
