//! pixeld - prompt-to-image generation server
//!
//! Forwards prompts to an image generation provider, records every
//! generated image in SQLite, and serves the resulting gallery.

pub mod api;
pub mod config;
pub mod db;
pub mod images;
pub mod provider;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

pub use config::{Config, ProviderConfig};
use db::Database;
use images::{GalleryService, GenerationService, ImageStore, SqliteImageStore};
use provider::{ImagePigClient, Provider};

/// The pixeld server instance
pub struct Server {
    config: Config,
    db: Arc<Database>,
    generation: Arc<GenerationService>,
    gallery: Arc<GalleryService>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Server {
    /// Create a new server talking to the configured ImagePig endpoint
    pub async fn new(config: Config) -> Result<Self> {
        let provider = Arc::new(ImagePigClient::new(&config.provider)?);
        Self::with_provider(config, provider).await
    }

    /// Create a new server with an explicit image provider
    pub async fn with_provider(config: Config, provider: Arc<dyn Provider>) -> Result<Self> {
        let db = Arc::new(
            Database::with_timeout(config.db_path.as_deref(), config.store_timeout()).await?,
        );
        let store: Arc<dyn ImageStore> = Arc::new(SqliteImageStore::new(db.pool().clone()));

        let generation = Arc::new(GenerationService::new(
            provider,
            store.clone(),
            config.provider.timeout(),
        ));
        let gallery = Arc::new(GalleryService::new(store, config.store_timeout()));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            config,
            db,
            generation,
            gallery,
            shutdown_tx,
            shutdown_rx,
        })
    }

    /// Get the database handle
    pub fn db(&self) -> Arc<Database> {
        self.db.clone()
    }

    /// Build the router
    fn router(&self) -> Router {
        api::router(api::AppState {
            db: self.db.clone(),
            generation: self.generation.clone(),
            gallery: self.gallery.clone(),
        })
    }

    /// Run the server until shutdown, then close the database
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        let local_addr = listener.local_addr()?;
        info!("pixeld listening on {}", local_addr);

        let router = self.router();
        let mut shutdown_rx = self.shutdown_rx.clone();

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown_rx.changed().await.ok();
            })
            .await?;

        self.db.close().await;
        info!("pixeld shutdown complete");
        Ok(())
    }

    /// Signal the server to shutdown
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Get the configured bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }
}
