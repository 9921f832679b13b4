//! Gallery read path

use std::sync::Arc;
use std::time::Duration;

use super::store::{bounded, ImageRecord, ImageStore, StoreError};

/// Exposes every stored image, oldest first
pub struct GalleryService {
    store: Arc<dyn ImageStore>,
    store_timeout: Duration,
}

impl GalleryService {
    pub fn new(store: Arc<dyn ImageStore>, store_timeout: Duration) -> Self {
        Self {
            store,
            store_timeout,
        }
    }

    /// All records in the order the store returns them
    pub async fn list(&self) -> Result<Vec<ImageRecord>, StoreError> {
        bounded(self.store_timeout, self.store.list_all()).await
    }

    /// A single record by id
    pub async fn get(&self, id: &str) -> Result<Option<ImageRecord>, StoreError> {
        bounded(self.store_timeout, self.store.get(id)).await
    }
}
