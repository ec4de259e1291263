//! Document store connection and lifecycle.

use std::sync::Arc;

use common::{AppResult, DocumentStoreConfig};

use super::memory::InMemoryDocumentStore;
use super::redis_store::RedisDocumentStore;
use super::store::DocumentStore;

/// Owns the store client for the document backend.
#[derive(Clone)]
pub struct DocumentContext {
    store: Arc<dyn DocumentStore>,
}

impl DocumentContext {
    /// Connect to Redis.
    pub async fn connect(config: &DocumentStoreConfig) -> AppResult<Self> {
        let store = RedisDocumentStore::connect(config).await?;
        Ok(Self::from_store(Arc::new(store)))
    }

    /// Process-local store, for tests and local runs.
    pub fn in_memory() -> Self {
        tracing::info!("Using in-memory document store");
        Self::from_store(Arc::new(InMemoryDocumentStore::new()))
    }

    pub fn from_store(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> Arc<dyn DocumentStore> {
        self.store.clone()
    }

    pub async fn ping(&self) -> AppResult<()> {
        self.store.ping().await
    }

    /// Release this handle. The connection closes with the last clone.
    pub async fn close(self) {
        drop(self.store);
        tracing::info!("Document store handle released");
    }
}
