//! Pending write batch shared by a unit of work's repositories.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use super::store::{DocumentStore, WriteBatch, WriteOp};

pub(crate) struct DocumentSession {
    store: Arc<dyn DocumentStore>,
    batch: Mutex<Option<WriteBatch>>,
    pending: AtomicU64,
    /// Owned by `with_transaction`; never commits on its own
    scoped: bool,
    timeout: Option<Duration>,
}

impl DocumentSession {
    pub(crate) fn new(store: Arc<dyn DocumentStore>, scoped: bool, timeout: Option<Duration>) -> Self {
        Self {
            store,
            batch: Mutex::new(None),
            pending: AtomicU64::new(0),
            scoped,
            timeout,
        }
    }

    pub(crate) fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    pub(crate) fn shared_store(&self) -> Arc<dyn DocumentStore> {
        self.store.clone()
    }

    pub(crate) fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub(crate) fn is_scoped(&self) -> bool {
        self.scoped
    }

    pub(crate) fn pending(&self) -> u64 {
        self.pending.load(Ordering::SeqCst)
    }

    pub(crate) async fn is_open(&self) -> bool {
        self.batch.lock().await.is_some()
    }

    /// Append writes, opening the batch on first use.
    pub(crate) async fn stage(&self, operations: Vec<WriteOp>) {
        if operations.is_empty() {
            return;
        }
        let count = operations.len() as u64;
        let mut slot = self.batch.lock().await;
        let batch = slot.get_or_insert_with(|| {
            tracing::debug!("Write batch opened");
            WriteBatch::new()
        });
        for operation in operations {
            batch.push(operation);
        }
        self.pending.fetch_add(count, Ordering::SeqCst);
    }

    /// Close the session, handing back whatever it staged.
    pub(crate) async fn take(&self) -> Option<(WriteBatch, u64)> {
        let batch = self.batch.lock().await.take();
        let staged = self.pending.swap(0, Ordering::SeqCst);
        batch.map(|batch| (batch, staged))
    }
}
