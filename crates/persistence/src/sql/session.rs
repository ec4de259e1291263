//! Lazily opened database transaction shared by a unit of work's repositories.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use common::{AppError, AppResult};
use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};
use tokio::sync::{Mutex, MutexGuard};

use crate::identity::with_deadline;

pub(crate) struct SqlSession {
    db: DatabaseConnection,
    transaction: Mutex<Option<DatabaseTransaction>>,
    pending: AtomicU64,
    /// Owned by `with_transaction`; never opens or commits on its own
    scoped: bool,
    timeout: Option<Duration>,
}

impl SqlSession {
    pub(crate) fn new(db: DatabaseConnection, timeout: Option<Duration>) -> Self {
        Self {
            db,
            transaction: Mutex::new(None),
            pending: AtomicU64::new(0),
            scoped: false,
            timeout,
        }
    }

    pub(crate) fn scoped(
        db: DatabaseConnection,
        transaction: DatabaseTransaction,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            db,
            transaction: Mutex::new(Some(transaction)),
            pending: AtomicU64::new(0),
            scoped: true,
            timeout,
        }
    }

    pub(crate) fn connection(&self) -> &DatabaseConnection {
        &self.db
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

    pub(crate) fn take_pending(&self) -> u64 {
        self.pending.swap(0, Ordering::SeqCst)
    }

    /// The open transaction, if any. Reads go through it so they see this
    /// session's own writes.
    pub(crate) async fn current(&self) -> MutexGuard<'_, Option<DatabaseTransaction>> {
        self.transaction.lock().await
    }

    pub(crate) async fn is_open(&self) -> bool {
        self.transaction.lock().await.is_some()
    }

    pub(crate) async fn take(&self) -> Option<DatabaseTransaction> {
        self.transaction.lock().await.take()
    }

    /// Begin a transaction unless one is open, and hold it for one mutation.
    pub(crate) async fn open(&self) -> AppResult<SessionGuard<'_>> {
        let mut slot = self.transaction.lock().await;
        if slot.is_none() {
            if self.scoped {
                return Err(AppError::transaction_aborted(
                    "the enclosing transaction was already rolled back",
                ));
            }
            let transaction = with_deadline(self.timeout, "begin", async {
                Ok::<_, AppError>(self.db.begin_with_config(None, None).await?)
            })
            .await?;
            tracing::debug!("Database session opened");
            *slot = Some(transaction);
        }
        Ok(SessionGuard {
            session: self,
            slot,
        })
    }
}

/// Exclusive access to the open transaction for one mutating call.
pub(crate) struct SessionGuard<'a> {
    session: &'a SqlSession,
    slot: MutexGuard<'a, Option<DatabaseTransaction>>,
}

impl<'a> SessionGuard<'a> {
    pub(crate) fn transaction(&self) -> AppResult<&DatabaseTransaction> {
        self.slot
            .as_ref()
            .ok_or_else(|| AppError::internal("database session closed while in use"))
    }

    /// Count a successful mutation. A failed one rolls the session back and
    /// forgets everything staged in it.
    pub(crate) async fn settle<T>(mut self, outcome: AppResult<T>, operations: u64) -> AppResult<T> {
        match outcome {
            Ok(value) => {
                self.session.pending.fetch_add(operations, Ordering::SeqCst);
                Ok(value)
            }
            Err(err) => {
                if let Some(transaction) = self.slot.take() {
                    rollback(transaction).await;
                }
                let discarded = self.session.pending.swap(0, Ordering::SeqCst);
                tracing::warn!(discarded, error = %err, "Mutation failed, session rolled back");
                Err(err)
            }
        }
    }
}

pub(crate) async fn rollback(transaction: DatabaseTransaction) {
    if let Err(rollback_err) = transaction.rollback().await {
        tracing::error!("Failed to rollback transaction: {}", rollback_err);
    }
}
