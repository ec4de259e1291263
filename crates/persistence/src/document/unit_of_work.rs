//! Unit of Work over atomic write batches.
//!
//! The store has no interactive transactions: a session is a pending batch,
//! `save_changes` commits it in one call, and `with_transaction` stages into
//! a fresh batch that commits only when the work succeeds. Reads inside the
//! work see committed state, not the work's own staged writes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{AppError, AppResult};
use domain::{Label, RefreshToken, Task, User};

use super::mapper::{
    LabelDocumentMapper, RefreshTokenDocumentMapper, TaskDocumentMapper, UserDocumentMapper,
};
use super::repository::DocumentRepository;
use super::session::DocumentSession;
use super::store::{DocumentStore, WriteBatch};
use crate::identity::with_deadline;
use crate::repository::Repository;
use crate::unit_of_work::{TransactionWork, UnitOfWork, UnitOfWorkFactory};

pub struct DocumentUnitOfWork {
    session: Arc<DocumentSession>,
    users: DocumentRepository<UserDocumentMapper>,
    tasks: DocumentRepository<TaskDocumentMapper>,
    labels: DocumentRepository<LabelDocumentMapper>,
    refresh_tokens: DocumentRepository<RefreshTokenDocumentMapper>,
}

impl DocumentUnitOfWork {
    pub fn new(store: Arc<dyn DocumentStore>, timeout: Option<Duration>) -> Self {
        Self::with_session(Arc::new(DocumentSession::new(store, false, timeout)))
    }

    fn with_session(session: Arc<DocumentSession>) -> Self {
        Self {
            users: DocumentRepository::new(session.clone()),
            tasks: DocumentRepository::new(session.clone()),
            labels: DocumentRepository::new(session.clone()),
            refresh_tokens: DocumentRepository::new(session.clone()),
            session,
        }
    }

    async fn commit(&self, batch: WriteBatch, staged: u64) -> AppResult<u64> {
        let store = self.session.store();
        match with_deadline(self.session.timeout(), "commit", store.commit(batch)).await {
            Ok(()) => {
                tracing::debug!(operations = staged, "Write batch committed");
                Ok(staged)
            }
            Err(err) => {
                tracing::warn!("Write batch rejected, {} staged operations discarded: {}", staged, err);
                Err(match err {
                    AppError::Timeout(_) | AppError::TransactionAborted(_) => err,
                    other => AppError::transaction_aborted(other.to_string()),
                })
            }
        }
    }
}

#[async_trait]
impl UnitOfWork for DocumentUnitOfWork {
    fn users(&self) -> &dyn Repository<User> {
        &self.users
    }

    fn tasks(&self) -> &dyn Repository<Task> {
        &self.tasks
    }

    fn labels(&self) -> &dyn Repository<Label> {
        &self.labels
    }

    fn refresh_tokens(&self) -> &dyn Repository<RefreshToken> {
        &self.refresh_tokens
    }

    fn pending_operations(&self) -> u64 {
        self.session.pending()
    }

    async fn has_open_session(&self) -> bool {
        self.session.is_open().await
    }

    async fn save_changes(&self) -> AppResult<u64> {
        // Commit belongs to the enclosing with_transaction
        if self.session.is_scoped() {
            return Ok(self.session.pending());
        }
        match self.session.take().await {
            Some((batch, staged)) => self.commit(batch, staged).await,
            None => Ok(0),
        }
    }

    async fn with_transaction<F, T>(&self, work: F) -> AppResult<T>
    where
        F: for<'a> FnOnce(&'a Self) -> TransactionWork<'a, T> + Send,
        T: Send,
    {
        let scope = Self::with_session(Arc::new(DocumentSession::new(
            self.session.shared_store(),
            true,
            self.session.timeout(),
        )));

        let outcome = work(&scope).await;
        let staged = scope.session.take().await;
        match outcome {
            Ok(value) => {
                if let Some((batch, count)) = staged {
                    scope.commit(batch, count).await?;
                }
                Ok(value)
            }
            Err(err) => {
                let discarded = staged.map(|(_, count)| count).unwrap_or(0);
                tracing::warn!(discarded, error = %err, "Transaction work failed, batch discarded");
                Err(err)
            }
        }
    }

    async fn dispose(&self) -> AppResult<()> {
        if let Some((_, discarded)) = self.session.take().await {
            tracing::debug!(discarded, "Write batch disposed");
        }
        Ok(())
    }

    async fn reset(&self) {
        self.session.take().await;
    }
}

/// Hands out one [`DocumentUnitOfWork`] per use-case invocation.
#[derive(Clone)]
pub struct DocumentUnitOfWorkFactory {
    store: Arc<dyn DocumentStore>,
    timeout: Option<Duration>,
}

impl DocumentUnitOfWorkFactory {
    pub fn new(store: Arc<dyn DocumentStore>, timeout: Option<Duration>) -> Self {
        Self { store, timeout }
    }
}

impl UnitOfWorkFactory for DocumentUnitOfWorkFactory {
    type UnitOfWork = DocumentUnitOfWork;

    fn create(&self) -> DocumentUnitOfWork {
        DocumentUnitOfWork::new(self.store.clone(), self.timeout)
    }
}
