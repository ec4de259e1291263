//! Unit of Work over native database transactions.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{AppError, AppResult};
use domain::{Label, RefreshToken, Task, User};
use sea_orm::{ConnectionTrait, DatabaseConnection, DbBackend, IsolationLevel, TransactionTrait};

use super::mapper::{LabelSqlMapper, RefreshTokenSqlMapper, TaskSqlMapper, UserSqlMapper};
use super::repository::SqlRepository;
use super::session::{rollback, SqlSession};
use crate::identity::with_deadline;
use crate::repository::Repository;
use crate::unit_of_work::{TransactionWork, UnitOfWork, UnitOfWorkFactory};

pub struct SqlUnitOfWork {
    session: Arc<SqlSession>,
    users: SqlRepository<UserSqlMapper>,
    tasks: SqlRepository<TaskSqlMapper>,
    labels: SqlRepository<LabelSqlMapper>,
    refresh_tokens: SqlRepository<RefreshTokenSqlMapper>,
}

impl SqlUnitOfWork {
    pub fn new(db: DatabaseConnection, timeout: Option<Duration>) -> Self {
        Self::with_session(Arc::new(SqlSession::new(db, timeout)))
    }

    fn with_session(session: Arc<SqlSession>) -> Self {
        Self {
            users: SqlRepository::new(session.clone()),
            tasks: SqlRepository::new(session.clone()),
            labels: SqlRepository::new(session.clone()),
            refresh_tokens: SqlRepository::new(session.clone()),
            session,
        }
    }

    async fn commit(&self, staged: u64, transaction: sea_orm::DatabaseTransaction) -> AppResult<u64> {
        let committed = with_deadline(self.session.timeout(), "commit", async {
            Ok::<_, AppError>(transaction.commit().await?)
        })
        .await;
        match committed {
            Ok(()) => {
                tracing::debug!(operations = staged, "Transaction committed");
                Ok(staged)
            }
            Err(err) => {
                tracing::error!("Commit failed, {} staged operations discarded: {}", staged, err);
                Err(abort_reason(err))
            }
        }
    }
}

/// Commit failures surface as `TransactionAborted`; a deadline stays a timeout.
fn abort_reason(err: AppError) -> AppError {
    match err {
        AppError::Timeout(_) | AppError::TransactionAborted(_) => err,
        other => AppError::transaction_aborted(other.to_string()),
    }
}

#[async_trait]
impl UnitOfWork for SqlUnitOfWork {
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
        let Some(transaction) = self.session.take().await else {
            return Ok(0);
        };
        let staged = self.session.take_pending();
        self.commit(staged, transaction).await
    }

    async fn with_transaction<F, T>(&self, work: F) -> AppResult<T>
    where
        F: for<'a> FnOnce(&'a Self) -> TransactionWork<'a, T> + Send,
        T: Send,
    {
        let db = self.session.connection();
        // SQLite transactions are already serializable and reject the option
        let isolation = match db.get_database_backend() {
            DbBackend::Sqlite => None,
            _ => Some(IsolationLevel::Serializable),
        };
        let transaction = with_deadline(self.session.timeout(), "begin", async {
            Ok::<_, AppError>(db.begin_with_config(isolation, None).await?)
        })
        .await?;

        let scope = Self::with_session(Arc::new(SqlSession::scoped(
            db.clone(),
            transaction,
            self.session.timeout(),
        )));
        let outcome = work(&scope).await;
        let staged = scope.session.take_pending();

        match (outcome, scope.session.take().await) {
            (Ok(value), Some(transaction)) => {
                scope.commit(staged, transaction).await?;
                Ok(value)
            }
            (Ok(_), None) => Err(AppError::transaction_aborted(
                "a failed operation rolled the transaction back",
            )),
            (Err(err), Some(transaction)) => {
                rollback(transaction).await;
                tracing::warn!(error = %err, "Transaction work failed, rolled back");
                Err(err)
            }
            (Err(err), None) => Err(err),
        }
    }

    async fn dispose(&self) -> AppResult<()> {
        if let Some(transaction) = self.session.take().await {
            let discarded = self.session.take_pending();
            transaction.rollback().await.map_err(|err| {
                tracing::error!("Failed to rollback transaction: {}", err);
                AppError::from(err)
            })?;
            tracing::debug!(discarded, "Database session disposed");
        }
        Ok(())
    }

    async fn reset(&self) {
        // Dropping the handle lets the driver roll back
        drop(self.session.take().await);
        self.session.take_pending();
    }
}

/// Hands out one [`SqlUnitOfWork`] per use-case invocation.
#[derive(Clone)]
pub struct SqlUnitOfWorkFactory {
    db: DatabaseConnection,
    timeout: Option<Duration>,
}

impl SqlUnitOfWorkFactory {
    pub fn new(db: DatabaseConnection, timeout: Option<Duration>) -> Self {
        Self { db, timeout }
    }
}

impl UnitOfWorkFactory for SqlUnitOfWorkFactory {
    type UnitOfWork = SqlUnitOfWork;

    fn create(&self) -> SqlUnitOfWork {
        SqlUnitOfWork::new(self.db.clone(), self.timeout)
    }
}
