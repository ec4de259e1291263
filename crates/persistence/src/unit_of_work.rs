//! Unit of Work contract shared by both backends.
//!
//! A unit of work owns one repository per entity type and at most one open
//! session (a native transaction or a pending write batch). The session opens
//! lazily on the first mutation and closes on `save_changes`, `dispose` or
//! `reset`. One unit of work is used by one logical task at a time.

use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;
use common::AppResult;
use domain::{Label, RefreshToken, Task, User};

use crate::repository::Repository;

/// Future returned by a `with_transaction` body.
pub type TransactionWork<'a, T> = Pin<Box<dyn Future<Output = AppResult<T>> + Send + 'a>>;

#[async_trait]
pub trait UnitOfWork: Send + Sync + Sized {
    fn users(&self) -> &dyn Repository<User>;
    fn tasks(&self) -> &dyn Repository<Task>;
    fn labels(&self) -> &dyn Repository<Label>;
    fn refresh_tokens(&self) -> &dyn Repository<RefreshToken>;

    /// Mutations staged since the session opened.
    fn pending_operations(&self) -> u64;

    async fn has_open_session(&self) -> bool;

    /// Commit the open session and return how many staged operations it held.
    ///
    /// With no open session this is a no-op returning 0. A rejected commit
    /// surfaces as `TransactionAborted`; the session is closed either way.
    async fn save_changes(&self) -> AppResult<u64>;

    /// Run `work` inside a fresh, isolated unit of work and commit it when
    /// the work succeeds. The work must not call `save_changes` to finish;
    /// if it does, the call only reports the staged count. Failure inside
    /// `work` discards everything it staged. A session already open on
    /// `self` is left untouched.
    async fn with_transaction<F, T>(&self, work: F) -> AppResult<T>
    where
        F: for<'a> FnOnce(&'a Self) -> TransactionWork<'a, T> + Send,
        T: Send;

    /// Abort the open session, if any.
    async fn dispose(&self) -> AppResult<()>;

    /// Forget the open session and staged state without touching the store.
    async fn reset(&self);
}

/// Creates one unit of work per request or use-case invocation.
pub trait UnitOfWorkFactory: Send + Sync + 'static {
    type UnitOfWork: UnitOfWork + 'static;

    fn create(&self) -> Self::UnitOfWork;
}

/// Run a block inside `UnitOfWork::with_transaction`.
///
/// ```ignore
/// let user = with_transaction!(uow, |tx| {
///     let user = tx.users().add(user).await?;
///     Ok::<_, AppError>(user)
/// })?;
/// ```
#[macro_export]
macro_rules! with_transaction {
    ($uow:expr, |$tx:ident| $body:block) => {
        $uow.with_transaction(|$tx| Box::pin(async move { $body }))
            .await
    };
}
