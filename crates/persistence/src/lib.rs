//! Persistence layer: repositories and units of work over two backends.
//!
//! Use-cases depend only on [`Repository`], [`UnitOfWork`] and
//! [`UnitOfWorkFactory`]. A deployment picks one backend at startup:
//! - [`sql`]: sea-orm over Postgres or SQLite, with native transactions
//! - [`document`]: a document store (Redis or in-memory) with atomic batches

pub mod document;
pub mod finders;
pub mod identity;
pub mod repository;
pub mod sql;
pub mod unit_of_work;

pub use finders::{LabelFinder, RefreshTokenFinder, TaskFinder, UserFinder};
pub use identity::{parse_identity, require_identity};
pub use repository::Repository;
pub use unit_of_work::{TransactionWork, UnitOfWork, UnitOfWorkFactory};
