//! Relational backend on SeaORM.
//!
//! Every unit of work owns one lazily opened transaction. Staged writes are
//! real statements inside it, so reads through the same unit of work see
//! them and other units of work do not.

mod context;
pub mod entities;
mod mapper;
pub mod migrations;
mod repository;
mod session;
mod translator;
mod unit_of_work;

pub use context::SqlContext;
pub use mapper::{
    LabelSqlMapper, RefreshTokenSqlMapper, SqlMapper, TaskSqlMapper, UserSqlMapper,
};
pub use migrations::Migrator;
pub use repository::SqlRepository;
pub use translator::{translate, SqlQuery};
pub use unit_of_work::{SqlUnitOfWork, SqlUnitOfWorkFactory};
