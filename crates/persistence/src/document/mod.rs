//! Document backend: batch-only stores without interactive transactions.

mod context;
mod filter;
mod mapper;
mod memory;
mod redis_store;
mod repository;
mod session;
mod store;
mod translator;
mod unit_of_work;

pub use context::DocumentContext;
pub use filter::{Condition, DocumentFilter, DocumentQuery, Predicate, SortKey, ID_PATH};
pub use mapper::{
    to_date, DocumentMapper, LabelDocumentMapper, RefreshTokenDocumentMapper,
    TaskDocumentMapper, UserDocumentMapper,
};
pub use memory::InMemoryDocumentStore;
pub use redis_store::RedisDocumentStore;
pub use repository::DocumentRepository;
pub use store::{Document, DocumentStore, Fields, WriteBatch, WriteOp};
pub use translator::translate;
pub use unit_of_work::{DocumentUnitOfWork, DocumentUnitOfWorkFactory};
