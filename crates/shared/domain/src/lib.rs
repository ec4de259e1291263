//! Domain layer - entities, value objects and the query model.
//!
//! This crate contains pure domain logic with no infrastructure dependencies.
//! Both persistence backends and the services build on the types here.

pub mod constants;
pub mod email;
pub mod entity;
pub mod error;
pub mod label;
pub mod query;
pub mod refresh_token;
pub mod task;
pub mod user;

pub use constants::*;
pub use email::Email;
pub use entity::{Entity, Identity};
pub use error::{DomainError, DomainResult};
pub use label::{Label, LabelField, NormalizedName};
pub use query::{
    EntityField, FieldKind, FilterDescriptor, FilterValue, Operator, PagedResult, Pagination,
    Query, Scalar, SortDescriptor, SortDirection,
};
pub use refresh_token::{ClientInfo, RefreshToken, RefreshTokenField};
pub use task::{Task, TaskField, TaskStatus};
pub use user::{User, UserField};
