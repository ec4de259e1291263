//! Use cases built on the unit of work.

mod auth_service;
mod label_service;
mod task_service;

pub use auth_service::{AuthManager, AuthService};
pub use label_service::{LabelManager, LabelService};
pub use task_service::{TaskManager, TaskService};
