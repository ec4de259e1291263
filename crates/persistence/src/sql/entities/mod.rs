//! SeaORM entities, one per table.

pub mod label;
pub mod refresh_token;
pub mod task;
pub mod task_label;
pub mod user;
