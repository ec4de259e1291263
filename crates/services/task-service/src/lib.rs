//! Task Service Library
//!
//! Task, label and account use cases over a pluggable persistence backend.
//! The binary wraps the operational commands exposed here.

pub mod config;
pub mod dto;
pub mod security;
pub mod service;

use std::sync::Arc;

use common::{AppResult, PersistenceBackend};
use domain::{Entity, Task};
use persistence::document::{DocumentContext, DocumentUnitOfWorkFactory};
use persistence::sql::{SqlContext, SqlUnitOfWorkFactory};
use persistence::{Repository, UnitOfWork, UnitOfWorkFactory};
use tracing::info;
use uuid::Uuid;

use crate::config::TaskServiceConfig;
use crate::dto::{CreateTaskRequest, SearchTasksRequest};
use crate::service::{TaskManager, TaskService};

/// Migration action type.
#[derive(Debug, Clone, Copy)]
pub enum MigrateAction {
    Up,
    Down,
    Status,
    Fresh,
}

/// Run migrations (for CLI commands). Only the SQL backend has a schema.
pub async fn run_migrations(action: MigrateAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = TaskServiceConfig::from_env();
    if config.persistence.backend != PersistenceBackend::Sql {
        info!(
            "Backend '{}' has no schema to migrate",
            config.persistence.backend
        );
        return Ok(());
    }

    let db = SqlContext::connect_without_migrations(&config.persistence.database).await?;

    match action {
        MigrateAction::Up => {
            db.run_migrations().await?;
            info!("Migrations applied successfully");
        }
        MigrateAction::Down => {
            db.rollback_migration().await?;
            info!("Rolled back last migration");
        }
        MigrateAction::Status => {
            let status = db.migration_status().await?;
            for (name, applied) in status {
                let marker = if applied { "[x]" } else { "[ ]" };
                println!("{} {}", marker, name);
            }
        }
        MigrateAction::Fresh => {
            db.fresh_migrations().await?;
            info!("Database reset and migrations applied");
        }
    }

    db.close().await?;
    Ok(())
}

/// Check that the configured backend is reachable.
pub async fn ping() -> Result<(), Box<dyn std::error::Error>> {
    let config = TaskServiceConfig::from_env();

    match config.persistence.backend {
        PersistenceBackend::Sql => {
            let db = SqlContext::connect_without_migrations(&config.persistence.database).await?;
            db.ping().await?;
            db.close().await?;
        }
        PersistenceBackend::Document => {
            let store = DocumentContext::connect(&config.persistence.document_store).await?;
            store.ping().await?;
            store.close().await;
        }
    }

    info!(backend = %config.persistence.backend, "Store is reachable");
    Ok(())
}

/// Write, query and remove a throwaway task on the configured backend.
pub async fn run_check() -> Result<(), Box<dyn std::error::Error>> {
    let config = TaskServiceConfig::from_env();
    let timeout = config.persistence.operation_timeout();

    match config.persistence.backend {
        PersistenceBackend::Sql => {
            let db = SqlContext::connect(&config.persistence.database).await?;
            let factory = SqlUnitOfWorkFactory::new(db.connection().clone(), timeout);
            round_trip(Arc::new(factory)).await?;
            db.close().await?;
        }
        PersistenceBackend::Document => {
            let store = DocumentContext::connect(&config.persistence.document_store).await?;
            let factory = DocumentUnitOfWorkFactory::new(store.store(), timeout);
            round_trip(Arc::new(factory)).await?;
            store.close().await;
        }
    }

    info!(backend = %config.persistence.backend, "Round trip succeeded");
    Ok(())
}

async fn round_trip<F: UnitOfWorkFactory>(factory: Arc<F>) -> AppResult<Task> {
    let owner = Uuid::new_v4().to_string();
    let tasks = TaskManager::new(factory.clone());

    let created = tasks
        .create_task(
            &owner,
            CreateTaskRequest {
                title: "Connectivity check".to_string(),
                ..Default::default()
            },
        )
        .await?;
    let found = tasks
        .search_tasks(&owner, SearchTasksRequest::default())
        .await?;
    if found.total_count != 1 || found.items.first().map(|t| t.id()) != Some(created.id()) {
        return Err(common::AppError::internal(format!(
            "Check task {} was not read back",
            created.id()
        )));
    }

    let uow = factory.create();
    uow.tasks().delete(&created).await?;
    uow.save_changes().await?;
    Ok(created)
}
