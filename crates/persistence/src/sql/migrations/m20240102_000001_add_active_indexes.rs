//! Migration: Index the soft delete flag on owned tables.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Listing a user's active tasks is the hot path
        manager
            .create_index(
                Index::create()
                    .name("idx_tasks_owner_active")
                    .table(Tasks::Table)
                    .col(Tasks::CreatedBy)
                    .col(Tasks::IsActive)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_labels_is_active")
                    .table(Labels::Table)
                    .col(Labels::IsActive)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_labels_is_active")
                    .table(Labels::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .name("idx_tasks_owner_active")
                    .table(Tasks::Table)
                    .to_owned(),
            )
            .await
    }
}

#[derive(DeriveIden)]
enum Tasks {
    Table,
    CreatedBy,
    IsActive,
}

#[derive(DeriveIden)]
enum Labels {
    Table,
    IsActive,
}
