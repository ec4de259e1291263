//! Migration: Create labels table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Labels::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Labels::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Labels::Name).string().not_null())
                    .col(ColumnDef::new(Labels::NormalizedName).string().not_null())
                    .col(ColumnDef::new(Labels::Color).string().not_null())
                    .col(ColumnDef::new(Labels::CreatedBy).string().not_null())
                    .col(
                        ColumnDef::new(Labels::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Labels::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Labels::UpdatedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Label names are looked up per owner
        manager
            .create_index(
                Index::create()
                    .name("idx_labels_owner_name")
                    .table(Labels::Table)
                    .col(Labels::CreatedBy)
                    .col(Labels::NormalizedName)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Labels::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Labels {
    Table,
    Id,
    Name,
    NormalizedName,
    Color,
    CreatedBy,
    IsActive,
    CreatedAt,
    UpdatedAt,
}
