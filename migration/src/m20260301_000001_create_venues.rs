//! Migration to create the venues table
//!
//! One row per venue owning an independent walk-in queue.

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Venues::Table)
                    .if_not_exists()
                    .col(uuid(Venues::Id).primary_key())
                    .col(string_len(Venues::Name, 100).not_null())
                    .col(string_len_uniq(Venues::Slug, 64).not_null())
                    .col(integer(Venues::AverageMinutesPerParty).default(10))
                    .col(
                        timestamp_with_time_zone(Venues::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(Venues::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Venues::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub(crate) enum Venues {
    Table,
    Id,
    Name,
    Slug,
    AverageMinutesPerParty,
    CreatedAt,
    UpdatedAt,
}
