//! Migration to create the venue_sequences table
//!
//! Per-venue monotonic counter backing sequence-based queue tokens.

use sea_orm_migration::{prelude::*, schema::*};

use crate::m20260301_000001_create_venues::Venues;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(VenueSequences::Table)
                    .if_not_exists()
                    .col(uuid(VenueSequences::VenueId).primary_key())
                    .col(big_integer(VenueSequences::CurrentValue).default(0))
                    .col(
                        timestamp_with_time_zone(VenueSequences::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_venue_sequences_venue_id")
                            .from(VenueSequences::Table, VenueSequences::VenueId)
                            .to(Venues::Table, Venues::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(VenueSequences::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum VenueSequences {
    Table,
    VenueId,
    CurrentValue,
    UpdatedAt,
}
