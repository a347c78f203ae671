//! Migration to create the queue_entries table
//!
//! `id` is an auto-increment insertion sequence used to break `created_at`
//! ties in FIFO ordering. `uuid` is the public identifier.

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
                    .table(QueueEntries::Table)
                    .if_not_exists()
                    .col(pk_auto(QueueEntries::Id))
                    .col(uuid_uniq(QueueEntries::Uuid))
                    .col(uuid(QueueEntries::VenueId))
                    .col(string_len(QueueEntries::Name, 100))
                    .col(string_len(QueueEntries::ContactNumber, 20))
                    .col(integer(QueueEntries::PartySize))
                    .col(string_len_null(QueueEntries::SeatingPreference, 16))
                    .col(string_len(QueueEntries::Status, 16))
                    .col(string_len(QueueEntries::Token, 32))
                    .col(integer(QueueEntries::PositionSnapshot))
                    .col(string_len_null(QueueEntries::IdempotencyKey, 64))
                    .col(
                        timestamp_with_time_zone(QueueEntries::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(QueueEntries::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_queue_entries_venue_id")
                            .from(QueueEntries::Table, QueueEntries::VenueId)
                            .to(Venues::Table, Venues::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // FIFO scans: waiting entries of a venue in creation order
        manager
            .create_index(
                Index::create()
                    .name("idx_queue_entries_venue_status_created")
                    .table(QueueEntries::Table)
                    .col(QueueEntries::VenueId)
                    .col(QueueEntries::Status)
                    .col(QueueEntries::CreatedAt)
                    .to_owned(),
            )
            .await?;

        // Token is unique per venue
        manager
            .create_index(
                Index::create()
                    .name("idx_queue_entries_venue_token")
                    .table(QueueEntries::Table)
                    .col(QueueEntries::VenueId)
                    .col(QueueEntries::Token)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Idempotency key is unique system-wide when present (NULLs are distinct)
        manager
            .create_index(
                Index::create()
                    .name("idx_queue_entries_idempotency_key")
                    .table(QueueEntries::Table)
                    .col(QueueEntries::IdempotencyKey)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(QueueEntries::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum QueueEntries {
    Table,
    Id,
    Uuid,
    VenueId,
    Name,
    ContactNumber,
    PartySize,
    SeatingPreference,
    Status,
    Token,
    PositionSnapshot,
    IdempotencyKey,
    CreatedAt,
    UpdatedAt,
}
