pub use sea_orm_migration::prelude::*;

mod m20260301_000001_create_venues;
mod m20260301_000002_create_queue_entries;
mod m20260301_000003_create_venue_sequences;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260301_000001_create_venues::Migration),
            Box::new(m20260301_000002_create_queue_entries::Migration),
            Box::new(m20260301_000003_create_venue_sequences::Migration),
        ]
    }
}
