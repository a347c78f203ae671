use chrono::{DateTime, FixedOffset};
use sea_orm::{
    ActiveModelTrait, ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, Set,
};
use sea_orm_migration::MigratorTrait;
use std::env;
use uuid::Uuid;

use waitlist_backend::config::{QueueConfig, TokenStrategy};
use waitlist_backend::entities::{queue_entries, venues};
use waitlist_backend::models::queue_entry::CustomerDetails;
use waitlist_backend::services::queue::QueueService;
use waitlist_backend::services::venue::{register_venue, NewVenue};
use waitlist_backend::AppState;

/// Set up test database connection
/// Uses TEST_DATABASE_URL environment variable or falls back to an
/// in-memory SQLite database held on a single connection
pub async fn setup_test_db() -> Result<DatabaseConnection, DbErr> {
    let database_url = env::var("TEST_DATABASE_URL").unwrap_or_else(|_| "sqlite::memory:".to_string());

    let mut options = ConnectOptions::new(database_url.clone());
    options.sqlx_logging(false);
    if database_url.starts_with("sqlite:") {
        // Every new in-memory connection is a fresh database
        options.max_connections(1).min_connections(1);
    }

    let db = Database::connect(options).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

#[allow(dead_code)]
pub async fn setup_queue(strategy: TokenStrategy) -> QueueService {
    let db = setup_test_db().await.expect("Failed to connect to test DB");
    let config = QueueConfig {
        token_strategy: strategy,
        ..QueueConfig::default()
    };
    QueueService::new(db, config)
}

#[allow(dead_code)]
pub async fn setup_app_state() -> AppState {
    let queue = setup_queue(TokenStrategy::Random).await;
    AppState {
        db: queue.db().clone(),
        queue,
    }
}

/// Register a venue with a slug unique to this test run
#[allow(dead_code)]
pub async fn create_venue(db: &DatabaseConnection, average_minutes_per_party: u32) -> venues::Model {
    let suffix = Uuid::new_v4().simple().to_string();
    register_venue(
        db,
        NewVenue {
            name: "Harbour Kitchen".to_string(),
            slug: format!("harbour-{}", &suffix[..12]),
            average_minutes_per_party: Some(average_minutes_per_party),
        },
    )
    .await
    .expect("Failed to register venue")
}

#[allow(dead_code)]
pub fn customer(name: &str) -> CustomerDetails {
    CustomerDetails {
        name: name.to_string(),
        contact_number: "+14155550100".to_string(),
        party_size: 2,
        seating_preference: None,
    }
}

/// Write a WAITING entry straight to the store, bypassing the engine
#[allow(dead_code)]
pub async fn insert_waiting_entry<C>(
    conn: &C,
    venue_id: Uuid,
    token: &str,
    created_at: DateTime<FixedOffset>,
) -> Result<queue_entries::Model, DbErr>
where
    C: ConnectionTrait,
{
    queue_entries::ActiveModel {
        uuid: Set(Uuid::new_v4()),
        venue_id: Set(venue_id),
        name: Set(format!("walk-in {}", token)),
        contact_number: Set("+14155550100".to_string()),
        party_size: Set(2),
        seating_preference: Set(None),
        status: Set("WAITING".to_string()),
        token: Set(token.to_string()),
        position_snapshot: Set(1),
        idempotency_key: Set(None),
        created_at: Set(created_at),
        updated_at: Set(created_at),
        ..Default::default()
    }
    .insert(conn)
    .await
}
