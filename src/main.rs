use sea_orm::{ConnectOptions, Database};
use sea_orm_migration::MigratorTrait;
use std::env;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use waitlist_backend::config::QueueConfig;
use waitlist_backend::jobs::queue_retention_job::start_queue_retention_job;
use waitlist_backend::services::notifications::notifier_for_provider;
use waitlist_backend::services::queue::QueueService;
use waitlist_backend::{build_router, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,waitlist_backend=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let database_url = env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set")?;
    let config = QueueConfig::from_env();

    tracing::info!("Connecting to database...");
    let mut options = ConnectOptions::new(database_url);
    options.sqlx_logging(false);
    let db = Database::connect(options).await?;

    tracing::info!("Running migrations...");
    migration::Migrator::up(&db, None).await?;

    let bind_addr = config.bind_addr.clone();
    let notifier = notifier_for_provider(&config.notification_provider);
    let queue = QueueService::new(db.clone(), config).with_notifier(notifier);

    start_queue_retention_job(queue.clone()).await;

    let state = AppState { db, queue };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
