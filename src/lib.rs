// src/lib.rs

use axum::{
    routing::{get, patch, post},
    Router,
};
use sea_orm::DatabaseConnection;
use services::queue::QueueService;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub queue: QueueService,
}

pub mod entities {
    pub mod prelude;
    pub mod queue_entries;
    pub mod venue_sequences;
    pub mod venues;
}

pub mod services {
    pub mod notifications;
    pub mod position;
    pub mod queue;
    pub mod token_allocator;
    pub mod transaction;
    pub mod venue;
    pub mod wait_time;
}

pub mod config;
pub mod error;
pub mod handlers;
pub mod jobs;
pub mod models;

/// Public and staff queue routes
pub fn build_router(state: AppState) -> Router {
    use handlers::{admin_queue, public_queue};

    Router::new()
        .route("/api/public/{slug}/queue", post(public_queue::join_queue))
        .route(
            "/api/public/{slug}/queue-status",
            get(public_queue::get_queue_status),
        )
        .route("/api/admin/{venue_id}/queue", get(admin_queue::list_queue))
        .route(
            "/api/admin/{venue_id}/queue/stats",
            get(admin_queue::queue_stats),
        )
        .route(
            "/api/admin/{venue_id}/queue/call-next",
            post(admin_queue::call_next),
        )
        .route(
            "/api/admin/{venue_id}/queue/clear-completed",
            post(admin_queue::clear_completed),
        )
        .route(
            "/api/admin/{venue_id}/queue/{entry_id}",
            patch(admin_queue::update_entry_status),
        )
        .with_state(state)
}
