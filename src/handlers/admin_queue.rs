//! Staff queue handlers
//!
//! Dashboard endpoints scoped by venue id. Authentication is handled in
//! front of this service.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use tracing::info;
use uuid::Uuid;

use crate::handlers::public_queue::ahead;
use crate::handlers::{api_error, queue_error_response, ApiError};
use crate::models::queue_api::{
    CallNextResponse, ClearCompletedResponse, ListQueueQuery, QueueEntryResponse,
    QueueListResponse, QueueStatsResponse, UpdateStatusRequest,
};
use crate::models::queue_entry::QueueStatus;
use crate::services::position::rank_among;
use crate::services::queue::CallNextOutcome;
use crate::services::venue;
use crate::services::wait_time::estimate_wait;
use crate::AppState;

/// List a venue's entries in FIFO order
///
/// GET /api/admin/{venue_id}/queue?status=WAITING
pub async fn list_queue(
    State(state): State<AppState>,
    Path(venue_id): Path<Uuid>,
    Query(query): Query<ListQueueQuery>,
) -> Result<Json<QueueListResponse>, ApiError> {
    let venue = venue::find_venue(&state.db, venue_id)
        .await
        .map_err(queue_error_response)?;
    let average = venue.average_minutes_per_party.max(0) as u32;

    let entries = state
        .queue
        .list_entries(venue_id, query.status)
        .await
        .map_err(queue_error_response)?;

    let waiting = if query.status == Some(QueueStatus::Waiting) {
        entries.clone()
    } else {
        state
            .queue
            .list_entries(venue_id, Some(QueueStatus::Waiting))
            .await
            .map_err(queue_error_response)?
    };

    let entries: Vec<QueueEntryResponse> = entries
        .into_iter()
        .map(|entry| {
            let position = rank_among(&waiting, &entry);
            let wait = estimate_wait(ahead(position), average);
            QueueEntryResponse::new(entry, position, wait)
        })
        .collect();

    Ok(Json(QueueListResponse {
        total: entries.len(),
        entries,
    }))
}

/// GET /api/admin/{venue_id}/queue/stats
pub async fn queue_stats(
    State(state): State<AppState>,
    Path(venue_id): Path<Uuid>,
) -> Result<Json<QueueStatsResponse>, ApiError> {
    let venue = venue::find_venue(&state.db, venue_id)
        .await
        .map_err(queue_error_response)?;

    let stats = state
        .queue
        .queue_stats(&venue)
        .await
        .map_err(queue_error_response)?;

    Ok(Json(QueueStatsResponse {
        waiting_count: stats.waiting_count,
        estimated_wait_minutes: stats.estimated_wait.minutes,
        estimated_wait: stats.estimated_wait.friendly,
    }))
}

/// Call the next waiting customer
///
/// POST /api/admin/{venue_id}/queue/call-next
///
/// Returns 404 with code `QUEUE_EMPTY` when nobody is waiting.
pub async fn call_next(
    State(state): State<AppState>,
    Path(venue_id): Path<Uuid>,
) -> Result<Json<CallNextResponse>, ApiError> {
    let venue = venue::find_venue(&state.db, venue_id)
        .await
        .map_err(queue_error_response)?;

    let outcome = state
        .queue
        .call_next(venue_id)
        .await
        .map_err(queue_error_response)?;

    let entry = match outcome {
        CallNextOutcome::Called(entry) => entry,
        CallNextOutcome::EmptyQueue => {
            return Err(api_error(
                StatusCode::NOT_FOUND,
                "No customers waiting in queue",
                "QUEUE_EMPTY",
            ));
        }
    };

    let position = state
        .queue
        .position_of_entry(&entry)
        .await
        .map_err(queue_error_response)?;
    let wait = estimate_wait(ahead(position), venue.average_minutes_per_party.max(0) as u32);
    let message = format!("Called customer {}", entry.token);

    Ok(Json(CallNextResponse {
        entry: QueueEntryResponse::new(entry, position, wait),
        message,
    }))
}

/// Change an entry's status
///
/// PATCH /api/admin/{venue_id}/queue/{entry_id}
///
/// ```json
/// { "status": "SEATED" }
/// ```
///
/// Returns 409 when the transition is not allowed from the current status.
pub async fn update_entry_status(
    State(state): State<AppState>,
    Path((venue_id, entry_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<QueueEntryResponse>, ApiError> {
    let venue = venue::find_venue(&state.db, venue_id)
        .await
        .map_err(queue_error_response)?;

    let entry = state
        .queue
        .transition_status_in_venue(venue_id, entry_id, payload.status)
        .await
        .map_err(queue_error_response)?;

    let position = state
        .queue
        .position_of_entry(&entry)
        .await
        .map_err(queue_error_response)?;
    let wait = estimate_wait(ahead(position), venue.average_minutes_per_party.max(0) as u32);

    Ok(Json(QueueEntryResponse::new(entry, position, wait)))
}

/// Delete the venue's seated, no-show and cancelled entries
///
/// POST /api/admin/{venue_id}/queue/clear-completed
pub async fn clear_completed(
    State(state): State<AppState>,
    Path(venue_id): Path<Uuid>,
) -> Result<Json<ClearCompletedResponse>, ApiError> {
    venue::find_venue(&state.db, venue_id)
        .await
        .map_err(queue_error_response)?;

    let deleted = state
        .queue
        .clear_completed(venue_id)
        .await
        .map_err(queue_error_response)?;

    info!(venue_id = %venue_id, deleted, "Completed entries cleared by staff");
    Ok(Json(ClearCompletedResponse { deleted }))
}
