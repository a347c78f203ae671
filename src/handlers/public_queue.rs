//! Public queue handlers
//!
//! Endpoints hit by customers after scanning a venue's QR code.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use tracing::{info, warn};

use crate::handlers::{api_error, queue_error_response, ApiError};
use crate::models::queue_api::{
    status_message, JoinQueueRequest, QueueEntryResponse, QueueStatusQuery, QueueStatusResponse,
};
use crate::services::queue::EnqueueOutcome;
use crate::services::venue;
use crate::services::wait_time::estimate_wait;
use crate::AppState;

/// Join a venue's queue
///
/// POST /api/public/{slug}/queue
///
/// # Request Body
///
/// ```json
/// {
///   "name": "Ada",
///   "contactNumber": "+14155550100",
///   "partySize": 2,
///   "seatingPreference": "Indoor",
///   "idempotencyKey": "6f9619ff-8b86-d011-b42d-00cf4fc964ff"
/// }
/// ```
///
/// Returns 201 with the new entry, or 200 with the original entry when the
/// idempotency key was already used at this venue. A key first used at
/// another venue is rejected with 409.
pub async fn join_queue(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(payload): Json<JoinQueueRequest>,
) -> Result<(StatusCode, Json<QueueEntryResponse>), ApiError> {
    let venue = venue::find_venue_by_slug(&state.db, &slug)
        .await
        .map_err(queue_error_response)?;

    let (details, idempotency_key) = payload.validate().map_err(|e| {
        warn!(slug = %slug, error = %e, "Rejected queue join request");
        api_error(StatusCode::BAD_REQUEST, e, "INVALID_INPUT")
    })?;

    let outcome = state
        .queue
        .enqueue(venue.id, details, idempotency_key)
        .await
        .map_err(queue_error_response)?;

    let average = venue.average_minutes_per_party.max(0) as u32;

    match outcome {
        EnqueueOutcome::Created(entry) => {
            let position = u64::from(entry.position_snapshot);
            let wait = estimate_wait(entry.position_snapshot.saturating_sub(1), average);
            info!(slug = %slug, token = %entry.token, position, "Customer joined queue");
            Ok((
                StatusCode::CREATED,
                Json(QueueEntryResponse::new(entry, position, wait)),
            ))
        }
        EnqueueOutcome::DuplicateSubmission(entry) => {
            let position = state
                .queue
                .position_of_entry(&entry)
                .await
                .map_err(queue_error_response)?;
            let wait = estimate_wait(ahead(position), average);
            Ok((StatusCode::OK, Json(QueueEntryResponse::new(entry, position, wait))))
        }
    }
}

/// Live status of one entry
///
/// GET /api/public/{slug}/queue-status?entryId=...
pub async fn get_queue_status(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<QueueStatusQuery>,
) -> Result<Json<QueueStatusResponse>, ApiError> {
    let venue = venue::find_venue_by_slug(&state.db, &slug)
        .await
        .map_err(queue_error_response)?;

    let entry = state
        .queue
        .find_entry(query.entry_id)
        .await
        .map_err(queue_error_response)?;

    if entry.venue_id != venue.id {
        return Err(api_error(
            StatusCode::NOT_FOUND,
            "Queue entry not found",
            "ENTRY_NOT_FOUND",
        ));
    }

    let position = state
        .queue
        .position_of_entry(&entry)
        .await
        .map_err(queue_error_response)?;
    let wait = estimate_wait(ahead(position), venue.average_minutes_per_party.max(0) as u32);

    Ok(Json(QueueStatusResponse {
        message: status_message(entry.status, position),
        token: entry.token,
        position,
        estimated_wait_minutes: wait.minutes,
        estimated_wait: wait.friendly,
        status: entry.status,
    }))
}

/// Parties in front of a 1-indexed position
pub(crate) fn ahead(position: u64) -> u32 {
    u32::try_from(position.saturating_sub(1)).unwrap_or(u32::MAX)
}
