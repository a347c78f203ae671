pub mod admin_queue;
pub mod public_queue;

use axum::{http::StatusCode, Json};
use tracing::warn;

use crate::error::{ErrorKind, QueueError};
use crate::models::queue_api::ErrorResponse;

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub(crate) fn api_error(status: StatusCode, error: impl Into<String>, code: &str) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            code: Some(code.to_string()),
        }),
    )
}

/// Map a queue engine error onto an HTTP response
///
/// Fatal errors are already logged by the engine and are not echoed back.
pub(crate) fn queue_error_response(err: QueueError) -> ApiError {
    match &err {
        QueueError::VenueNotFound(_) => {
            api_error(StatusCode::NOT_FOUND, "Venue not found", "VENUE_NOT_FOUND")
        }
        QueueError::EntryNotFound(_) => {
            api_error(StatusCode::NOT_FOUND, "Queue entry not found", "ENTRY_NOT_FOUND")
        }
        QueueError::InvalidTransition { .. } => {
            api_error(StatusCode::CONFLICT, err.to_string(), "INVALID_TRANSITION")
        }
        QueueError::IdempotencyKeyConflict(_) => api_error(
            StatusCode::CONFLICT,
            "Idempotency key was already used for another venue",
            "IDEMPOTENCY_KEY_CONFLICT",
        ),
        QueueError::InvalidInput(msg) => {
            api_error(StatusCode::BAD_REQUEST, msg.clone(), "INVALID_INPUT")
        }
        _ if err.kind() == ErrorKind::Transient => {
            warn!(error = %err, "Transient queue failure");
            api_error(
                StatusCode::SERVICE_UNAVAILABLE,
                "Queue temporarily unavailable, please retry",
                "RETRY",
            )
        }
        _ => api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error",
            "INTERNAL",
        ),
    }
}
