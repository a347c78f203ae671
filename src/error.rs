//! Error types for the queue engine
//!
//! Every failure is classified as expected (actionable by the caller),
//! transient (safe to retry with backoff) or fatal (logged and surfaced).

use std::time::Duration;

use sea_orm::{sqlx, DbErr, RuntimeErr, SqlErr};
use thiserror::Error;
use uuid::Uuid;

use crate::models::queue_entry::QueueStatus;

pub type QueueResult<T> = Result<T, QueueError>;

/// Broad classification used by callers to decide how to react
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Expected,
    Transient,
    Fatal,
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Venue not found: {0}")]
    VenueNotFound(String),

    #[error("Queue entry not found: {0}")]
    EntryNotFound(Uuid),

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: QueueStatus, to: QueueStatus },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Idempotency key {0} belongs to another venue")]
    IdempotencyKeyConflict(String),

    #[error("Failed to generate unique token after {attempts} attempts")]
    AllocationExhausted { attempts: u32 },

    #[error("Transaction timed out after {0:?}")]
    Timeout(Duration),

    #[error("Database unavailable: {0}")]
    Unavailable(String),

    #[error("Data integrity violation: {0}")]
    IntegrityViolation(String),

    #[error("Database error: {0}")]
    Database(DbErr),
}

impl QueueError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            QueueError::VenueNotFound(_)
            | QueueError::EntryNotFound(_)
            | QueueError::InvalidTransition { .. }
            | QueueError::InvalidInput(_)
            | QueueError::IdempotencyKeyConflict(_) => ErrorKind::Expected,
            QueueError::Timeout(_) | QueueError::Unavailable(_) => ErrorKind::Transient,
            QueueError::AllocationExhausted { .. }
            | QueueError::IntegrityViolation(_)
            | QueueError::Database(_) => ErrorKind::Fatal,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }

    /// Whether this is a unique-index breach on the idempotency key column
    pub(crate) fn is_idempotency_conflict(&self) -> bool {
        matches!(self, QueueError::IntegrityViolation(msg) if msg.contains("idempotency_key"))
    }
}

/// PostgreSQL SQLSTATEs that clear up on retry: query_canceled (our own
/// `statement_timeout`), lock_not_available, serialization_failure,
/// deadlock_detected
const TRANSIENT_SQLSTATES: [&str; 4] = ["57014", "55P03", "40001", "40P01"];

pub(crate) fn is_transient_sqlstate(code: &str) -> bool {
    TRANSIENT_SQLSTATES.contains(&code)
}

/// Message of a database error whose SQLSTATE is transient
fn transient_database_error(err: &DbErr) -> Option<String> {
    let runtime = match err {
        DbErr::Exec(e) | DbErr::Query(e) | DbErr::Conn(e) => e,
        _ => return None,
    };
    let RuntimeErr::SqlxError(sqlx::Error::Database(db_err)) = runtime else {
        return None;
    };
    let code = db_err.code()?;

    is_transient_sqlstate(&code).then(|| format!("{} ({})", db_err.message(), code))
}

impl From<DbErr> for QueueError {
    fn from(err: DbErr) -> Self {
        if let Some(SqlErr::UniqueConstraintViolation(msg)) = err.sql_err() {
            return QueueError::IntegrityViolation(msg);
        }

        if let Some(msg) = transient_database_error(&err) {
            return QueueError::Unavailable(msg);
        }

        match err {
            DbErr::ConnectionAcquire(e) => QueueError::Unavailable(e.to_string()),
            DbErr::Conn(RuntimeErr::SqlxError(e)) => QueueError::Unavailable(e.to_string()),
            other => QueueError::Database(other),
        }
    }
}
