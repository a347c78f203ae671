//! Transaction plumbing shared by the queue operations
//!
//! A transaction that is dropped before `commit()` is rolled back, so an
//! operation cancelled by its deadline leaves no partial state behind.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, SubsecRound, Utc};
use sea_orm::{
    ConnectionTrait, DatabaseBackend, DatabaseConnection, DatabaseTransaction, IsolationLevel,
    TransactionTrait,
};
use tracing::warn;

use crate::error::{QueueError, QueueResult};

/// Begin a queue transaction
///
/// On PostgreSQL the transaction runs at READ COMMITTED (row locks do the
/// serialization) and carries a `statement_timeout` equal to `deadline`.
pub async fn begin(db: &DatabaseConnection, deadline: Duration) -> QueueResult<DatabaseTransaction> {
    match db.get_database_backend() {
        DatabaseBackend::Postgres => {
            let txn = db
                .begin_with_config(Some(IsolationLevel::ReadCommitted), None)
                .await?;
            txn.execute_unprepared(&format!(
                "SET LOCAL statement_timeout = {}",
                deadline.as_millis()
            ))
            .await?;
            Ok(txn)
        }
        _ => Ok(db.begin().await?),
    }
}

/// Run `operation` with an upper bound on its duration
pub async fn with_deadline<T, F>(deadline: Duration, operation: F) -> QueueResult<T>
where
    F: Future<Output = QueueResult<T>>,
{
    match tokio::time::timeout(deadline, operation).await {
        Ok(result) => result,
        Err(_) => {
            warn!(timeout_ms = deadline.as_millis() as u64, "Queue operation timed out");
            Err(QueueError::Timeout(deadline))
        }
    }
}

/// Run `work` under `deadline`, then commit the transaction it hands back
///
/// Only the pre-commit work is bounded. A deadline hit drops the transaction
/// uncommitted; once COMMIT is sent the outcome is awaited in full, so a
/// `Timeout` always means nothing was applied.
pub async fn commit_within<T, F>(deadline: Duration, work: F) -> QueueResult<T>
where
    F: Future<Output = QueueResult<(DatabaseTransaction, T)>>,
{
    let (txn, value) = with_deadline(deadline, work).await?;
    txn.commit().await?;
    Ok(value)
}

/// `now`, or one microsecond past `latest` when the clock has fallen behind it
pub fn monotonic_after(
    now: DateTime<FixedOffset>,
    latest: Option<DateTime<FixedOffset>>,
) -> DateTime<FixedOffset> {
    match latest {
        Some(latest) if latest >= now => latest + chrono::Duration::microseconds(1),
        _ => now,
    }
}

/// Current time at the precision the store keeps (microseconds)
pub fn now() -> DateTime<FixedOffset> {
    Utc::now().trunc_subsecs(6).fixed_offset()
}
