//! Queue engine
//!
//! Enqueue, call-next and status transitions each run in one transaction
//! with a deadline, so they apply fully or not at all. The deadline covers
//! the work before COMMIT; a timed-out operation has changed nothing.
//!
//! Concurrency:
//! - Enqueue locks the venue row (`FOR UPDATE`), serializing token
//!   allocation and the position snapshot per venue.
//! - Call-next picks the earliest WAITING row with `FOR UPDATE SKIP LOCKED`
//!   and claims it with a conditional update, so concurrent callers always
//!   advance distinct entries and never wait on each other.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use sea_orm::{
    sea_query::{Expr, LockBehavior, LockType},
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::{QueueConfig, MAX_PARTY_SIZE, MIN_PARTY_SIZE};
use crate::entities::{prelude::*, queue_entries, venues};
use crate::error::{ErrorKind, QueueError, QueueResult};
use crate::models::queue_entry::{CustomerDetails, QueueEntry, QueueStatus};
use crate::services::notifications::{queue_called_message, LogNotifier, Notifier};
use crate::services::token_allocator::TokenAllocator;
use crate::services::wait_time::{estimate_wait, WaitEstimate};
use crate::services::{position, transaction, venue};

/// Claims attempted by one call-next before reporting contention
const MAX_CLAIM_ATTEMPTS: usize = 5;

/// Result of an enqueue request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Created(QueueEntry),
    /// The idempotency key was already used; carries the original entry
    DuplicateSubmission(QueueEntry),
}

impl EnqueueOutcome {
    pub fn entry(&self) -> &QueueEntry {
        match self {
            EnqueueOutcome::Created(entry) | EnqueueOutcome::DuplicateSubmission(entry) => entry,
        }
    }

    pub fn into_entry(self) -> QueueEntry {
        match self {
            EnqueueOutcome::Created(entry) | EnqueueOutcome::DuplicateSubmission(entry) => entry,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, EnqueueOutcome::DuplicateSubmission(_))
    }
}

/// Result of a call-next request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallNextOutcome {
    Called(QueueEntry),
    EmptyQueue,
}

/// Snapshot of a venue's line for dashboards
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueStats {
    pub waiting_count: u64,
    /// Wait a party joining now can expect
    pub estimated_wait: WaitEstimate,
}

#[derive(Clone)]
pub struct QueueService {
    db: DatabaseConnection,
    config: Arc<QueueConfig>,
    allocator: TokenAllocator,
    notifier: Arc<dyn Notifier>,
}

impl QueueService {
    pub fn new(db: DatabaseConnection, config: QueueConfig) -> Self {
        let allocator = TokenAllocator::new(config.token_strategy, config.token_max_attempts);
        Self {
            db,
            config: Arc::new(config),
            allocator,
            notifier: Arc::new(LogNotifier),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_token_allocator(mut self, allocator: TokenAllocator) -> Self {
        self.allocator = allocator;
        self
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Add a customer to the end of a venue's line
    pub async fn enqueue(
        &self,
        venue_id: Uuid,
        details: CustomerDetails,
        idempotency_key: Option<String>,
    ) -> QueueResult<EnqueueOutcome> {
        validate_party_size(details.party_size)?;

        let deadline = self.config.transaction_timeout;
        let key = idempotency_key.clone();
        let result = transaction::commit_within(deadline, async {
            let txn = transaction::begin(&self.db, deadline).await?;
            let outcome = self.enqueue_in(&txn, venue_id, details, key).await?;
            Ok((txn, outcome))
        })
        .await;

        match result {
            Ok(EnqueueOutcome::Created(entry)) => {
                info!(
                    venue_id = %venue_id,
                    entry_id = %entry.id,
                    token = %entry.token,
                    position = entry.position_snapshot,
                    "Queue entry created"
                );
                Ok(EnqueueOutcome::Created(entry))
            }
            Ok(duplicate) => {
                info!(venue_id = %venue_id, entry_id = %duplicate.entry().id, "Duplicate submission");
                Ok(duplicate)
            }
            Err(err) if err.is_idempotency_conflict() => {
                self.resolve_lost_insert_race(venue_id, idempotency_key.as_deref(), err)
                    .await
            }
            Err(err) => Err(log_failure("enqueue", err)),
        }
    }

    /// A concurrent enqueue inserted the same idempotency key first; the
    /// winner's entry is the answer
    pub(crate) async fn resolve_lost_insert_race(
        &self,
        venue_id: Uuid,
        idempotency_key: Option<&str>,
        err: QueueError,
    ) -> QueueResult<EnqueueOutcome> {
        let Some(key) = idempotency_key else {
            return Err(log_failure("enqueue", err));
        };

        match find_by_idempotency_key(&self.db, key).await? {
            Some(existing) => duplicate_in_venue(venue_id, key, existing),
            None => Err(log_failure("enqueue", err)),
        }
    }

    async fn enqueue_in(
        &self,
        txn: &DatabaseTransaction,
        venue_id: Uuid,
        details: CustomerDetails,
        idempotency_key: Option<String>,
    ) -> QueueResult<EnqueueOutcome> {
        // Venue row lock serializes enqueues for this venue only
        let venue = Venues::find_by_id(venue_id)
            .lock_exclusive()
            .one(txn)
            .await?
            .ok_or_else(|| QueueError::VenueNotFound(venue_id.to_string()))?;

        if let Some(key) = idempotency_key.as_deref() {
            if let Some(existing) = find_by_idempotency_key(txn, key).await? {
                return duplicate_in_venue(venue_id, key, existing);
            }
        }

        let token = self.allocator.allocate(txn, &venue).await?;
        let position_snapshot = position::waiting_count(txn, venue_id).await? + 1;
        // App clocks can step back or disagree; under the venue lock the new
        // entry is always stamped after the venue's latest one
        let now = transaction::monotonic_after(
            transaction::now(),
            latest_created_at(txn, venue_id).await?,
        );

        let model = queue_entries::ActiveModel {
            uuid: Set(Uuid::new_v4()),
            venue_id: Set(venue_id),
            name: Set(details.name),
            contact_number: Set(details.contact_number),
            party_size: Set(details.party_size as i32),
            seating_preference: Set(details.seating_preference.map(|p| p.to_string())),
            status: Set(QueueStatus::Waiting.to_string()),
            token: Set(token),
            position_snapshot: Set(position_snapshot as i32),
            idempotency_key: Set(idempotency_key),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(txn)
        .await?;

        Ok(EnqueueOutcome::Created(QueueEntry::try_from(model)?))
    }

    /// Call the earliest waiting customer of a venue
    ///
    /// The customer is notified after the transaction commits; a failed
    /// notification is logged and does not affect the result.
    pub async fn call_next(&self, venue_id: Uuid) -> QueueResult<CallNextOutcome> {
        let deadline = self.config.transaction_timeout;
        let result = transaction::commit_within(deadline, async {
            let txn = transaction::begin(&self.db, deadline).await?;
            let venue = venue::find_venue(&txn, venue_id).await?;
            let outcome = self.call_next_in(&txn, venue_id).await?;
            Ok((txn, (venue, outcome)))
        })
        .await;

        let (venue, outcome) = result.map_err(|err| log_failure("call_next", err))?;

        match &outcome {
            CallNextOutcome::Called(entry) => {
                info!(
                    venue_id = %venue_id,
                    entry_id = %entry.id,
                    token = %entry.token,
                    "Customer called"
                );
                self.notify_called(&venue, entry).await;
            }
            CallNextOutcome::EmptyQueue => {
                debug!(venue_id = %venue_id, "Call next on empty queue");
            }
        }

        Ok(outcome)
    }

    async fn call_next_in(
        &self,
        txn: &DatabaseTransaction,
        venue_id: Uuid,
    ) -> QueueResult<CallNextOutcome> {
        for attempt in 1..=MAX_CLAIM_ATTEMPTS {
            let candidate = QueueEntries::find()
                .filter(queue_entries::Column::VenueId.eq(venue_id))
                .filter(queue_entries::Column::Status.eq(QueueStatus::Waiting.as_str()))
                .order_by_asc(queue_entries::Column::CreatedAt)
                .order_by_asc(queue_entries::Column::Id)
                .lock_with_behavior(LockType::Update, LockBehavior::SkipLocked)
                .one(txn)
                .await?;

            let Some(model) = candidate else {
                return Ok(CallNextOutcome::EmptyQueue);
            };

            let mut entry = QueueEntry::try_from(model)?;
            let previous = entry.status;
            entry.transition_to(QueueStatus::Called, transaction::now())?;

            if claim(txn, &entry, previous).await? {
                return Ok(CallNextOutcome::Called(entry));
            }

            debug!(venue_id = %venue_id, attempt, "Lost claim on waiting entry, retrying");
        }

        Err(QueueError::Unavailable(format!(
            "Could not claim a waiting entry after {} attempts",
            MAX_CLAIM_ATTEMPTS
        )))
    }

    async fn notify_called(&self, venue: &venues::Model, entry: &QueueEntry) {
        let message = queue_called_message(&venue.name, &entry.token);
        if let Err(e) = self
            .notifier
            .send_queue_called(&entry.contact_number, &message)
            .await
        {
            warn!(
                entry_id = %entry.id,
                error = %e,
                "Failed to send queue called notification"
            );
        }
    }

    /// Move an entry to `target` if the transition table allows it
    pub async fn transition_status(
        &self,
        entry_id: Uuid,
        target: QueueStatus,
    ) -> QueueResult<QueueEntry> {
        self.transition(None, entry_id, target).await
    }

    /// Same as [`Self::transition_status`], but entries of other venues are
    /// reported as not found
    pub async fn transition_status_in_venue(
        &self,
        venue_id: Uuid,
        entry_id: Uuid,
        target: QueueStatus,
    ) -> QueueResult<QueueEntry> {
        self.transition(Some(venue_id), entry_id, target).await
    }

    async fn transition(
        &self,
        venue_scope: Option<Uuid>,
        entry_id: Uuid,
        target: QueueStatus,
    ) -> QueueResult<QueueEntry> {
        let deadline = self.config.transaction_timeout;
        let result = transaction::commit_within(deadline, async {
            let txn = transaction::begin(&self.db, deadline).await?;

            let model = QueueEntries::find()
                .filter(queue_entries::Column::Uuid.eq(entry_id))
                .lock_exclusive()
                .one(&txn)
                .await?
                .filter(|m| venue_scope.is_none_or(|venue_id| m.venue_id == venue_id))
                .ok_or(QueueError::EntryNotFound(entry_id))?;

            let mut entry = QueueEntry::try_from(model)?;
            let previous = entry.status;
            entry.transition_to(target, transaction::now())?;

            if !claim(&txn, &entry, previous).await? {
                return Err(QueueError::Unavailable(format!(
                    "Entry {} changed concurrently",
                    entry_id
                )));
            }

            Ok((txn, (previous, entry)))
        })
        .await;

        let (previous, entry) = result.map_err(|err| log_failure("transition_status", err))?;
        info!(
            entry_id = %entry.id,
            from = %previous,
            to = %entry.status,
            "Queue entry status changed"
        );
        Ok(entry)
    }

    pub async fn find_entry(&self, entry_id: Uuid) -> QueueResult<QueueEntry> {
        find_by_uuid(&self.db, entry_id)
            .await?
            .ok_or(QueueError::EntryNotFound(entry_id))
    }

    /// Current 1-indexed position of an entry; 0 once terminal
    pub async fn position_of(&self, entry_id: Uuid) -> QueueResult<u64> {
        let entry = self.find_entry(entry_id).await?;
        position::position_of_entry(&self.db, &entry).await
    }

    /// Position of an already loaded entry, computed against the store
    pub async fn position_of_entry(&self, entry: &QueueEntry) -> QueueResult<u64> {
        position::position_of_entry(&self.db, entry).await
    }

    /// Entries of a venue in FIFO order, optionally restricted to one status
    pub async fn list_entries(
        &self,
        venue_id: Uuid,
        status: Option<QueueStatus>,
    ) -> QueueResult<Vec<QueueEntry>> {
        let mut select = QueueEntries::find().filter(queue_entries::Column::VenueId.eq(venue_id));

        if let Some(status) = status {
            select = select.filter(queue_entries::Column::Status.eq(status.as_str()));
        }

        select
            .order_by_asc(queue_entries::Column::CreatedAt)
            .order_by_asc(queue_entries::Column::Id)
            .all(&self.db)
            .await?
            .into_iter()
            .map(QueueEntry::try_from)
            .collect()
    }

    pub async fn queue_stats(&self, venue: &venues::Model) -> QueueResult<QueueStats> {
        let waiting_count = position::waiting_count(&self.db, venue.id).await?;
        let estimated_wait = estimate_wait(
            u32::try_from(waiting_count).unwrap_or(u32::MAX),
            venue.average_minutes_per_party.max(0) as u32,
        );

        Ok(QueueStats {
            waiting_count,
            estimated_wait,
        })
    }

    /// Delete a venue's terminal entries
    pub async fn clear_completed(&self, venue_id: Uuid) -> QueueResult<u64> {
        let result = QueueEntries::delete_many()
            .filter(queue_entries::Column::VenueId.eq(venue_id))
            .filter(queue_entries::Column::Status.is_in(terminal_statuses()))
            .exec(&self.db)
            .await?;

        info!(venue_id = %venue_id, deleted = result.rows_affected, "Cleared completed entries");
        Ok(result.rows_affected)
    }

    /// Delete terminal entries of every venue last updated before `cutoff`
    pub async fn purge_terminal_older_than(&self, cutoff: DateTime<FixedOffset>) -> QueueResult<u64> {
        let result = QueueEntries::delete_many()
            .filter(queue_entries::Column::Status.is_in(terminal_statuses()))
            .filter(queue_entries::Column::UpdatedAt.lt(cutoff))
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected)
    }
}

/// Persist `entry.status` only if the row still holds `expected`
///
/// Returns whether exactly one row was updated.
async fn claim<C>(conn: &C, entry: &QueueEntry, expected: QueueStatus) -> QueueResult<bool>
where
    C: ConnectionTrait,
{
    let result = QueueEntries::update_many()
        .col_expr(
            queue_entries::Column::Status,
            Expr::value(entry.status.as_str()),
        )
        .col_expr(queue_entries::Column::UpdatedAt, Expr::value(entry.updated_at))
        .filter(queue_entries::Column::Id.eq(entry.sequence))
        .filter(queue_entries::Column::Status.eq(expected.as_str()))
        .exec(conn)
        .await?;

    Ok(result.rows_affected == 1)
}

async fn find_by_uuid<C>(conn: &C, entry_id: Uuid) -> QueueResult<Option<QueueEntry>>
where
    C: ConnectionTrait,
{
    QueueEntries::find()
        .filter(queue_entries::Column::Uuid.eq(entry_id))
        .one(conn)
        .await?
        .map(QueueEntry::try_from)
        .transpose()
}

async fn find_by_idempotency_key<C>(conn: &C, key: &str) -> QueueResult<Option<QueueEntry>>
where
    C: ConnectionTrait,
{
    QueueEntries::find()
        .filter(queue_entries::Column::IdempotencyKey.eq(key))
        .one(conn)
        .await?
        .map(QueueEntry::try_from)
        .transpose()
}

/// A reused key only counts as a duplicate inside the venue that issued it
fn duplicate_in_venue(
    venue_id: Uuid,
    key: &str,
    existing: QueueEntry,
) -> QueueResult<EnqueueOutcome> {
    if existing.venue_id == venue_id {
        Ok(EnqueueOutcome::DuplicateSubmission(existing))
    } else {
        warn!(
            venue_id = %venue_id,
            other_venue_id = %existing.venue_id,
            "Idempotency key already used at another venue"
        );
        Err(QueueError::IdempotencyKeyConflict(key.to_string()))
    }
}

async fn latest_created_at<C>(conn: &C, venue_id: Uuid) -> QueueResult<Option<DateTime<FixedOffset>>>
where
    C: ConnectionTrait,
{
    let latest = QueueEntries::find()
        .filter(queue_entries::Column::VenueId.eq(venue_id))
        .order_by_desc(queue_entries::Column::CreatedAt)
        .one(conn)
        .await?;

    Ok(latest.map(|m| m.created_at))
}

fn validate_party_size(party_size: u32) -> QueueResult<()> {
    if (MIN_PARTY_SIZE..=MAX_PARTY_SIZE).contains(&party_size) {
        Ok(())
    } else {
        Err(QueueError::InvalidInput(format!(
            "Party size must be between {} and {}",
            MIN_PARTY_SIZE, MAX_PARTY_SIZE
        )))
    }
}

fn terminal_statuses() -> Vec<&'static str> {
    QueueStatus::TERMINAL.iter().map(|s| s.as_str()).collect()
}

/// Fatal failures are logged here; expected and transient ones are the
/// caller's to report
fn log_failure(operation: &str, err: QueueError) -> QueueError {
    if err.kind() == ErrorKind::Fatal {
        error!(operation, error = %err, "Queue operation failed");
    }
    err
}
