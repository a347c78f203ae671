//! Queue position resolution
//!
//! Positions are never stored: the line changes whenever someone is called
//! or cancels, so every answer is computed against the store at call time.
//! FIFO order is `created_at`, ties broken by the insertion sequence.

use sea_orm::{ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter};
use uuid::Uuid;

use crate::entities::{prelude::*, queue_entries};
use crate::error::QueueResult;
use crate::models::queue_entry::{QueueEntry, QueueStatus};

/// Number of WAITING entries in the venue
pub async fn waiting_count<C>(conn: &C, venue_id: Uuid) -> QueueResult<u64>
where
    C: ConnectionTrait,
{
    let count = QueueEntries::find()
        .filter(queue_entries::Column::VenueId.eq(venue_id))
        .filter(queue_entries::Column::Status.eq(QueueStatus::Waiting.as_str()))
        .count(conn)
        .await?;

    Ok(count)
}

/// Number of WAITING entries of the same venue ordered strictly before `entry`
pub async fn waiting_ahead_of<C>(conn: &C, entry: &QueueEntry) -> QueueResult<u64>
where
    C: ConnectionTrait,
{
    let ahead = QueueEntries::find()
        .filter(queue_entries::Column::VenueId.eq(entry.venue_id))
        .filter(queue_entries::Column::Status.eq(QueueStatus::Waiting.as_str()))
        .filter(
            Condition::any()
                .add(queue_entries::Column::CreatedAt.lt(entry.created_at))
                .add(
                    Condition::all()
                        .add(queue_entries::Column::CreatedAt.eq(entry.created_at))
                        .add(queue_entries::Column::Id.lt(entry.sequence)),
                ),
        )
        .count(conn)
        .await?;

    Ok(ahead)
}

/// 1-indexed rank of `entry` in its venue's line, or 0 once it is terminal
///
/// A CALLED entry no longer counts toward anyone else's position but still
/// reports the rank it would hold among WAITING entries.
pub async fn position_of_entry<C>(conn: &C, entry: &QueueEntry) -> QueueResult<u64>
where
    C: ConnectionTrait,
{
    if entry.is_terminal() {
        return Ok(0);
    }

    Ok(waiting_ahead_of(conn, entry).await? + 1)
}

/// Position of `entry` given the venue's WAITING entries in FIFO order
///
/// Same rule as [`position_of_entry`], applied to an already loaded list so
/// a dashboard can rank many entries from one read.
pub fn rank_among(waiting: &[QueueEntry], entry: &QueueEntry) -> u64 {
    if entry.is_terminal() {
        return 0;
    }

    let key = (entry.created_at, entry.sequence);
    waiting.partition_point(|w| (w.created_at, w.sequence) < key) as u64 + 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn entry(sequence: i32, offset_secs: i64, status: QueueStatus) -> QueueEntry {
        let created_at = Utc::now().fixed_offset() + Duration::seconds(offset_secs);
        QueueEntry {
            id: Uuid::new_v4(),
            venue_id: Uuid::nil(),
            name: format!("guest-{}", sequence),
            contact_number: "+14155550100".to_string(),
            party_size: 2,
            seating_preference: None,
            status,
            token: format!("T{:03}", sequence),
            position_snapshot: sequence as u32,
            idempotency_key: None,
            created_at,
            updated_at: created_at,
            sequence,
        }
    }

    #[test]
    fn test_rank_among_waiting() {
        let a = entry(1, 0, QueueStatus::Waiting);
        let b = entry(2, 10, QueueStatus::Waiting);
        let c = entry(3, 20, QueueStatus::Waiting);
        let waiting = vec![a.clone(), b.clone(), c.clone()];

        assert_eq!(rank_among(&waiting, &a), 1);
        assert_eq!(rank_among(&waiting, &b), 2);
        assert_eq!(rank_among(&waiting, &c), 3);
    }

    #[test]
    fn test_rank_among_breaks_timestamp_ties_by_sequence() {
        let a = entry(7, 0, QueueStatus::Waiting);
        let mut b = entry(8, 0, QueueStatus::Waiting);
        b.created_at = a.created_at;
        let waiting = vec![a.clone(), b.clone()];

        assert_eq!(rank_among(&waiting, &a), 1);
        assert_eq!(rank_among(&waiting, &b), 2);
    }

    #[test]
    fn test_rank_among_called_and_terminal() {
        let called = entry(1, 0, QueueStatus::Called);
        let b = entry(2, 10, QueueStatus::Waiting);
        let seated = entry(3, 20, QueueStatus::Seated);
        let waiting = vec![b.clone()];

        assert_eq!(rank_among(&waiting, &called), 1);
        assert_eq!(rank_among(&waiting, &b), 1);
        assert_eq!(rank_among(&waiting, &seated), 0);
    }
}
