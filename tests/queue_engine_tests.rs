mod common;

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::Duration;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use uuid::Uuid;

use waitlist_backend::config::TokenStrategy;
use waitlist_backend::entities::{prelude::QueueEntries, queue_entries};
use waitlist_backend::error::{QueueError, QueueResult};
use waitlist_backend::jobs::queue_retention_job::run_retention_pass;
use waitlist_backend::models::queue_entry::{QueueEntry, QueueStatus, SeatingPreference};
use waitlist_backend::services::notifications::{NotificationError, Notifier};
use waitlist_backend::services::queue::{CallNextOutcome, EnqueueOutcome};
use waitlist_backend::services::token_allocator::TokenAllocator;
use waitlist_backend::services::transaction;

use crate::common::{create_venue, customer, insert_waiting_entry, setup_queue};

fn called(outcome: CallNextOutcome) -> QueueEntry {
    match outcome {
        CallNextOutcome::Called(entry) => entry,
        CallNextOutcome::EmptyQueue => panic!("Expected a called entry"),
    }
}

#[tokio::test]
async fn test_fifo_positions_and_call_next() {
    let queue = setup_queue(TokenStrategy::Random).await;
    let venue = create_venue(queue.db(), 10).await;

    let a = queue.enqueue(venue.id, customer("A"), None).await.unwrap().into_entry();
    let b = queue.enqueue(venue.id, customer("B"), None).await.unwrap().into_entry();
    let c = queue.enqueue(venue.id, customer("C"), None).await.unwrap().into_entry();

    assert_eq!(a.position_snapshot, 1);
    assert_eq!(b.position_snapshot, 2);
    assert_eq!(c.position_snapshot, 3);
    assert_eq!(queue.position_of(a.id).await.unwrap(), 1);
    assert_eq!(queue.position_of(b.id).await.unwrap(), 2);
    assert_eq!(queue.position_of(c.id).await.unwrap(), 3);

    let first = called(queue.call_next(venue.id).await.unwrap());
    assert_eq!(first.id, a.id);
    assert_eq!(first.status, QueueStatus::Called);

    assert_eq!(queue.position_of(b.id).await.unwrap(), 1);
    assert_eq!(queue.position_of(c.id).await.unwrap(), 2);

    let stats = queue.queue_stats(&venue).await.unwrap();
    assert_eq!(stats.waiting_count, 2);
    assert_eq!(stats.estimated_wait.minutes, 20);
}

#[tokio::test]
async fn test_enqueue_keeps_customer_details() {
    let queue = setup_queue(TokenStrategy::Random).await;
    let venue = create_venue(queue.db(), 10).await;

    let mut details = customer("Grace");
    details.party_size = 6;
    details.seating_preference = Some(SeatingPreference::Outdoor);

    let entry = queue.enqueue(venue.id, details, None).await.unwrap().into_entry();

    assert_eq!(entry.venue_id, venue.id);
    assert_eq!(entry.party_size, 6);
    assert_eq!(entry.seating_preference, Some(SeatingPreference::Outdoor));
    assert_eq!(entry.status, QueueStatus::Waiting);
    assert_eq!(entry.token.len(), 4);

    let stored = queue.find_entry(entry.id).await.unwrap();
    assert_eq!(stored, entry);
}

#[tokio::test]
async fn test_idempotent_enqueue_creates_one_entry() {
    let queue = setup_queue(TokenStrategy::Random).await;
    let venue = create_venue(queue.db(), 10).await;
    let key = Uuid::new_v4().to_string();

    let first = queue
        .enqueue(venue.id, customer("Ada"), Some(key.clone()))
        .await
        .unwrap();
    let second = queue
        .enqueue(venue.id, customer("Ada"), Some(key.clone()))
        .await
        .unwrap();

    assert!(!first.is_duplicate());
    assert!(second.is_duplicate());
    assert_eq!(first.entry().id, second.entry().id);
    assert_eq!(first.entry().token, second.entry().token);

    let rows = QueueEntries::find()
        .filter(queue_entries::Column::VenueId.eq(venue.id))
        .count(queue.db())
        .await
        .unwrap();
    assert_eq!(rows, 1);
}

#[tokio::test]
async fn test_concurrent_enqueues_get_distinct_tokens() {
    let queue = setup_queue(TokenStrategy::Random).await;
    let venue = create_venue(queue.db(), 10).await;

    let mut handles = Vec::new();
    for i in 0..20 {
        let queue = queue.clone();
        let venue_id = venue.id;
        handles.push(tokio::spawn(async move {
            queue
                .enqueue(venue_id, customer(&format!("guest-{}", i)), None)
                .await
        }));
    }

    let mut tokens = HashSet::new();
    let mut snapshots = HashSet::new();
    for handle in handles {
        let entry = handle.await.unwrap().unwrap().into_entry();
        tokens.insert(entry.token);
        snapshots.insert(entry.position_snapshot);
    }

    assert_eq!(tokens.len(), 20);
    // Enqueues serialize per venue, so snapshots are 1..=20 with no repeats
    assert_eq!(snapshots, (1..=20).collect::<HashSet<u32>>());
}

#[tokio::test]
async fn test_sequence_tokens() {
    let queue = setup_queue(TokenStrategy::Sequence).await;
    let venue = create_venue(queue.db(), 10).await;

    let a = queue.enqueue(venue.id, customer("A"), None).await.unwrap().into_entry();
    let b = queue.enqueue(venue.id, customer("B"), None).await.unwrap().into_entry();

    assert_eq!(a.token, "HAR-000001");
    assert_eq!(b.token, "HAR-000002");
}

#[tokio::test]
async fn test_concurrent_call_next_claims_each_entry_once() {
    let queue = setup_queue(TokenStrategy::Random).await;
    let venue = create_venue(queue.db(), 10).await;

    let mut expected = HashSet::new();
    for i in 0..5 {
        let entry = queue
            .enqueue(venue.id, customer(&format!("guest-{}", i)), None)
            .await
            .unwrap()
            .into_entry();
        expected.insert(entry.id);
    }

    let mut handles = Vec::new();
    for _ in 0..8 {
        let queue = queue.clone();
        let venue_id = venue.id;
        handles.push(tokio::spawn(async move { queue.call_next(venue_id).await }));
    }

    let mut claimed = Vec::new();
    let mut empty = 0;
    for handle in handles {
        match handle.await.unwrap().unwrap() {
            CallNextOutcome::Called(entry) => claimed.push(entry.id),
            CallNextOutcome::EmptyQueue => empty += 1,
        }
    }

    assert_eq!(claimed.len(), 5);
    assert_eq!(empty, 3);
    assert_eq!(claimed.iter().copied().collect::<HashSet<_>>(), expected);
}

struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn send_queue_called(
        &self,
        _contact_number: &str,
        _message: &str,
    ) -> Result<(), NotificationError> {
        Err(NotificationError::Unreachable("gateway down".to_string()))
    }
}

#[tokio::test]
async fn test_failed_notification_keeps_call() {
    let queue = setup_queue(TokenStrategy::Random)
        .await
        .with_notifier(Arc::new(FailingNotifier));
    let venue = create_venue(queue.db(), 10).await;

    let a = queue.enqueue(venue.id, customer("A"), None).await.unwrap().into_entry();

    let next = called(queue.call_next(venue.id).await.unwrap());
    assert_eq!(next.id, a.id);

    let stored = queue.find_entry(a.id).await.unwrap();
    assert_eq!(stored.status, QueueStatus::Called);
}

#[tokio::test]
async fn test_call_next_on_empty_queue() {
    let queue = setup_queue(TokenStrategy::Random).await;
    let venue = create_venue(queue.db(), 10).await;

    assert_eq!(
        queue.call_next(venue.id).await.unwrap(),
        CallNextOutcome::EmptyQueue
    );
}

#[tokio::test]
async fn test_status_transitions() {
    let queue = setup_queue(TokenStrategy::Random).await;
    let venue = create_venue(queue.db(), 10).await;

    let a = queue.enqueue(venue.id, customer("A"), None).await.unwrap().into_entry();
    let b = queue.enqueue(venue.id, customer("B"), None).await.unwrap().into_entry();

    // WAITING -> SEATED is not allowed
    let err = queue
        .transition_status(a.id, QueueStatus::Seated)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        QueueError::InvalidTransition {
            from: QueueStatus::Waiting,
            to: QueueStatus::Seated
        }
    ));

    let called_a = called(queue.call_next(venue.id).await.unwrap());
    assert_eq!(called_a.id, a.id);

    let seated = queue
        .transition_status(a.id, QueueStatus::Seated)
        .await
        .unwrap();
    assert_eq!(seated.status, QueueStatus::Seated);
    assert_eq!(queue.position_of(a.id).await.unwrap(), 0);

    // Terminal entries never re-enter the line
    let err = queue
        .transition_status(a.id, QueueStatus::Waiting)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        QueueError::InvalidTransition {
            from: QueueStatus::Seated,
            to: QueueStatus::Waiting
        }
    ));
    assert_eq!(queue.position_of(b.id).await.unwrap(), 1);

    let cancelled = queue
        .transition_status(b.id, QueueStatus::Cancelled)
        .await
        .unwrap();
    assert_eq!(cancelled.status, QueueStatus::Cancelled);
    assert_eq!(queue.position_of(b.id).await.unwrap(), 0);

    let err = queue
        .transition_status(b.id, QueueStatus::Called)
        .await
        .unwrap_err();
    assert!(matches!(err, QueueError::InvalidTransition { .. }));
}

#[tokio::test]
async fn test_transition_scoped_to_venue() {
    let queue = setup_queue(TokenStrategy::Random).await;
    let venue = create_venue(queue.db(), 10).await;
    let other = create_venue(queue.db(), 10).await;

    let entry = queue.enqueue(venue.id, customer("A"), None).await.unwrap().into_entry();

    let err = queue
        .transition_status_in_venue(other.id, entry.id, QueueStatus::Cancelled)
        .await
        .unwrap_err();
    assert!(matches!(err, QueueError::EntryNotFound(id) if id == entry.id));

    let err = queue
        .transition_status(Uuid::new_v4(), QueueStatus::Cancelled)
        .await
        .unwrap_err();
    assert!(matches!(err, QueueError::EntryNotFound(_)));
}

#[tokio::test]
async fn test_list_entries_filters_by_status() {
    let queue = setup_queue(TokenStrategy::Random).await;
    let venue = create_venue(queue.db(), 10).await;

    for name in ["A", "B", "C"] {
        queue.enqueue(venue.id, customer(name), None).await.unwrap();
    }
    queue.call_next(venue.id).await.unwrap();

    let all = queue.list_entries(venue.id, None).await.unwrap();
    let names: Vec<&str> = all.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["A", "B", "C"]);

    let waiting = queue
        .list_entries(venue.id, Some(QueueStatus::Waiting))
        .await
        .unwrap();
    assert_eq!(waiting.len(), 2);
    assert!(waiting.iter().all(|e| e.status == QueueStatus::Waiting));
}

#[tokio::test]
async fn test_clear_completed_and_retention() {
    let queue = setup_queue(TokenStrategy::Random).await;
    let venue = create_venue(queue.db(), 10).await;

    let a = queue.enqueue(venue.id, customer("A"), None).await.unwrap().into_entry();
    let b = queue.enqueue(venue.id, customer("B"), None).await.unwrap().into_entry();
    let c = queue.enqueue(venue.id, customer("C"), None).await.unwrap().into_entry();

    queue.transition_status(a.id, QueueStatus::Cancelled).await.unwrap();
    queue.call_next(venue.id).await.unwrap();
    queue.transition_status(b.id, QueueStatus::NoShow).await.unwrap();

    // Fresh terminal entries are inside the retention window
    assert_eq!(run_retention_pass(&queue).await.unwrap(), 0);

    let purged = queue
        .purge_terminal_older_than(transaction::now() + Duration::minutes(1))
        .await
        .unwrap();
    // A shared TEST_DATABASE_URL may hold terminal rows from other tests
    assert!(purged >= 2);

    assert_eq!(queue.clear_completed(venue.id).await.unwrap(), 0);

    let remaining = queue.list_entries(venue.id, None).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, c.id);
}

#[tokio::test]
async fn test_clear_completed_leaves_active_entries() {
    let queue = setup_queue(TokenStrategy::Random).await;
    let venue = create_venue(queue.db(), 10).await;

    let a = queue.enqueue(venue.id, customer("A"), None).await.unwrap().into_entry();
    queue.enqueue(venue.id, customer("B"), None).await.unwrap();
    queue.enqueue(venue.id, customer("C"), None).await.unwrap();

    queue.call_next(venue.id).await.unwrap();
    queue.transition_status(a.id, QueueStatus::Seated).await.unwrap();
    queue.call_next(venue.id).await.unwrap();

    assert_eq!(queue.clear_completed(venue.id).await.unwrap(), 1);

    let statuses: Vec<QueueStatus> = queue
        .list_entries(venue.id, None)
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.status)
        .collect();
    assert_eq!(statuses, vec![QueueStatus::Called, QueueStatus::Waiting]);
}

#[tokio::test]
async fn test_unknown_venue_and_party_size() {
    let queue = setup_queue(TokenStrategy::Random).await;
    let venue = create_venue(queue.db(), 10).await;

    let err = queue
        .enqueue(Uuid::new_v4(), customer("A"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, QueueError::VenueNotFound(_)));

    let mut too_many = customer("Big table");
    too_many.party_size = 21;
    let err = queue.enqueue(venue.id, too_many, None).await.unwrap_err();
    assert!(matches!(err, QueueError::InvalidInput(_)));

    let mut nobody = customer("Nobody");
    nobody.party_size = 0;
    assert!(queue.enqueue(venue.id, nobody, None).await.is_err());

    let rows = QueueEntries::find()
        .filter(queue_entries::Column::VenueId.eq(venue.id))
        .count(queue.db())
        .await
        .unwrap();
    assert_eq!(rows, 0);
}

#[tokio::test]
async fn test_venues_keep_separate_lines() {
    let queue = setup_queue(TokenStrategy::Random).await;
    let first = create_venue(queue.db(), 10).await;
    let second = create_venue(queue.db(), 5).await;

    let a = queue.enqueue(first.id, customer("A"), None).await.unwrap();
    let b = queue.enqueue(second.id, customer("B"), None).await.unwrap();

    assert!(matches!(a, EnqueueOutcome::Created(ref e) if e.position_snapshot == 1));
    assert!(matches!(b, EnqueueOutcome::Created(ref e) if e.position_snapshot == 1));

    let next = called(queue.call_next(second.id).await.unwrap());
    assert_eq!(next.id, b.entry().id);
    assert_eq!(queue.position_of(a.entry().id).await.unwrap(), 1);
}

#[tokio::test]
async fn test_idempotency_key_reused_at_other_venue() {
    let queue = setup_queue(TokenStrategy::Random).await;
    let first = create_venue(queue.db(), 10).await;
    let second = create_venue(queue.db(), 10).await;
    let key = Uuid::new_v4().to_string();

    let alice = queue
        .enqueue(first.id, customer("Alice"), Some(key.clone()))
        .await
        .unwrap();
    assert!(!alice.is_duplicate());

    let err = queue
        .enqueue(second.id, customer("Bob"), Some(key.clone()))
        .await
        .unwrap_err();
    assert!(matches!(err, QueueError::IdempotencyKeyConflict(ref k) if *k == key));

    assert!(queue.list_entries(second.id, None).await.unwrap().is_empty());
    assert_eq!(queue.list_entries(first.id, None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_entry_stamped_after_clock_skewed_predecessor() {
    let queue = setup_queue(TokenStrategy::Random).await;
    let venue = create_venue(queue.db(), 10).await;

    // Written by an instance whose clock runs five minutes fast
    let fast = transaction::now() + Duration::minutes(5);
    let early = insert_waiting_entry(queue.db(), venue.id, "FAST", fast)
        .await
        .unwrap();

    let later = queue
        .enqueue(venue.id, customer("B"), None)
        .await
        .unwrap()
        .into_entry();

    assert!(later.created_at > early.created_at);
    assert_eq!(later.position_snapshot, 2);
    assert_eq!(queue.position_of(later.id).await.unwrap(), 2);

    let first = called(queue.call_next(venue.id).await.unwrap());
    assert_eq!(first.id, early.uuid);
    assert_eq!(queue.position_of(later.id).await.unwrap(), 1);
}

#[tokio::test]
async fn test_timed_out_operation_leaves_no_row() {
    let queue = setup_queue(TokenStrategy::Random).await;
    let venue = create_venue(queue.db(), 10).await;
    let deadline = StdDuration::from_millis(50);

    let result: QueueResult<()> = transaction::commit_within(deadline, async {
        let txn = transaction::begin(queue.db(), deadline).await?;
        insert_waiting_entry(&txn, venue.id, "SLOW", transaction::now()).await?;
        tokio::time::sleep(StdDuration::from_millis(300)).await;
        Ok((txn, ()))
    })
    .await;

    assert!(matches!(result, Err(QueueError::Timeout(_))));
    assert!(queue.list_entries(venue.id, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_token_allocation_exhausted() {
    let allocator =
        TokenAllocator::new(TokenStrategy::Random, 3).with_generator(|| "ZZZZ".to_string());
    let queue = setup_queue(TokenStrategy::Random)
        .await
        .with_token_allocator(allocator);
    let venue = create_venue(queue.db(), 10).await;

    let first = queue.enqueue(venue.id, customer("A"), None).await.unwrap().into_entry();
    assert_eq!(first.token, "ZZZZ");

    let err = queue.enqueue(venue.id, customer("B"), None).await.unwrap_err();
    assert!(matches!(err, QueueError::AllocationExhausted { attempts: 3 }));

    let entries = queue.list_entries(venue.id, None).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].id, first.id);
}

#[tokio::test]
async fn test_token_collision_is_retried() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let allocator = TokenAllocator::new(TokenStrategy::Random, 3).with_generator(move || {
        match counter.fetch_add(1, Ordering::SeqCst) {
            0 | 1 => "ZZZZ".to_string(),
            _ => "YYYY".to_string(),
        }
    });
    let queue = setup_queue(TokenStrategy::Random)
        .await
        .with_token_allocator(allocator);
    let venue = create_venue(queue.db(), 10).await;

    let a = queue.enqueue(venue.id, customer("A"), None).await.unwrap().into_entry();
    let b = queue.enqueue(venue.id, customer("B"), None).await.unwrap().into_entry();

    assert_eq!(a.token, "ZZZZ");
    assert_eq!(b.token, "YYYY");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}
