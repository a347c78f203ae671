//! Queue token allocation
//!
//! Tokens are short codes a host can read aloud. Each deployment uses one
//! [`TokenStrategy`]:
//! - `Random`: four characters from `A-Z0-9`, retried until no entry of the
//!   venue holds the same code. Runs under the venue row lock taken by
//!   enqueue, so the check-then-insert cannot race.
//! - `Sequence`: `PREFIX-000123` from the venue's counter row, incremented and
//!   read in a single `UPDATE ... RETURNING` statement.

use std::sync::Arc;

use rand::Rng;
use sea_orm::{
    sea_query::{Expr, OnConflict, Query},
    ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter, Set,
};
use tracing::{debug, error};
use uuid::Uuid;

use crate::config::TokenStrategy;
use crate::entities::{prelude::*, queue_entries, venue_sequences, venues};
use crate::error::{QueueError, QueueResult};
use crate::services::transaction;

const TOKEN_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const RANDOM_TOKEN_LENGTH: usize = 4;
const SEQUENCE_PREFIX_LENGTH: usize = 3;
const SEQUENCE_DIGITS: usize = 6;

/// Source of candidate codes for the random strategy
pub type TokenGenerator = Arc<dyn Fn() -> String + Send + Sync>;

#[derive(Clone)]
pub struct TokenAllocator {
    strategy: TokenStrategy,
    max_attempts: u32,
    generate: TokenGenerator,
}

impl TokenAllocator {
    pub fn new(strategy: TokenStrategy, max_attempts: u32) -> Self {
        Self {
            strategy,
            max_attempts: max_attempts.max(1),
            generate: Arc::new(random_token),
        }
    }

    /// Replace the random code source, e.g. with a fixed sequence in tests
    pub fn with_generator<G>(mut self, generate: G) -> Self
    where
        G: Fn() -> String + Send + Sync + 'static,
    {
        self.generate = Arc::new(generate);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn strategy(&self) -> TokenStrategy {
        self.strategy
    }

    /// Allocate a token for a new entry of `venue`
    ///
    /// Must be called inside the transaction that inserts the entry.
    pub async fn allocate<C>(&self, conn: &C, venue: &venues::Model) -> QueueResult<String>
    where
        C: ConnectionTrait,
    {
        match self.strategy {
            TokenStrategy::Random => self.allocate_random(conn, venue.id).await,
            TokenStrategy::Sequence => {
                let value = next_sequence_value(conn, venue.id).await?;
                Ok(format_sequence_token(&venue_prefix(&venue.slug), value))
            }
        }
    }

    async fn allocate_random<C>(&self, conn: &C, venue_id: Uuid) -> QueueResult<String>
    where
        C: ConnectionTrait,
    {
        for attempt in 1..=self.max_attempts {
            let token = (self.generate)();

            let taken = QueueEntries::find()
                .filter(queue_entries::Column::VenueId.eq(venue_id))
                .filter(queue_entries::Column::Token.eq(token.as_str()))
                .count(conn)
                .await?;

            if taken == 0 {
                return Ok(token);
            }

            debug!(venue_id = %venue_id, attempt, token = %token, "Token collision, retrying");
        }

        error!(
            venue_id = %venue_id,
            attempts = self.max_attempts,
            "Token allocation exhausted"
        );
        Err(QueueError::AllocationExhausted {
            attempts: self.max_attempts,
        })
    }
}

/// Draw a random code; the RNG never lives across an await point
pub fn random_token() -> String {
    let mut rng = rand::thread_rng();
    (0..RANDOM_TOKEN_LENGTH)
        .map(|_| TOKEN_ALPHABET[rng.gen_range(0..TOKEN_ALPHABET.len())] as char)
        .collect()
}

/// First three ASCII alphanumerics of the slug, upper-cased
pub fn venue_prefix(slug: &str) -> String {
    let prefix: String = slug
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(SEQUENCE_PREFIX_LENGTH)
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if prefix.is_empty() {
        "Q".to_string()
    } else {
        prefix
    }
}

pub fn format_sequence_token(prefix: &str, value: i64) -> String {
    format!("{}-{:0width$}", prefix, value, width = SEQUENCE_DIGITS)
}

/// Create the counter row for a venue if it does not exist yet
pub async fn initialize_sequence<C>(conn: &C, venue_id: Uuid) -> QueueResult<()>
where
    C: ConnectionTrait,
{
    let row = venue_sequences::ActiveModel {
        venue_id: Set(venue_id),
        current_value: Set(0),
        updated_at: Set(transaction::now()),
    };

    VenueSequences::insert(row)
        .on_conflict(
            OnConflict::column(venue_sequences::Column::VenueId)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(conn)
        .await?;

    Ok(())
}

/// Atomically increment and read the venue counter
///
/// A venue without a counter row gets one on first use.
pub async fn next_sequence_value<C>(conn: &C, venue_id: Uuid) -> QueueResult<i64>
where
    C: ConnectionTrait,
{
    if let Some(value) = increment_sequence(conn, venue_id).await? {
        return Ok(value);
    }

    initialize_sequence(conn, venue_id).await?;

    increment_sequence(conn, venue_id).await?.ok_or_else(|| {
        QueueError::IntegrityViolation(format!("Missing token sequence for venue {}", venue_id))
    })
}

async fn increment_sequence<C>(conn: &C, venue_id: Uuid) -> QueueResult<Option<i64>>
where
    C: ConnectionTrait,
{
    let update = Query::update()
        .table(VenueSequences)
        .value(
            venue_sequences::Column::CurrentValue,
            Expr::col(venue_sequences::Column::CurrentValue).add(1),
        )
        .value(venue_sequences::Column::UpdatedAt, transaction::now())
        .and_where(venue_sequences::Column::VenueId.eq(venue_id))
        .returning_col(venue_sequences::Column::CurrentValue)
        .to_owned();

    let statement = conn.get_database_backend().build(&update);
    let row = conn.query_one(statement).await?;

    match row {
        Some(row) => Ok(Some(row.try_get::<i64>("", "current_value")?)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_token_shape() {
        for _ in 0..100 {
            let token = random_token();
            assert_eq!(token.len(), RANDOM_TOKEN_LENGTH);
            assert!(token.bytes().all(|b| TOKEN_ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn test_venue_prefix() {
        assert_eq!(venue_prefix("bistro-nord"), "BIS");
        assert_eq!(venue_prefix("a-1"), "A1");
        assert_eq!(venue_prefix("--"), "Q");
    }

    #[test]
    fn test_format_sequence_token() {
        assert_eq!(format_sequence_token("BIS", 123), "BIS-000123");
        assert_eq!(format_sequence_token("Q", 1_234_567), "Q-1234567");
    }

    #[test]
    fn test_allocator_needs_at_least_one_attempt() {
        let allocator = TokenAllocator::new(TokenStrategy::Random, 0);
        assert_eq!(allocator.max_attempts, 1);
        assert_eq!(allocator.strategy(), TokenStrategy::Random);
    }
}
