//! Venue lookup and registration
//!
//! The queue only reads venue configuration; registering a venue also
//! creates its token counter row.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    Set, TransactionTrait,
};
use tracing::info;
use uuid::Uuid;

use crate::config::{DEFAULT_AVERAGE_MINUTES_PER_PARTY, MAX_AVERAGE_MINUTES, MIN_AVERAGE_MINUTES};
use crate::entities::{prelude::*, venues};
use crate::error::{QueueError, QueueResult};
use crate::services::{token_allocator, transaction};

const MAX_SLUG_LENGTH: usize = 64;
const MAX_NAME_LENGTH: usize = 100;

/// Details for a new venue
#[derive(Debug, Clone)]
pub struct NewVenue {
    pub name: String,
    pub slug: String,
    pub average_minutes_per_party: Option<u32>,
}

pub async fn find_venue<C>(conn: &C, venue_id: Uuid) -> QueueResult<venues::Model>
where
    C: ConnectionTrait,
{
    Venues::find_by_id(venue_id)
        .one(conn)
        .await?
        .ok_or_else(|| QueueError::VenueNotFound(venue_id.to_string()))
}

pub async fn find_venue_by_slug<C>(conn: &C, slug: &str) -> QueueResult<venues::Model>
where
    C: ConnectionTrait,
{
    Venues::find()
        .filter(venues::Column::Slug.eq(slug))
        .one(conn)
        .await?
        .ok_or_else(|| QueueError::VenueNotFound(slug.to_string()))
}

/// Register a venue and initialise its token sequence
pub async fn register_venue(db: &DatabaseConnection, venue: NewVenue) -> QueueResult<venues::Model> {
    let name = venue.name.trim().to_string();
    if name.is_empty() || name.chars().count() > MAX_NAME_LENGTH {
        return Err(QueueError::InvalidInput(format!(
            "Venue name must be 1-{} characters",
            MAX_NAME_LENGTH
        )));
    }

    if !is_valid_slug(&venue.slug) {
        return Err(QueueError::InvalidInput(format!(
            "Invalid venue slug: {}",
            venue.slug
        )));
    }

    let average = venue
        .average_minutes_per_party
        .unwrap_or(DEFAULT_AVERAGE_MINUTES_PER_PARTY);
    if !(MIN_AVERAGE_MINUTES..=MAX_AVERAGE_MINUTES).contains(&average) {
        return Err(QueueError::InvalidInput(format!(
            "Average minutes per party must be between {} and {}",
            MIN_AVERAGE_MINUTES, MAX_AVERAGE_MINUTES
        )));
    }

    let now = transaction::now();
    let txn = db.begin().await?;

    let model = venues::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name),
        slug: Set(venue.slug),
        average_minutes_per_party: Set(average as i32),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&txn)
    .await?;

    token_allocator::initialize_sequence(&txn, model.id).await?;
    txn.commit().await?;

    info!(venue_id = %model.id, slug = %model.slug, "Venue registered");
    Ok(model)
}

/// Lowercase ASCII letters, digits and inner hyphens
fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug.len() <= MAX_SLUG_LENGTH
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}
