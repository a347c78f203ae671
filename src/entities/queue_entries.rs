//! `SeaORM` Entity for queue_entries table
//!
//! `status` and `seating_preference` are stored as strings and mapped through
//! [`crate::models::queue_entry::QueueStatus`] and
//! [`crate::models::queue_entry::SeatingPreference`].

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "queue_entries")]
pub struct Model {
    /// Insertion sequence; breaks `created_at` ties
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub uuid: Uuid,
    pub venue_id: Uuid,
    pub name: String,
    pub contact_number: String,
    pub party_size: i32,
    pub seating_preference: Option<String>,
    pub status: String,
    pub token: String,
    pub position_snapshot: i32,
    #[sea_orm(unique)]
    pub idempotency_key: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::venues::Entity",
        from = "Column::VenueId",
        to = "super::venues::Column::Id",
        on_delete = "Cascade"
    )]
    Venue,
}

impl Related<super::venues::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Venue.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
