//! `SeaORM` Entity for venues table

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "venues")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    #[sea_orm(unique)]
    pub slug: String,
    pub average_minutes_per_party: i32,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::queue_entries::Entity")]
    QueueEntries,
    #[sea_orm(has_one = "super::venue_sequences::Entity")]
    VenueSequence,
}

impl Related<super::queue_entries::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::QueueEntries.def()
    }
}

impl Related<super::venue_sequences::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::VenueSequence.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
