pub use super::queue_entries::Entity as QueueEntries;
pub use super::venue_sequences::Entity as VenueSequences;
pub use super::venues::Entity as Venues;
