pub mod queue_api;
pub mod queue_entry;
