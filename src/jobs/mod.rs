pub mod queue_retention_job;
