//! Queue Retention Job
//!
//! Periodically deletes SEATED, NO_SHOW and CANCELLED entries whose last
//! update is older than the configured retention window. WAITING and CALLED
//! entries are never touched.
//! Supports graceful shutdown via SIGTERM/SIGINT signals.

use tokio::time::interval;
use tracing::{error, info};

use crate::error::QueueResult;
use crate::services::queue::QueueService;
use crate::services::transaction;

/// Start the queue retention job
///
/// Spawns a background task that runs every `retention_interval` and purges
/// terminal entries older than `retention`. Both come from the service's
/// [`QueueConfig`](crate::config::QueueConfig).
pub async fn start_queue_retention_job(queue: QueueService) {
    tokio::spawn(async move {
        let retention_interval = queue.config().retention_interval;

        info!(
            retention_hours = queue.config().retention.num_hours(),
            interval_secs = retention_interval.as_secs(),
            "Initializing queue retention job"
        );

        let mut interval = interval(retention_interval);

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received, stopping queue retention job gracefully");
                    break;
                }
                _ = interval.tick() => {
                    match run_retention_pass(&queue).await {
                        Ok(deleted) => {
                            info!(deleted, "Queue retention pass completed");
                        }
                        Err(e) => {
                            // Next tick retries
                            error!(error = %e, "Queue retention pass failed");
                        }
                    }
                }
            }
        }

        info!("Queue retention job stopped");
    });
}

/// One purge over every venue; returns the number of deleted entries
pub async fn run_retention_pass(queue: &QueueService) -> QueueResult<u64> {
    let cutoff = transaction::now() - queue.config().retention;
    queue.purge_terminal_older_than(cutoff).await
}
