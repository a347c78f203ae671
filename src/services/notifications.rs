//! Customer notifications
//!
//! Delivery is best-effort: callers log a failed send and carry on. Only a
//! log-backed provider ships with the backend; SMS or push providers plug in
//! behind [`Notifier`].

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Notification provider rejected message: {0}")]
    Rejected(String),
    #[error("Notification provider unreachable: {0}")]
    Unreachable(String),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Tell a customer their table is ready
    async fn send_queue_called(
        &self,
        contact_number: &str,
        message: &str,
    ) -> Result<(), NotificationError>;
}

/// Records notifications through `tracing` instead of sending them
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_queue_called(
        &self,
        contact_number: &str,
        message: &str,
    ) -> Result<(), NotificationError> {
        info!(
            provider = "log",
            contact_number = %mask_contact_number(contact_number),
            message_length = message.len(),
            "Queue called notification sent"
        );
        Ok(())
    }
}

/// Build the notifier for a provider name
///
/// Unknown providers fall back to [`LogNotifier`].
pub fn notifier_for_provider(provider: &str) -> Arc<dyn Notifier> {
    match provider.to_lowercase().as_str() {
        "log" | "mock" => Arc::new(LogNotifier),
        other => {
            warn!(provider = %other, "Unknown notification provider, falling back to log");
            Arc::new(LogNotifier)
        }
    }
}

pub fn queue_called_message(venue_name: &str, token: &str) -> String {
    format!(
        "Hi! Your table is ready at {}. Token: {}. Please proceed to the entrance.",
        venue_name, token
    )
}

/// Keep only the last four digits for logs
fn mask_contact_number(contact_number: &str) -> String {
    let visible: String = contact_number
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("***{}", visible)
}
