//! Request/response models for the queue endpoints

use chrono::{DateTime, FixedOffset};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{DEFAULT_PARTY_SIZE, MAX_PARTY_SIZE, MIN_PARTY_SIZE};
use crate::models::queue_entry::{CustomerDetails, QueueEntry, QueueStatus, SeatingPreference};
use crate::services::wait_time::WaitEstimate;

const MAX_NAME_LENGTH: usize = 100;

lazy_static! {
    /// E.164-style number, optional leading '+'
    static ref CONTACT_NUMBER_RE: Regex = Regex::new(r"^\+?[1-9]\d{1,14}$").unwrap();
}

/// Body of `POST /api/public/{slug}/queue`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinQueueRequest {
    pub name: String,
    pub contact_number: String,
    #[serde(default)]
    pub party_size: Option<u32>,
    #[serde(default)]
    pub seating_preference: Option<SeatingPreference>,
    /// Client-generated UUID; resubmitting it returns the original entry
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

impl JoinQueueRequest {
    /// Validate and normalise into the details the queue engine accepts
    pub fn validate(self) -> Result<(CustomerDetails, Option<String>), String> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err("Name is required".to_string());
        }
        if name.chars().count() > MAX_NAME_LENGTH {
            return Err(format!("Name must be at most {} characters", MAX_NAME_LENGTH));
        }

        let contact_number = self.contact_number.trim().to_string();
        if !CONTACT_NUMBER_RE.is_match(&contact_number) {
            return Err("Invalid mobile number".to_string());
        }

        let party_size = self.party_size.unwrap_or(DEFAULT_PARTY_SIZE);
        if !(MIN_PARTY_SIZE..=MAX_PARTY_SIZE).contains(&party_size) {
            return Err(format!(
                "Party size must be between {} and {}",
                MIN_PARTY_SIZE, MAX_PARTY_SIZE
            ));
        }

        let idempotency_key = match self.idempotency_key {
            Some(key) => Some(
                Uuid::parse_str(key.trim())
                    .map_err(|_| "Idempotency key must be a UUID".to_string())?
                    .to_string(),
            ),
            None => None,
        };

        Ok((
            CustomerDetails {
                name,
                contact_number,
                party_size,
                seating_preference: self.seating_preference,
            },
            idempotency_key,
        ))
    }
}

/// Entry as returned to staff and to the joining customer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntryResponse {
    pub id: Uuid,
    pub token: String,
    pub name: String,
    pub contact_number: String,
    pub party_size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seating_preference: Option<SeatingPreference>,
    pub status: QueueStatus,
    pub position: u64,
    pub estimated_wait_minutes: u32,
    pub estimated_wait: String,
    pub created_at: DateTime<FixedOffset>,
}

impl QueueEntryResponse {
    pub fn new(entry: QueueEntry, position: u64, wait: WaitEstimate) -> Self {
        Self {
            id: entry.id,
            token: entry.token,
            name: entry.name,
            contact_number: entry.contact_number,
            party_size: entry.party_size,
            seating_preference: entry.seating_preference,
            status: entry.status,
            position,
            estimated_wait_minutes: wait.minutes,
            estimated_wait: wait.friendly,
            created_at: entry.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatusQuery {
    pub entry_id: Uuid,
}

/// Customer-facing status of one entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatusResponse {
    pub token: String,
    pub position: u64,
    pub estimated_wait_minutes: u32,
    pub estimated_wait: String,
    pub status: QueueStatus,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListQueueQuery {
    #[serde(default)]
    pub status: Option<QueueStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueListResponse {
    pub entries: Vec<QueueEntryResponse>,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatsResponse {
    pub waiting_count: u64,
    pub estimated_wait_minutes: u32,
    pub estimated_wait: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: QueueStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallNextResponse {
    pub entry: QueueEntryResponse,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClearCompletedResponse {
    pub deleted: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// Message shown on the customer's status page
pub fn status_message(status: QueueStatus, position: u64) -> String {
    match status {
        QueueStatus::Seated => "You have been seated!".to_string(),
        QueueStatus::Called => "Your table is ready! Please proceed to the entrance.".to_string(),
        QueueStatus::NoShow | QueueStatus::Cancelled => "This entry has been cancelled.".to_string(),
        QueueStatus::Waiting => format!("You are {} in line.", ordinal(position)),
    }
}

fn ordinal(n: u64) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{}{}", n, suffix)
}
