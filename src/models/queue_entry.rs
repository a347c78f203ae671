//! Queue entry domain types and the entry status state machine
//!
//! Status progresses: WAITING → CALLED → SEATED
//!                          ↘          ↘ NO_SHOW
//!                           CANCELLED ↙ CANCELLED
//! SEATED, NO_SHOW and CANCELLED are terminal.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::queue_entries;
use crate::error::{QueueError, QueueResult};

/// Lifecycle state of a queue entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueueStatus {
    /// Initial state, occupies a line position
    Waiting,
    /// Staff called the customer to the entrance
    Called,
    Seated,
    NoShow,
    Cancelled,
}

impl QueueStatus {
    pub const ALL: [QueueStatus; 5] = [
        QueueStatus::Waiting,
        QueueStatus::Called,
        QueueStatus::Seated,
        QueueStatus::NoShow,
        QueueStatus::Cancelled,
    ];

    pub const TERMINAL: [QueueStatus; 3] =
        [QueueStatus::Seated, QueueStatus::NoShow, QueueStatus::Cancelled];

    /// States reachable from this one in a single step
    pub fn allowed_transitions(self) -> &'static [QueueStatus] {
        match self {
            QueueStatus::Waiting => &[QueueStatus::Called, QueueStatus::Cancelled],
            QueueStatus::Called => &[
                QueueStatus::Seated,
                QueueStatus::NoShow,
                QueueStatus::Cancelled,
            ],
            QueueStatus::Seated | QueueStatus::NoShow | QueueStatus::Cancelled => &[],
        }
    }

    pub fn can_transition_to(self, target: QueueStatus) -> bool {
        self.allowed_transitions().contains(&target)
    }

    pub fn is_terminal(self) -> bool {
        Self::TERMINAL.contains(&self)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QueueStatus::Waiting => "WAITING",
            QueueStatus::Called => "CALLED",
            QueueStatus::Seated => "SEATED",
            QueueStatus::NoShow => "NO_SHOW",
            QueueStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for QueueStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "WAITING" => Ok(QueueStatus::Waiting),
            "CALLED" => Ok(QueueStatus::Called),
            "SEATED" => Ok(QueueStatus::Seated),
            "NO_SHOW" => Ok(QueueStatus::NoShow),
            "CANCELLED" => Ok(QueueStatus::Cancelled),
            _ => Err(format!("Unknown queue status: {}", s)),
        }
    }
}

/// Where the party would like to sit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeatingPreference {
    Indoor,
    Outdoor,
    Any,
}

impl std::fmt::Display for SeatingPreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SeatingPreference::Indoor => write!(f, "Indoor"),
            SeatingPreference::Outdoor => write!(f, "Outdoor"),
            SeatingPreference::Any => write!(f, "Any"),
        }
    }
}

impl std::str::FromStr for SeatingPreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "indoor" => Ok(SeatingPreference::Indoor),
            "outdoor" => Ok(SeatingPreference::Outdoor),
            "any" => Ok(SeatingPreference::Any),
            _ => Err(format!("Unknown seating preference: {}", s)),
        }
    }
}

/// Customer-supplied details, validated by the caller before enqueueing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerDetails {
    pub name: String,
    pub contact_number: String,
    pub party_size: u32,
    pub seating_preference: Option<SeatingPreference>,
}

/// One customer's place in a venue's line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueEntry {
    pub id: Uuid,
    pub venue_id: Uuid,
    pub name: String,
    pub contact_number: String,
    pub party_size: u32,
    pub seating_preference: Option<SeatingPreference>,
    pub status: QueueStatus,
    pub token: String,
    /// Rank at creation time; informational only
    pub position_snapshot: u32,
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<FixedOffset>,
    pub updated_at: DateTime<FixedOffset>,
    /// Store-assigned insertion sequence
    #[serde(skip)]
    pub(crate) sequence: i32,
}

impl QueueEntry {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn is_waiting(&self) -> bool {
        self.status == QueueStatus::Waiting
    }

    /// Move to `target`, refreshing `updated_at`
    ///
    /// Fails with [`QueueError::InvalidTransition`] when the edge is not in
    /// the transition table; the entry is left untouched in that case.
    pub fn transition_to(
        &mut self,
        target: QueueStatus,
        now: DateTime<FixedOffset>,
    ) -> QueueResult<()> {
        if !self.status.can_transition_to(target) {
            return Err(QueueError::InvalidTransition {
                from: self.status,
                to: target,
            });
        }
        self.status = target;
        self.updated_at = now;
        Ok(())
    }
}

impl TryFrom<queue_entries::Model> for QueueEntry {
    type Error = QueueError;

    fn try_from(model: queue_entries::Model) -> Result<Self, Self::Error> {
        let status = model
            .status
            .parse::<QueueStatus>()
            .map_err(QueueError::IntegrityViolation)?;
        let seating_preference = model
            .seating_preference
            .as_deref()
            .map(str::parse::<SeatingPreference>)
            .transpose()
            .map_err(QueueError::IntegrityViolation)?;

        Ok(QueueEntry {
            id: model.uuid,
            venue_id: model.venue_id,
            name: model.name,
            contact_number: model.contact_number,
            party_size: model.party_size.max(0) as u32,
            seating_preference,
            status,
            token: model.token,
            position_snapshot: model.position_snapshot.max(0) as u32,
            idempotency_key: model.idempotency_key,
            created_at: model.created_at,
            updated_at: model.updated_at,
            sequence: model.id,
        })
    }
}
