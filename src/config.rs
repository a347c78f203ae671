//! Runtime configuration loaded from environment variables
//!
//! Variables are read once at startup (after `dotenvy::dotenv()`); anything
//! missing or unparsable falls back to its default.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

/// Smallest party accepted by the queue
pub const MIN_PARTY_SIZE: u32 = 1;

/// Largest party accepted by the queue
pub const MAX_PARTY_SIZE: u32 = 20;

/// Party size used when the customer leaves it blank
pub const DEFAULT_PARTY_SIZE: u32 = 2;

pub const MIN_AVERAGE_MINUTES: u32 = 1;
pub const MAX_AVERAGE_MINUTES: u32 = 60;
pub const DEFAULT_AVERAGE_MINUTES_PER_PARTY: u32 = 10;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_TX_TIMEOUT_MS: u64 = 5000;
const DEFAULT_TOKEN_MAX_ATTEMPTS: u32 = 10;
const DEFAULT_RETENTION_HOURS: i64 = 24;
const DEFAULT_RETENTION_INTERVAL_SECS: u64 = 3600;

const ENV_BIND_ADDR: &str = "BIND_ADDR";
const ENV_TX_TIMEOUT_MS: &str = "QUEUE_TX_TIMEOUT_MS";
const ENV_TOKEN_STRATEGY: &str = "QUEUE_TOKEN_STRATEGY";
const ENV_TOKEN_MAX_ATTEMPTS: &str = "QUEUE_TOKEN_MAX_ATTEMPTS";
const ENV_RETENTION_HOURS: &str = "QUEUE_RETENTION_HOURS";
const ENV_RETENTION_INTERVAL_SECS: &str = "QUEUE_RETENTION_INTERVAL_SECS";
const ENV_NOTIFICATION_PROVIDER: &str = "NOTIFICATION_PROVIDER";

/// How queue tokens are produced for a deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TokenStrategy {
    /// Four random characters from `A-Z0-9`, retried until unique in the venue
    #[default]
    Random,
    /// Venue prefix plus a zero-padded per-venue counter, e.g. `BIS-000042`
    Sequence,
}

impl std::fmt::Display for TokenStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenStrategy::Random => write!(f, "random"),
            TokenStrategy::Sequence => write!(f, "sequence"),
        }
    }
}

impl FromStr for TokenStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "random" => Ok(TokenStrategy::Random),
            "sequence" => Ok(TokenStrategy::Sequence),
            _ => Err(format!("Unknown token strategy: {}", s)),
        }
    }
}

/// Queue engine settings
#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub bind_addr: String,
    /// Upper bound for every transactional queue operation
    pub transaction_timeout: Duration,
    pub token_strategy: TokenStrategy,
    /// Attempts before random token allocation gives up
    pub token_max_attempts: u32,
    /// Terminal entries older than this are purged by the retention job
    pub retention: chrono::Duration,
    pub retention_interval: Duration,
    pub notification_provider: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            transaction_timeout: Duration::from_millis(DEFAULT_TX_TIMEOUT_MS),
            token_strategy: TokenStrategy::default(),
            token_max_attempts: DEFAULT_TOKEN_MAX_ATTEMPTS,
            retention: chrono::Duration::hours(DEFAULT_RETENTION_HOURS),
            retention_interval: Duration::from_secs(DEFAULT_RETENTION_INTERVAL_SECS),
            notification_provider: "log".to_string(),
        }
    }
}

impl QueueConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let token_strategy = match env::var(ENV_TOKEN_STRATEGY) {
            Ok(raw) => raw.parse().unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to random token strategy");
                TokenStrategy::Random
            }),
            Err(_) => defaults.token_strategy,
        };

        Self {
            bind_addr: env::var(ENV_BIND_ADDR).unwrap_or(defaults.bind_addr),
            transaction_timeout: parse_var::<u64>(ENV_TX_TIMEOUT_MS)
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(defaults.transaction_timeout),
            token_strategy,
            token_max_attempts: parse_var::<u32>(ENV_TOKEN_MAX_ATTEMPTS)
                .filter(|n| *n > 0)
                .unwrap_or(defaults.token_max_attempts),
            retention: parse_var::<i64>(ENV_RETENTION_HOURS)
                .filter(|h| *h > 0)
                .map(chrono::Duration::hours)
                .unwrap_or(defaults.retention),
            retention_interval: parse_var::<u64>(ENV_RETENTION_INTERVAL_SECS)
                .filter(|s| *s > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.retention_interval),
            notification_provider: env::var(ENV_NOTIFICATION_PROVIDER)
                .unwrap_or(defaults.notification_provider),
        }
    }
}

fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|s| s.trim().parse().ok())
}
