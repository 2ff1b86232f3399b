//! Error types shared by the store, the outage tracker and ingestion.

use crate::OutageId;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Service {0} not found")]
    ServiceNotFound(String),

    #[error("A service named {0} already exists")]
    NameConflict(String),

    #[error("Outage {0} not found")]
    OutageNotFound(OutageId),

    #[error("Service {0} has no open outage to resolve")]
    NoOpenOutage(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrackerError {
    /// The check predates a check the tracker has already accepted.
    #[error("Check at {checked_at} is older than the latest accepted check at {latest}")]
    InvalidTimeOrdering {
        checked_at: DateTime<Utc>,
        latest: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum IngestError {
    #[error(transparent)]
    Tracker(#[from] TrackerError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Service {0} is not active")]
    InactiveService(String),

    #[error("Ingestion actor is not running")]
    ActorUnavailable,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid service seed file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Invalid(String),
}
