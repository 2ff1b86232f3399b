use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

pub mod aggregator;
pub mod api;
pub mod api_util;
pub mod clock;
pub mod config;
pub mod error;
pub mod outage;
pub mod report;
pub mod state_actor;
pub mod store;
pub mod telemetry;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{ConfigError, IngestError, StoreError, TrackerError};
pub use outage::{OutageEvent, OutageTracker};
pub use report::{Overview, ServiceEntry, ServiceReport};
pub use state_actor::StateActorHandle;
pub use store::{MemoryStore, Store};

pub type ServiceId = u64;
pub type OutageId = u64;

/// A service that is being watched by a prober.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Service {
    pub id: ServiceId,
    pub name: String,
    pub description: String,
    pub url: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Registration data for a `Service`, before the store assigns it an id.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct NewService {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub url: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// Partial edit of a registered service. Absent fields are left unchanged.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceUpdate {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl Service {
    /// Apply the fields an update sets.
    pub fn apply(&mut self, update: ServiceUpdate) {
        if let Some(description) = update.description {
            self.description = description;
        }
        if let Some(url) = update.url {
            self.url = url;
        }
        if let Some(is_active) = update.is_active {
            self.is_active = is_active;
        }
    }
}

/// The status a single check observed.
///
/// Only `Operational` counts as up; every other variant is an outage as far as
/// the outage tracker is concerned.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Operational,
    Degraded,
    Down,
    Unknown,
}

impl Status {
    #[must_use]
    pub fn is_operational(self) -> bool {
        matches!(self, Self::Operational)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Operational => "operational",
            Self::Degraded => "degraded",
            Self::Down => "down",
            Self::Unknown => "unknown",
        }
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A point-in-time probe result. Immutable once stored.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StatusCheck {
    pub service_id: ServiceId,
    pub checked_at: DateTime<Utc>,
    pub status: Status,
    /// Response time in milliseconds, absent when the probe got no response.
    pub response_time: Option<u32>,
}

/// The boundaries of one outage, independent of where it is stored.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutageSpan {
    pub started_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl OutageSpan {
    #[must_use]
    pub fn open(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            resolved_at: None,
        }
    }

    #[must_use]
    pub fn is_ongoing(&self) -> bool {
        self.resolved_at.is_none()
    }

    /// Whole minutes between start and resolution, truncated. `None` while ongoing.
    #[must_use]
    pub fn duration_minutes(&self) -> Option<i64> {
        self.resolved_at
            .map(|resolved_at| (resolved_at - self.started_at).num_minutes())
    }
}

/// A persisted outage record. Written only by the outage tracker's owner.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct OutagePeriod {
    pub id: OutageId,
    pub service_id: ServiceId,
    pub started_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i64>,
}

impl OutagePeriod {
    #[must_use]
    pub fn span(&self) -> OutageSpan {
        OutageSpan {
            started_at: self.started_at,
            resolved_at: self.resolved_at,
        }
    }
}
