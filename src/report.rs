//! Serialized shape of the status overview.
//!
//! Nothing here computes anything beyond formatting; the numbers come from
//! the aggregator.

use crate::clock::{iso8601, long_display};
use crate::Status;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const TIMEZONE: &str = "UTC";
pub const ONGOING: &str = "Ongoing";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub time: String,
    pub status: Status,
    pub response_time: u32,
    pub full_time: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DayStatus {
    Operational,
    Mixed,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct OutageDetail {
    pub start_time: String,
    /// `HH:MM`, or `Ongoing`
    pub end_time: String,
    /// `<N>min`, or `Ongoing`
    pub duration: String,
    pub status: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TimelineDay {
    pub date: String,
    pub day_name: String,
    pub status: DayStatus,
    pub outage_count: usize,
    pub is_today: bool,
    pub outage_details: Vec<OutageDetail>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ServiceReport {
    pub name: String,
    pub description: String,
    pub url: String,
    pub current_status: Status,
    pub response_time: u32,
    pub uptime_today: f64,
    pub today_history: Vec<HistoryEntry>,
    pub last_7_days_timeline: Vec<TimelineDay>,
    pub last_checked: Option<String>,
    pub last_checked_display: Option<String>,
    pub timezone: String,
}

/// Placeholder for a service whose report could not be built.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DegradedService {
    pub name: String,
    pub description: String,
    pub url: String,
    pub current_status: Status,
    pub degraded: bool,
    pub error: String,
    pub timezone: String,
}

impl DegradedService {
    #[must_use]
    pub fn new(name: String, description: String, url: String, error: String) -> Self {
        Self {
            name,
            description,
            url,
            current_status: Status::Unknown,
            degraded: true,
            error,
            timezone: TIMEZONE.to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum ServiceEntry {
    Degraded(DegradedService),
    Report(ServiceReport),
}

impl ServiceEntry {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Report(r) => &r.name,
            Self::Degraded(d) => &d.name,
        }
    }

    #[must_use]
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded(_))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Overview {
    pub services: Vec<ServiceEntry>,
    pub last_updated: String,
    pub last_updated_display: String,
    pub timezone: String,
}

impl Overview {
    /// Wrap per-service entries with the generation time.
    #[must_use]
    pub fn assemble(services: Vec<ServiceEntry>, now: DateTime<Utc>) -> Self {
        Self {
            services,
            last_updated: iso8601(now),
            last_updated_display: long_display(now),
            timezone: TIMEZONE.to_string(),
        }
    }
}
