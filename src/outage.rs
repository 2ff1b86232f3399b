//! Outage boundary detection over a service's check stream.
//!
//! `OutageTracker` is a two-state machine (no outage / outage open). It is
//! driven one check at a time by `process_check`, and `rebuild` replays a whole
//! history through the same transition function, so incremental and batch
//! processing cannot disagree.

use crate::error::TrackerError;
use crate::{OutageSpan, StatusCheck};
use chrono::{DateTime, Utc};

/// What a single check did to the outage record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutageEvent {
    /// A non-operational check arrived while no outage was open.
    Opened { started_at: DateTime<Utc> },
    /// An operational check closed the open outage.
    Resolved {
        started_at: DateTime<Utc>,
        resolved_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutageTracker {
    open: Option<DateTime<Utc>>,
    latest: Option<DateTime<Utc>>,
}

impl OutageTracker {
    /// A tracker with no history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start of the currently open outage.
    #[must_use]
    pub fn open_since(&self) -> Option<DateTime<Utc>> {
        self.open
    }

    #[must_use]
    pub fn latest(&self) -> Option<DateTime<Utc>> {
        self.latest
    }

    /// Apply one check. On error the tracker is left untouched.
    pub fn process_check(
        &mut self,
        check: &StatusCheck,
    ) -> Result<Option<OutageEvent>, TrackerError> {
        if let Some(latest) = self.latest {
            if check.checked_at < latest {
                return Err(TrackerError::InvalidTimeOrdering {
                    checked_at: check.checked_at,
                    latest,
                });
            }
        }
        self.latest = Some(check.checked_at);

        let event = match (self.open, check.status.is_operational()) {
            (None, false) => {
                self.open = Some(check.checked_at);
                Some(OutageEvent::Opened {
                    started_at: check.checked_at,
                })
            }
            (Some(started_at), true) => {
                self.open = None;
                Some(OutageEvent::Resolved {
                    started_at,
                    resolved_at: check.checked_at,
                })
            }
            (Some(_), false) | (None, true) => None,
        };
        Ok(event)
    }

    /// Reconstruct every outage from a history, from a clean state.
    #[must_use]
    pub fn rebuild<'a, I>(history: I) -> Rebuilt
    where
        I: IntoIterator<Item = &'a StatusCheck>,
    {
        let mut tracker = Self::new();
        let mut rebuilt = Rebuilt::default();
        for check in history {
            match tracker.process_check(check) {
                Ok(Some(event)) => rebuilt.apply(event),
                Ok(None) => {}
                Err(e) => rebuilt.rejected.push(e),
            }
        }
        rebuilt.tracker = tracker;
        rebuilt
    }
}

/// Result of a batch reconstruction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rebuilt {
    /// Outages in the order they started.
    pub spans: Vec<OutageSpan>,
    pub rejected: Vec<TrackerError>,
    /// State after the last check, ready to continue incrementally.
    pub tracker: OutageTracker,
}

impl Rebuilt {
    /// Fold one event into the span list, the same way the store is updated
    /// during incremental ingestion.
    pub fn apply(&mut self, event: OutageEvent) {
        match event {
            OutageEvent::Opened { started_at } => self.spans.push(OutageSpan::open(started_at)),
            OutageEvent::Resolved { resolved_at, .. } => {
                if let Some(open) = self.spans.iter_mut().rev().find(|s| s.is_ongoing()) {
                    open.resolved_at = Some(resolved_at);
                }
            }
        }
    }

    #[must_use]
    pub fn ongoing_count(&self) -> usize {
        self.spans.iter().filter(|s| s.is_ongoing()).count()
    }

    /// The trailing outage, if the history ends inside one.
    #[must_use]
    pub fn open_span(&self) -> Option<OutageSpan> {
        self.spans.last().copied().filter(OutageSpan::is_ongoing)
    }
}
