//! UTC day windowing and the injectable source of "now".
//!
//! Every function here is pure: callers pass the reference instant explicitly.

use chrono::{DateTime, Days, NaiveDate, NaiveTime, SecondsFormat, Utc};
use std::sync::Mutex;

/// Number of calendar days shown in a service timeline, today included.
pub const TIMELINE_DAYS: u64 = 7;

/// One UTC calendar day, with both boundaries inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub date: NaiveDate,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DayWindow {
    #[must_use]
    pub fn for_date(date: NaiveDate) -> Self {
        let end_of_day = NaiveTime::from_hms_nano_opt(23, 59, 59, 999_999_999)
            .unwrap_or(NaiveTime::MIN);
        Self {
            date,
            start: date.and_time(NaiveTime::MIN).and_utc(),
            end: date.and_time(end_of_day).and_utc(),
        }
    }

    #[must_use]
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end
    }
}

/// Start of the UTC calendar day containing `now`.
#[must_use]
pub fn today_start(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_time(NaiveTime::MIN).and_utc()
}

/// The calendar day `days_ago` days before `now`'s day.
///
/// Falls back to the earliest representable day if the subtraction underflows,
/// which only happens for instants at the very start of chrono's range.
#[must_use]
pub fn day_window(now: DateTime<Utc>, days_ago: u64) -> DayWindow {
    let date = now
        .date_naive()
        .checked_sub_days(Days::new(days_ago))
        .unwrap_or(NaiveDate::MIN);
    DayWindow::for_date(date)
}

/// The last `TIMELINE_DAYS` days, today first.
#[must_use]
pub fn timeline_windows(now: DateTime<Utc>) -> Vec<DayWindow> {
    (0..TIMELINE_DAYS).map(|d| day_window(now, d)).collect()
}

/// `HH:MM`
#[must_use]
pub fn time_of_day(instant: DateTime<Utc>) -> String {
    instant.format("%H:%M").to_string()
}

/// RFC 3339 with an explicit `+00:00` offset, sub-second digits only when present.
#[must_use]
pub fn iso8601(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::AutoSi, false)
}

/// `HH:MM UTC`
#[must_use]
pub fn short_display(instant: DateTime<Utc>) -> String {
    instant.format("%H:%M UTC").to_string()
}

/// `YYYY-MM-DD HH:MM:SS UTC`
#[must_use]
pub fn long_display(instant: DateTime<Utc>) -> String {
    instant.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Source of the reference instant used for reports and defaulted check times.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}
