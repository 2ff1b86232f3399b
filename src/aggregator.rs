//! Turns stored checks and outages into per-service reports.

use crate::clock::{self, DayWindow};
use crate::error::StoreError;
use crate::report::{
    DayStatus, DegradedService, HistoryEntry, OutageDetail, Overview, ServiceEntry,
    ServiceReport, TimelineDay, ONGOING, TIMEZONE,
};
use crate::store::{CheckStore, OutageStore, ServiceRegistry, Store};
use crate::{OutagePeriod, Service, Status, StatusCheck};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, error};

/// Percentage of operational checks, to one decimal. 100 when there are none.
#[must_use]
pub fn uptime_percentage(checks: &[StatusCheck]) -> f64 {
    if checks.is_empty() {
        return 100.0;
    }
    let operational = checks.iter().filter(|c| c.status.is_operational()).count();
    let ratio = operational as f64 * 100.0 / checks.len() as f64;
    (ratio * 10.0).round() / 10.0
}

#[must_use]
pub fn history_entry(check: &StatusCheck) -> HistoryEntry {
    HistoryEntry {
        time: clock::time_of_day(check.checked_at),
        status: check.status,
        response_time: check.response_time.unwrap_or(0),
        full_time: clock::iso8601(check.checked_at),
    }
}

#[must_use]
pub fn outage_detail(outage: &OutagePeriod) -> OutageDetail {
    let (end_time, duration) = match outage.resolved_at {
        Some(resolved_at) => {
            let minutes = outage
                .duration_minutes
                .or_else(|| outage.span().duration_minutes())
                .unwrap_or(0);
            (clock::time_of_day(resolved_at), format!("{minutes}min"))
        }
        None => (ONGOING.to_string(), ONGOING.to_string()),
    };
    OutageDetail {
        start_time: clock::time_of_day(outage.started_at),
        end_time,
        duration,
        status: "outage".to_string(),
    }
}

/// Classify one day from the outages that started on it.
#[must_use]
pub fn timeline_day(day: &DayWindow, outages: &[OutagePeriod], is_today: bool) -> TimelineDay {
    let status = if outages.is_empty() {
        DayStatus::Operational
    } else {
        DayStatus::Mixed
    };
    TimelineDay {
        date: day.date.format("%Y-%m-%d").to_string(),
        day_name: day.date.format("%A").to_string(),
        status,
        outage_count: outages.len(),
        is_today,
        outage_details: outages.iter().map(outage_detail).collect(),
    }
}

/// Build the report for one service as of `now`.
///
/// A service that has never been checked still gets a full report with
/// defaulted fields.
pub async fn build_service_report<S>(
    store: &S,
    service: &Service,
    now: DateTime<Utc>,
) -> Result<ServiceReport, StoreError>
where
    S: Store + ?Sized,
{
    let today_start = clock::today_start(now);
    let today_checks = store.checks_in_range(service.id, today_start, None).await?;

    let mut timeline = Vec::with_capacity(clock::TIMELINE_DAYS as usize);
    for (days_ago, day) in clock::timeline_windows(now).iter().enumerate() {
        let outages = store.outages_overlapping_day(service.id, day).await?;
        timeline.push(timeline_day(day, &outages, days_ago == 0));
    }
    timeline.reverse();

    let latest = store.latest_check(service.id).await?;
    debug!(
        service = %service.name,
        checks_today = today_checks.len(),
        "Aggregated service report"
    );

    Ok(ServiceReport {
        name: service.name.clone(),
        description: service.description.clone(),
        url: service.url.clone(),
        current_status: latest.as_ref().map_or(Status::Unknown, |c| c.status),
        response_time: latest
            .as_ref()
            .and_then(|c| c.response_time)
            .unwrap_or(0),
        uptime_today: uptime_percentage(&today_checks),
        today_history: today_checks.iter().map(history_entry).collect(),
        last_7_days_timeline: timeline,
        last_checked: latest.as_ref().map(|c| clock::iso8601(c.checked_at)),
        last_checked_display: latest.as_ref().map(|c| clock::short_display(c.checked_at)),
        timezone: TIMEZONE.to_string(),
    })
}

fn degraded(service: &Service, reason: String) -> ServiceEntry {
    ServiceEntry::Degraded(DegradedService::new(
        service.name.clone(),
        service.description.clone(),
        service.url.clone(),
        reason,
    ))
}

/// Build every active service's report concurrently.
///
/// Failing to list services fails the whole call. A failure inside one
/// service's aggregation only degrades that service's entry.
pub async fn collect_reports(
    store: Arc<dyn Store>,
    now: DateTime<Utc>,
) -> Result<Vec<ServiceEntry>, StoreError> {
    let services = store.active_services().await?;

    let mut tasks = JoinSet::new();
    for (index, service) in services.iter().cloned().enumerate() {
        let store = Arc::clone(&store);
        tasks.spawn(async move {
            let report = build_service_report(store.as_ref(), &service, now).await;
            (index, report)
        });
    }

    let mut entries: Vec<Option<ServiceEntry>> = vec![None; services.len()];
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, Ok(report))) => entries[index] = Some(ServiceEntry::Report(report)),
            Ok((index, Err(e))) => {
                error!(service = %services[index].name, "Failed to build report: {e}");
                entries[index] = Some(degraded(&services[index], e.to_string()));
            }
            Err(e) => error!("Report task failed: {e}"),
        }
    }

    // A task that panicked never reported its index; whatever is left is degraded.
    Ok(entries
        .into_iter()
        .zip(&services)
        .map(|(entry, service)| {
            entry.unwrap_or_else(|| degraded(service, "Report generation failed".to_string()))
        })
        .collect())
}

/// The full overview payload as of `now`.
pub async fn build_overview(
    store: Arc<dyn Store>,
    now: DateTime<Utc>,
) -> Result<Overview, StoreError> {
    let services = collect_reports(store, now).await?;
    Ok(Overview::assemble(services, now))
}
