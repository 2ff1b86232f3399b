//! HTTP surface: the overview endpoint, the prober's write path and service admin.

use crate::aggregator::{build_overview, build_service_report};
use crate::api_util::ApiError;
use crate::clock::Clock;
use crate::report::{Overview, ServiceReport};
use crate::state_actor::{CheckSubmission, Reconciliation, Recorded, StateActorHandle};
use crate::store::{CheckStore, OutageStore, ServiceRegistry, Store};
use crate::{NewService, OutagePeriod, Service, ServiceUpdate, Status, StatusCheck};
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{de::Error as _, Deserialize, Deserializer};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub actor: StateActorHandle,
    pub clock: Arc<dyn Clock>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status/overview", get(get_overview))
        .route("/services", get(list_services))
        .route("/services/{name}", put(put_service).patch(patch_service))
        .route("/services/{name}/checks", post(post_check).get(get_checks))
        .route("/services/{name}/report", get(get_report))
        .route("/services/{name}/outages", get(get_outages))
        .route("/services/{name}/outages/reconcile", post(post_reconcile))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Deserialize)]
pub struct ServiceRegistration {
    #[serde(default)]
    description: String,
    url: String,
    #[serde(default)]
    is_active: Option<bool>,
}

#[derive(Deserialize)]
pub struct CheckRequest {
    status: Status,
    #[serde(default, deserialize_with = "whole_millis")]
    response_time: Option<u32>,
    #[serde(default)]
    checked_at: Option<DateTime<Utc>>,
}

/// Fractional milliseconds are accepted and rounded to the
/// nearest whole millisecond.
fn whole_millis<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(ms) = Option::<f64>::deserialize(deserializer)? else {
        return Ok(None);
    };
    if !ms.is_finite() || ms < 0.0 || ms.round() > f64::from(u32::MAX) {
        return Err(D::Error::custom(format!(
            "response_time must be a non-negative number of milliseconds, got {ms}"
        )));
    }
    Ok(Some(ms.round() as u32))
}

#[derive(Deserialize)]
pub struct ServiceFilter {
    #[serde(default)]
    is_active: Option<bool>,
    /// Case-insensitive substring of the name or URL.
    #[serde(default)]
    search: Option<String>,
}

impl ServiceFilter {
    fn matches(&self, service: &Service) -> bool {
        if self.is_active.is_some_and(|active| active != service.is_active) {
            return false;
        }
        self.search.as_deref().map_or(true, |needle| {
            let needle = needle.to_lowercase();
            service.name.to_lowercase().contains(&needle)
                || service.url.to_lowercase().contains(&needle)
        })
    }
}

#[derive(Deserialize)]
pub struct CheckFilter {
    #[serde(default)]
    status: Option<Status>,
    #[serde(default)]
    since: Option<DateTime<Utc>>,
    #[serde(default)]
    until: Option<DateTime<Utc>>,
}

async fn health() -> &'static str {
    "ok"
}

async fn get_overview(State(state): State<AppState>) -> Result<Json<Overview>, ApiError> {
    let overview = build_overview(Arc::clone(&state.store), state.clock.now()).await?;
    Ok(Json(overview))
}

async fn list_services(
    State(state): State<AppState>,
    filter: Result<Query<ServiceFilter>, QueryRejection>,
) -> Result<Json<Vec<Service>>, ApiError> {
    let Query(filter) = filter?;
    let mut services = state.store.list_services().await?;
    services.retain(|s| filter.matches(s));
    Ok(Json(services))
}

async fn put_service(
    State(state): State<AppState>,
    Path(name): Path<String>,
    registration: Result<Json<ServiceRegistration>, JsonRejection>,
) -> Result<(StatusCode, Json<Service>), ApiError> {
    let Json(registration) = registration?;
    let service = NewService {
        name,
        description: registration.description,
        url: registration.url,
        is_active: registration.is_active.unwrap_or(true),
    };
    let created = state
        .actor
        .register_service(service, state.clock.now())
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn patch_service(
    State(state): State<AppState>,
    Path(name): Path<String>,
    update: Result<Json<ServiceUpdate>, JsonRejection>,
) -> Result<Json<Service>, ApiError> {
    let Json(update) = update?;
    Ok(Json(state.actor.update_service(name, update).await?))
}

async fn post_check(
    State(state): State<AppState>,
    Path(name): Path<String>,
    request: Result<Json<CheckRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Recorded>), ApiError> {
    let Json(request) = request?;
    let submission = CheckSubmission {
        status: request.status,
        response_time: request.response_time,
        checked_at: request.checked_at.unwrap_or_else(|| state.clock.now()),
    };
    let recorded = state.actor.record_check(name, submission).await?;
    Ok((StatusCode::CREATED, Json(recorded)))
}

/// Stored checks, newest first.
async fn get_checks(
    State(state): State<AppState>,
    Path(name): Path<String>,
    filter: Result<Query<CheckFilter>, QueryRejection>,
) -> Result<Json<Vec<StatusCheck>>, ApiError> {
    let Query(filter) = filter?;
    let service = state.store.service_by_name(&name).await?;
    let mut checks = match filter.since {
        Some(since) => {
            state
                .store
                .checks_in_range(service.id, since, filter.until)
                .await?
        }
        None => {
            let mut checks = state.store.all_checks(service.id).await?;
            if let Some(until) = filter.until {
                checks.retain(|c| c.checked_at <= until);
            }
            checks
        }
    };
    if let Some(status) = filter.status {
        checks.retain(|c| c.status == status);
    }
    checks.reverse();
    Ok(Json(checks))
}

async fn get_report(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ServiceReport>, ApiError> {
    let service = state.store.service_by_name(&name).await?;
    let report = build_service_report(state.store.as_ref(), &service, state.clock.now()).await?;
    Ok(Json(report))
}

async fn get_outages(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Vec<OutagePeriod>>, ApiError> {
    let service = state.store.service_by_name(&name).await?;
    Ok(Json(state.store.outages(service.id).await?))
}

async fn post_reconcile(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Reconciliation>, ApiError> {
    Ok(Json(state.actor.reconcile(name).await?))
}
