//! Interfaces to the persistence collaborators, plus an in-memory implementation.
//!
//! The aggregator only reads through these traits. The ingestion actor is the
//! only caller of the mutating outage methods.

use crate::clock::DayWindow;
use crate::error::StoreError;
use crate::{
    NewService, OutageId, OutagePeriod, OutageSpan, Service, ServiceId, ServiceUpdate, StatusCheck,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

pub type Result<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait ServiceRegistry: Send + Sync {
    async fn register_service(&self, service: NewService, now: DateTime<Utc>) -> Result<Service>;

    async fn service_by_name(&self, name: &str) -> Result<Service>;

    /// Every service, active or not, in name order.
    async fn list_services(&self) -> Result<Vec<Service>>;

    /// Active services in name order.
    async fn active_services(&self) -> Result<Vec<Service>>;

    async fn update_service(&self, name: &str, update: ServiceUpdate) -> Result<Service>;
}

#[async_trait]
pub trait CheckStore: Send + Sync {
    async fn append_check(&self, check: StatusCheck) -> Result<()>;

    /// Checks with `start <= checked_at`, and `checked_at <= end` when an end is
    /// given, ascending by `checked_at`. Ties keep append order.
    async fn checks_in_range(
        &self,
        service_id: ServiceId,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<StatusCheck>>;

    /// Full history, ascending.
    async fn all_checks(&self, service_id: ServiceId) -> Result<Vec<StatusCheck>>;

    async fn latest_check(&self, service_id: ServiceId) -> Result<Option<StatusCheck>>;
}

#[async_trait]
pub trait OutageStore: Send + Sync {
    async fn open_outage(&self, service_id: ServiceId) -> Result<Option<OutagePeriod>>;

    async fn create_outage(
        &self,
        service_id: ServiceId,
        started_at: DateTime<Utc>,
    ) -> Result<OutagePeriod>;

    async fn resolve_outage(
        &self,
        id: OutageId,
        resolved_at: DateTime<Utc>,
    ) -> Result<OutagePeriod>;

    /// Outages attributed to `day`: those whose `started_at` falls inside it.
    /// Ordered by `started_at`, newest first.
    async fn outages_overlapping_day(
        &self,
        service_id: ServiceId,
        day: &DayWindow,
    ) -> Result<Vec<OutagePeriod>>;

    /// Every outage for the service, newest first.
    async fn outages(&self, service_id: ServiceId) -> Result<Vec<OutagePeriod>>;
}

/// Everything the status board needs from persistence.
pub trait Store: ServiceRegistry + CheckStore + OutageStore {}

impl<T: ServiceRegistry + CheckStore + OutageStore> Store for T {}

#[derive(Default)]
struct Inner {
    services: BTreeMap<String, Service>,
    checks: HashMap<ServiceId, Vec<StatusCheck>>,
    outages: BTreeMap<OutageId, OutagePeriod>,
    next_service_id: ServiceId,
    next_outage_id: OutageId,
}

impl Inner {
    fn service_exists(&self, service_id: ServiceId) -> bool {
        self.services.values().any(|s| s.id == service_id)
    }

    fn outages_newest_first<'a>(
        &'a self,
        service_id: ServiceId,
    ) -> impl Iterator<Item = &'a OutagePeriod> + 'a {
        let mut outages: Vec<&OutagePeriod> = self
            .outages
            .values()
            .filter(|o| o.service_id == service_id)
            .collect();
        outages.sort_by(|a, b| b.started_at.cmp(&a.started_at).then(b.id.cmp(&a.id)));
        outages.into_iter()
    }
}

/// Process-local store. Each call takes its own lock, so a single read sees a
/// consistent snapshot of whatever it queries.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ServiceRegistry for MemoryStore {
    async fn register_service(&self, service: NewService, now: DateTime<Utc>) -> Result<Service> {
        let mut inner = self.inner.write().await;
        if inner.services.contains_key(&service.name) {
            return Err(StoreError::NameConflict(service.name));
        }
        inner.next_service_id += 1;
        let created = Service {
            id: inner.next_service_id,
            name: service.name,
            description: service.description,
            url: service.url,
            is_active: service.is_active,
            created_at: now,
        };
        inner.services.insert(created.name.clone(), created.clone());
        Ok(created)
    }

    async fn service_by_name(&self, name: &str) -> Result<Service> {
        self.inner
            .read()
            .await
            .services
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::ServiceNotFound(name.to_string()))
    }

    async fn list_services(&self) -> Result<Vec<Service>> {
        Ok(self.inner.read().await.services.values().cloned().collect())
    }

    async fn active_services(&self) -> Result<Vec<Service>> {
        Ok(self
            .inner
            .read()
            .await
            .services
            .values()
            .filter(|s| s.is_active)
            .cloned()
            .collect())
    }

    async fn update_service(&self, name: &str, update: ServiceUpdate) -> Result<Service> {
        let mut inner = self.inner.write().await;
        let service = inner
            .services
            .get_mut(name)
            .ok_or_else(|| StoreError::ServiceNotFound(name.to_string()))?;
        service.apply(update);
        Ok(service.clone())
    }
}

#[async_trait]
impl CheckStore for MemoryStore {
    async fn append_check(&self, check: StatusCheck) -> Result<()> {
        let mut inner = self.inner.write().await;
        if !inner.service_exists(check.service_id) {
            return Err(StoreError::ServiceNotFound(check.service_id.to_string()));
        }
        let log = inner.checks.entry(check.service_id).or_default();
        // Keep the log sorted even if a caller bypasses the tracker's ordering check.
        let at = log.partition_point(|c| c.checked_at <= check.checked_at);
        log.insert(at, check);
        Ok(())
    }

    async fn checks_in_range(
        &self,
        service_id: ServiceId,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<StatusCheck>> {
        let inner = self.inner.read().await;
        let Some(log) = inner.checks.get(&service_id) else {
            return Ok(Vec::new());
        };
        let from = log.partition_point(|c| c.checked_at < start);
        Ok(log[from..]
            .iter()
            .take_while(|c| end.map_or(true, |end| c.checked_at <= end))
            .cloned()
            .collect())
    }

    async fn all_checks(&self, service_id: ServiceId) -> Result<Vec<StatusCheck>> {
        Ok(self
            .inner
            .read()
            .await
            .checks
            .get(&service_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn latest_check(&self, service_id: ServiceId) -> Result<Option<StatusCheck>> {
        Ok(self
            .inner
            .read()
            .await
            .checks
            .get(&service_id)
            .and_then(|log| log.last().cloned()))
    }
}

#[async_trait]
impl OutageStore for MemoryStore {
    async fn open_outage(&self, service_id: ServiceId) -> Result<Option<OutagePeriod>> {
        Ok(self
            .inner
            .read()
            .await
            .outages
            .values()
            .find(|o| o.service_id == service_id && o.resolved_at.is_none())
            .cloned())
    }

    async fn create_outage(
        &self,
        service_id: ServiceId,
        started_at: DateTime<Utc>,
    ) -> Result<OutagePeriod> {
        let mut inner = self.inner.write().await;
        if !inner.service_exists(service_id) {
            return Err(StoreError::ServiceNotFound(service_id.to_string()));
        }
        inner.next_outage_id += 1;
        let outage = OutagePeriod {
            id: inner.next_outage_id,
            service_id,
            started_at,
            resolved_at: None,
            duration_minutes: None,
        };
        inner.outages.insert(outage.id, outage.clone());
        Ok(outage)
    }

    async fn resolve_outage(
        &self,
        id: OutageId,
        resolved_at: DateTime<Utc>,
    ) -> Result<OutagePeriod> {
        let mut inner = self.inner.write().await;
        let outage = inner
            .outages
            .get_mut(&id)
            .ok_or(StoreError::OutageNotFound(id))?;
        let span = OutageSpan {
            started_at: outage.started_at,
            resolved_at: Some(resolved_at),
        };
        outage.resolved_at = span.resolved_at;
        outage.duration_minutes = span.duration_minutes();
        Ok(outage.clone())
    }

    async fn outages_overlapping_day(
        &self,
        service_id: ServiceId,
        day: &DayWindow,
    ) -> Result<Vec<OutagePeriod>> {
        let inner = self.inner.read().await;
        Ok(inner
            .outages_newest_first(service_id)
            .filter(|o| day.contains(o.started_at))
            .cloned()
            .collect())
    }

    async fn outages(&self, service_id: ServiceId) -> Result<Vec<OutagePeriod>> {
        let inner = self.inner.read().await;
        Ok(inner.outages_newest_first(service_id).cloned().collect())
    }
}
