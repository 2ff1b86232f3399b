use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use statusboard::clock::DayWindow;
use statusboard::state_actor::CheckSubmission;
use statusboard::store::{CheckStore, OutageStore, Result, ServiceRegistry};
use statusboard::{
    IngestError, MemoryStore, NewService, OutageId, OutagePeriod, OutageSpan, Service, ServiceId,
    ServiceUpdate, StateActorHandle, Status, StatusCheck, StoreError,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A `MemoryStore` whose next outage write can be made to fail once.
#[derive(Default)]
struct InterruptedStore {
    inner: MemoryStore,
    fail_create: AtomicBool,
    fail_resolve: AtomicBool,
}

fn blip(flag: &AtomicBool) -> Result<()> {
    if flag.swap(false, Ordering::SeqCst) {
        return Err(StoreError::Unavailable("blip".into()));
    }
    Ok(())
}

#[async_trait]
impl ServiceRegistry for InterruptedStore {
    async fn register_service(&self, service: NewService, now: DateTime<Utc>) -> Result<Service> {
        self.inner.register_service(service, now).await
    }

    async fn service_by_name(&self, name: &str) -> Result<Service> {
        self.inner.service_by_name(name).await
    }

    async fn list_services(&self) -> Result<Vec<Service>> {
        self.inner.list_services().await
    }

    async fn active_services(&self) -> Result<Vec<Service>> {
        self.inner.active_services().await
    }

    async fn update_service(&self, name: &str, update: ServiceUpdate) -> Result<Service> {
        self.inner.update_service(name, update).await
    }
}

#[async_trait]
impl CheckStore for InterruptedStore {
    async fn append_check(&self, check: StatusCheck) -> Result<()> {
        self.inner.append_check(check).await
    }

    async fn checks_in_range(
        &self,
        service_id: ServiceId,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<StatusCheck>> {
        self.inner.checks_in_range(service_id, start, end).await
    }

    async fn all_checks(&self, service_id: ServiceId) -> Result<Vec<StatusCheck>> {
        self.inner.all_checks(service_id).await
    }

    async fn latest_check(&self, service_id: ServiceId) -> Result<Option<StatusCheck>> {
        self.inner.latest_check(service_id).await
    }
}

#[async_trait]
impl OutageStore for InterruptedStore {
    async fn open_outage(&self, service_id: ServiceId) -> Result<Option<OutagePeriod>> {
        self.inner.open_outage(service_id).await
    }

    async fn create_outage(
        &self,
        service_id: ServiceId,
        started_at: DateTime<Utc>,
    ) -> Result<OutagePeriod> {
        blip(&self.fail_create)?;
        self.inner.create_outage(service_id, started_at).await
    }

    async fn resolve_outage(&self, id: OutageId, resolved_at: DateTime<Utc>) -> Result<OutagePeriod> {
        blip(&self.fail_resolve)?;
        self.inner.resolve_outage(id, resolved_at).await
    }

    async fn outages_overlapping_day(
        &self,
        service_id: ServiceId,
        day: &DayWindow,
    ) -> Result<Vec<OutagePeriod>> {
        self.inner.outages_overlapping_day(service_id, day).await
    }

    async fn outages(&self, service_id: ServiceId) -> Result<Vec<OutagePeriod>> {
        self.inner.outages(service_id).await
    }
}

fn at(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 3, h, m, 0).unwrap()
}

fn check(status: Status, checked_at: DateTime<Utc>) -> CheckSubmission {
    CheckSubmission {
        status,
        response_time: Some(120),
        checked_at,
    }
}

async fn setup() -> (Arc<InterruptedStore>, StateActorHandle, ServiceId) {
    let store = Arc::new(InterruptedStore::default());
    let actor = StateActorHandle::new(store.clone(), 8);
    let service = actor
        .register_service(
            NewService {
                name: "api".into(),
                description: String::new(),
                url: "https://api.example.com".into(),
                is_active: true,
            },
            at(0, 0),
        )
        .await
        .unwrap();
    (store, actor, service.id)
}

async fn stored_spans(store: &InterruptedStore, service_id: ServiceId) -> Vec<OutageSpan> {
    let mut spans: Vec<OutageSpan> = store
        .outages(service_id)
        .await
        .unwrap()
        .iter()
        .map(OutagePeriod::span)
        .collect();
    spans.reverse();
    spans
}

#[tokio::test]
async fn test_failed_outage_open_is_recovered_on_next_check() {
    let (store, actor, service_id) = setup().await;
    actor.record_check("api".into(), check(Status::Operational, at(8, 0))).await.unwrap();

    store.fail_create.store(true, Ordering::SeqCst);
    let err = actor
        .record_check("api".into(), check(Status::Down, at(8, 5)))
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::Store(StoreError::Unavailable(_))));
    assert!(store.open_outage(service_id).await.unwrap().is_none());

    // The 08:05 check is already in the log, so the outage it started is
    // reopened with its original start and this check only continues it.
    let next = actor
        .record_check("api".into(), check(Status::Down, at(8, 10)))
        .await
        .unwrap();
    assert_eq!(next.outage, None);
    assert_eq!(stored_spans(&store, service_id).await, vec![OutageSpan::open(at(8, 5))]);
    assert_eq!(store.all_checks(service_id).await.unwrap().len(), 3);

    let resolved = actor
        .record_check("api".into(), check(Status::Operational, at(8, 30)))
        .await
        .unwrap();
    assert_eq!(resolved.outage.unwrap().duration_minutes, Some(25));

    let reconciliation = actor.reconcile("api".into()).await.unwrap();
    assert!(reconciliation.consistent);
    assert_eq!(reconciliation.stored, reconciliation.rebuilt);
}

#[tokio::test]
async fn test_failed_outage_resolve_is_recovered_on_next_check() {
    let (store, actor, service_id) = setup().await;
    actor.record_check("api".into(), check(Status::Down, at(9, 0))).await.unwrap();

    store.fail_resolve.store(true, Ordering::SeqCst);
    actor
        .record_check("api".into(), check(Status::Operational, at(9, 40)))
        .await
        .unwrap_err();
    assert!(store.open_outage(service_id).await.unwrap().is_some());

    let next = actor
        .record_check("api".into(), check(Status::Operational, at(9, 45)))
        .await
        .unwrap();
    assert_eq!(next.outage, None);
    assert_eq!(
        stored_spans(&store, service_id).await,
        vec![OutageSpan {
            started_at: at(9, 0),
            resolved_at: Some(at(9, 40)),
        }]
    );

    let outages = store.outages(service_id).await.unwrap();
    assert_eq!(outages[0].duration_minutes, Some(40));
    assert!(actor.reconcile("api".into()).await.unwrap().consistent);
}

#[tokio::test]
async fn test_recovery_when_failure_is_followed_by_a_restart() {
    let (store, actor, service_id) = setup().await;
    store.fail_create.store(true, Ordering::SeqCst);
    actor
        .record_check("api".into(), check(Status::Unknown, at(10, 0)))
        .await
        .unwrap_err();
    drop(actor);

    let restarted = StateActorHandle::new(store.clone(), 8);
    let resolved = restarted
        .record_check("api".into(), check(Status::Operational, at(10, 20)))
        .await
        .unwrap();
    let outage = resolved.outage.unwrap();
    assert_eq!(outage.started_at, at(10, 0));
    assert_eq!(outage.duration_minutes, Some(20));
    assert!(store.open_outage(service_id).await.unwrap().is_none());
    assert!(restarted.reconcile("api".into()).await.unwrap().consistent);
}
