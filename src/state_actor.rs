//! Single writer for checks and outage records.
//!
//! All ingestion goes through one actor task, which owns an `OutageTracker` per
//! service. Reports read the store directly and never go through the actor.

use crate::error::{IngestError, StoreError};
use crate::outage::{OutageEvent, OutageTracker, Rebuilt};
use crate::store::{CheckStore, OutageStore, ServiceRegistry, Store};
use crate::{
    NewService, OutagePeriod, OutageSpan, Service, ServiceId, ServiceUpdate, Status, StatusCheck,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// A probe result as submitted by a prober.
#[derive(Debug, Clone)]
pub struct CheckSubmission {
    pub status: Status,
    pub response_time: Option<u32>,
    pub checked_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Recorded {
    pub check: StatusCheck,
    /// The outage this check opened or resolved, if any.
    pub outage: Option<OutagePeriod>,
}

/// Stored outages compared against a fresh reconstruction from the check log.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub stored: Vec<OutageSpan>,
    pub rebuilt: Vec<OutageSpan>,
    pub consistent: bool,
}

type Responder<T> = oneshot::Sender<Result<T, IngestError>>;

enum StateActorMessage {
    RegisterService {
        service: NewService,
        now: DateTime<Utc>,
        respond_to: Responder<Service>,
    },
    UpdateService {
        name: String,
        update: ServiceUpdate,
        respond_to: Responder<Service>,
    },
    RecordCheck {
        name: String,
        submission: CheckSubmission,
        respond_to: Responder<Recorded>,
    },
    Reconcile {
        name: String,
        respond_to: Responder<Reconciliation>,
    },
}

struct StateActor {
    receiver: mpsc::Receiver<StateActorMessage>,
    store: Arc<dyn Store>,
    trackers: HashMap<ServiceId, OutageTracker>,
}

impl StateActor {
    fn new(receiver: mpsc::Receiver<StateActorMessage>, store: Arc<dyn Store>) -> Self {
        Self {
            receiver,
            store,
            trackers: HashMap::new(),
        }
    }

    /// The tracker for a service. On first use it is rebuilt from the stored
    /// check log, and the open outage is brought in line with that replay.
    async fn tracker(&mut self, service: &Service) -> Result<OutageTracker, StoreError> {
        if let Some(tracker) = self.trackers.get(&service.id) {
            return Ok(*tracker);
        }
        let history = self.store.all_checks(service.id).await?;
        let replayed = OutageTracker::rebuild(&history);
        self.repair_open_outage(service, &replayed).await?;
        self.trackers.insert(service.id, replayed.tracker);
        Ok(replayed.tracker)
    }

    /// A check can be stored while the outage write that should follow it
    /// fails. Finish that write so stored outages match the check log again.
    async fn repair_open_outage(
        &self,
        service: &Service,
        replayed: &Rebuilt,
    ) -> Result<(), StoreError> {
        let stored = self.store.open_outage(service.id).await?;
        match (stored, replayed.open_span()) {
            (None, Some(span)) => {
                let known = self
                    .store
                    .outages(service.id)
                    .await?
                    .iter()
                    .any(|o| o.started_at == span.started_at);
                if known {
                    warn!(
                        service = %service.name,
                        started_at = %span.started_at,
                        "Check log shows an open outage that is stored as resolved"
                    );
                } else {
                    self.store.create_outage(service.id, span.started_at).await?;
                    warn!(
                        service = %service.name,
                        started_at = %span.started_at,
                        "Reopened missing outage"
                    );
                }
            }
            (Some(open), None) => {
                let resolved_at = replayed
                    .spans
                    .iter()
                    .find(|s| s.started_at == open.started_at)
                    .and_then(|s| s.resolved_at);
                match resolved_at {
                    Some(resolved_at) => {
                        self.store.resolve_outage(open.id, resolved_at).await?;
                        warn!(service = %service.name, %resolved_at, "Resolved outage left open");
                    }
                    None => warn!(
                        service = %service.name,
                        started_at = %open.started_at,
                        "Stored open outage has no failing check behind it"
                    ),
                }
            }
            (Some(open), Some(span)) if open.started_at != span.started_at => warn!(
                service = %service.name,
                stored = %open.started_at,
                replayed = %span.started_at,
                "Open outage start disagrees with the check log"
            ),
            _ => {}
        }
        Ok(())
    }

    async fn update_service(
        &self,
        name: String,
        update: ServiceUpdate,
    ) -> Result<Service, IngestError> {
        let service = self.store.update_service(&name, update).await?;
        info!(service = %service.name, is_active = service.is_active, "Updated service");
        Ok(service)
    }

    async fn record_check(
        &mut self,
        name: String,
        submission: CheckSubmission,
    ) -> Result<Recorded, IngestError> {
        let service = self.store.service_by_name(&name).await?;
        if !service.is_active {
            return Err(IngestError::InactiveService(name));
        }
        let check = StatusCheck {
            service_id: service.id,
            checked_at: submission.checked_at,
            status: submission.status,
            response_time: submission.response_time,
        };

        // Work on a copy so a rejected check or a store failure leaves the
        // tracker where it was.
        let mut tracker = self.tracker(&service).await?;
        let event = tracker.process_check(&check).map_err(|e| {
            warn!(service = %name, "Rejected check: {e}");
            e
        })?;

        let outage = match self.persist(&service, &check, event).await {
            Ok(outage) => outage,
            Err(e) => {
                // The check may be stored without its outage write; replay it next time.
                self.trackers.remove(&service.id);
                return Err(e.into());
            }
        };
        self.trackers.insert(service.id, tracker);
        debug!(service = %name, status = %check.status, "Recorded check");

        Ok(Recorded { check, outage })
    }

    /// The check log is written first: it is what a later replay trusts.
    async fn persist(
        &self,
        service: &Service,
        check: &StatusCheck,
        event: Option<OutageEvent>,
    ) -> Result<Option<OutagePeriod>, StoreError> {
        self.store.append_check(check.clone()).await?;
        match event {
            Some(OutageEvent::Opened { started_at }) => {
                let outage = self.store.create_outage(service.id, started_at).await?;
                info!(service = %service.name, %started_at, "Outage opened");
                Ok(Some(outage))
            }
            Some(OutageEvent::Resolved { resolved_at, .. }) => {
                let open = self
                    .store
                    .open_outage(service.id)
                    .await?
                    .ok_or_else(|| StoreError::NoOpenOutage(service.name.clone()))?;
                let outage = self.store.resolve_outage(open.id, resolved_at).await?;
                info!(
                    service = %service.name,
                    %resolved_at,
                    duration_minutes = ?outage.duration_minutes,
                    "Outage resolved"
                );
                Ok(Some(outage))
            }
            None => Ok(None),
        }
    }

    async fn reconcile(&self, name: String) -> Result<Reconciliation, IngestError> {
        let service = self.store.service_by_name(&name).await?;
        let history = self.store.all_checks(service.id).await?;
        let rebuilt = OutageTracker::rebuild(&history).spans;

        let mut stored: Vec<OutageSpan> = self
            .store
            .outages(service.id)
            .await?
            .iter()
            .map(OutagePeriod::span)
            .collect();
        stored.reverse();

        let consistent = stored == rebuilt;
        if !consistent {
            warn!(
                service = %name,
                stored = stored.len(),
                rebuilt = rebuilt.len(),
                "Stored outages disagree with the check history"
            );
        }
        Ok(Reconciliation {
            stored,
            rebuilt,
            consistent,
        })
    }

    async fn handle_message(&mut self, msg: StateActorMessage) {
        // Errors when sending can happen e.g. if the `select!` macro is used to cancel waiting
        // for the response. We can safely ignore these.
        match msg {
            StateActorMessage::RegisterService {
                service,
                now,
                respond_to,
            } => {
                let registered = self.store.register_service(service, now).await;
                if let Ok(service) = &registered {
                    info!(service = %service.name, url = %service.url, "Registered service");
                }
                let _ = respond_to.send(registered.map_err(IngestError::from));
            }
            StateActorMessage::UpdateService {
                name,
                update,
                respond_to,
            } => {
                let _ = respond_to.send(self.update_service(name, update).await);
            }
            StateActorMessage::RecordCheck {
                name,
                submission,
                respond_to,
            } => {
                let _ = respond_to.send(self.record_check(name, submission).await);
            }
            StateActorMessage::Reconcile { name, respond_to } => {
                let _ = respond_to.send(self.reconcile(name).await);
            }
        }
    }

    async fn run(&mut self) {
        while let Some(msg) = self.receiver.recv().await {
            self.handle_message(msg).await;
        }
    }
}

#[derive(Clone)]
pub struct StateActorHandle {
    sender: mpsc::Sender<StateActorMessage>,
}

impl StateActorHandle {
    pub fn new(store: Arc<dyn Store>, capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity);
        let mut actor = StateActor::new(receiver, store);
        tokio::spawn(async move { actor.run().await });

        Self { sender }
    }

    async fn request<T>(
        &self,
        message: impl FnOnce(Responder<T>) -> StateActorMessage,
    ) -> Result<T, IngestError> {
        let (send, recv) = oneshot::channel();

        // If this send fails, so does the recv.await below.
        let _ = self.sender.send(message(send)).await;
        recv.await.map_err(|_| IngestError::ActorUnavailable)?
    }

    pub async fn register_service(
        &self,
        service: NewService,
        now: DateTime<Utc>,
    ) -> Result<Service, IngestError> {
        self.request(|respond_to| StateActorMessage::RegisterService {
            service,
            now,
            respond_to,
        })
        .await
    }

    pub async fn update_service(
        &self,
        name: String,
        update: ServiceUpdate,
    ) -> Result<Service, IngestError> {
        self.request(|respond_to| StateActorMessage::UpdateService {
            name,
            update,
            respond_to,
        })
        .await
    }

    pub async fn record_check(
        &self,
        name: String,
        submission: CheckSubmission,
    ) -> Result<Recorded, IngestError> {
        self.request(|respond_to| StateActorMessage::RecordCheck {
            name,
            submission,
            respond_to,
        })
        .await
    }

    pub async fn reconcile(&self, name: String) -> Result<Reconciliation, IngestError> {
        self.request(|respond_to| StateActorMessage::Reconcile { name, respond_to })
            .await
    }
}
