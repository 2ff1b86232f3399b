use anyhow::Context;
use clap::Parser;
use statusboard::api::{self, AppState};
use statusboard::clock::{Clock, SystemClock};
use statusboard::config::{self, Config};
use statusboard::{telemetry, IngestError, MemoryStore, StateActorHandle, StoreError};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    telemetry::init(config.log_format);

    let address = config.validate()?;
    info!("Starting statusboard v{}", env!("CARGO_PKG_VERSION"));

    let store = Arc::new(MemoryStore::new());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let actor = StateActorHandle::new(store.clone(), config.queue_capacity);

    if let Some(path) = &config.services {
        for service in config::load_services(path)? {
            let name = service.name.clone();
            match actor.register_service(service, clock.now()).await {
                Ok(_) => {}
                Err(IngestError::Store(StoreError::NameConflict(_))) => {
                    warn!(service = %name, "Duplicate service in seed file, skipping");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    let app = api::router(AppState {
        store,
        actor,
        clock,
    });

    info!("Binding to {address}");
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .context("Couldn't create TCP listener")?;
    info!("Starting API server");
    axum::serve(listener, app)
        .await
        .context("Couldn't start API server")?;
    Ok(())
}
