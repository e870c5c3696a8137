use std::sync::Arc;

use tracing::info;

use crate::error::ConfigError;
use crate::events::StatusEvent;
use crate::prober::Prober;
use crate::registry::{InterfaceKey, Registry};
use crate::scheduler::{PollScheduler, PollSettings, ReconcileReport};
use crate::store::{StatusStore, StatusView};

/// Polling runtime: created at startup, reconciled on reload, shut down on exit
pub struct Engine {
    store: StatusStore,
    scheduler: PollScheduler,
    registry: Arc<Registry>,
}

impl Engine {
    /// Create an engine with no targets
    pub fn new(prober: Arc<dyn Prober>, settings: PollSettings) -> Self {
        let store = StatusStore::new();
        let scheduler = PollScheduler::new(prober, store.clone(), settings);
        Self { store, scheduler, registry: Arc::new(Registry::empty()) }
    }

    /// Replace the registry and reconcile the pollers against it
    pub async fn apply(&mut self, registry: Registry) -> ReconcileReport {
        let report = self.scheduler.reconcile(&registry).await;

        let devices = registry.devices().len();
        let interfaces = registry.len();
        self.registry = Arc::new(registry);

        info!(devices, interfaces, "Applied device configuration");
        self.store.publish(StatusEvent::Reloaded { devices, interfaces });
        report
    }

    /// Parse `raw` and apply it.
    ///
    /// An invalid configuration is returned to the caller and the running
    /// pollers stay as they are.
    pub async fn reload(&mut self, raw: &str) -> Result<ReconcileReport, ConfigError> {
        let registry = Registry::load(raw)?;
        Ok(self.apply(registry).await)
    }

    pub fn view(&self) -> StatusView {
        self.store.view()
    }

    /// The registry currently being polled
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn active_keys(&self) -> Vec<InterfaceKey> {
        self.scheduler.active_keys()
    }

    /// Stop all pollers and wait for them
    pub async fn shutdown(mut self) {
        self.scheduler.shutdown().await;
    }
}
