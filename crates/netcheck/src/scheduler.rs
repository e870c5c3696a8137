use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval, timeout};
use tracing::{debug, info, warn};

use crate::{DEFAULT_POLL_INTERVAL, MIN_POLL_INTERVAL};
use crate::prober::{ProbeOutcome, Prober};
use crate::registry::{InterfaceKey, Registry, Target};
use crate::store::{StatusRecord, StatusStore};

/// Timing of the pollers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Fixed period between two probes of the same interface
    pub interval: Duration,
    /// How long a stopped poller may take to exit before it is aborted
    pub stop_grace: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self { interval: DEFAULT_POLL_INTERVAL, stop_grace: Duration::from_millis(2500) }
    }
}

/// What a reconciliation changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Keys that got a new poller
    pub started: Vec<InterfaceKey>,
    /// Keys whose poller was stopped for good
    pub stopped: Vec<InterfaceKey>,
    /// Keys whose address changed, so their poller was replaced
    pub restarted: Vec<InterfaceKey>,
    /// Pollers left running untouched
    pub kept: usize,
}

impl ReconcileReport {
    pub fn is_noop(&self) -> bool {
        self.started.is_empty() && self.stopped.is_empty() && self.restarted.is_empty()
    }
}

struct Poller {
    address: IpAddr,
    shutdown_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Keeps exactly one recurring poller per registry interface
pub struct PollScheduler {
    prober: Arc<dyn Prober>,
    store: StatusStore,
    settings: PollSettings,
    pollers: HashMap<InterfaceKey, Poller>,
}

impl PollScheduler {
    /// Intervals below [`MIN_POLL_INTERVAL`] are raised to it
    pub fn new(prober: Arc<dyn Prober>, store: StatusStore, mut settings: PollSettings) -> Self {
        if settings.interval < MIN_POLL_INTERVAL {
            warn!(
                requested = ?settings.interval,
                minimum = ?MIN_POLL_INTERVAL,
                "Poll interval too short, using the minimum"
            );
            settings.interval = MIN_POLL_INTERVAL;
        }
        Self { prober, store, settings, pollers: HashMap::new() }
    }

    pub fn settings(&self) -> PollSettings {
        self.settings
    }

    /// Make the running pollers match `registry`.
    ///
    /// Unchanged interfaces keep their poller and timing. Removed interfaces
    /// are stopped and their records dropped before this returns, so no
    /// further writes for them can happen. New interfaces are probed at once.
    /// A poller whose task has died is replaced as if its address changed.
    pub async fn reconcile(&mut self, registry: &Registry) -> ReconcileReport {
        let targets: Vec<Target> = registry.targets().collect();
        let desired: HashMap<&InterfaceKey, IpAddr> =
            targets.iter().map(|target| (&target.key, target.address)).collect();

        let stale: Vec<InterfaceKey> = self
            .pollers
            .iter()
            .filter(|(key, poller)| {
                poller.handle.is_finished() || desired.get(key) != Some(&poller.address)
            })
            .map(|(key, _)| key.clone())
            .collect();

        let mut report = ReconcileReport::default();
        let mut stopping = Vec::with_capacity(stale.len());
        for key in stale {
            if let Some(poller) = self.pollers.remove(&key) {
                if poller.handle.is_finished() {
                    warn!(interface = %key, "Poller exited unexpectedly");
                }
                if desired.contains_key(&key) {
                    report.restarted.push(key.clone());
                } else {
                    report.stopped.push(key.clone());
                }
                stopping.push(stop_poller(key, poller, self.settings.stop_grace, &self.store));
            }
        }
        join_all(stopping).await;

        let restarted: HashSet<&InterfaceKey> = report.restarted.iter().collect();
        let mut started = Vec::new();
        for target in &targets {
            if self.pollers.contains_key(&target.key) {
                report.kept += 1;
                continue;
            }
            if !restarted.contains(&target.key) {
                started.push(target.key.clone());
            }
            let poller = self.spawn_poller(target.clone());
            self.pollers.insert(target.key.clone(), poller);
        }
        report.started = started;

        info!(
            started = report.started.len(),
            stopped = report.stopped.len(),
            restarted = report.restarted.len(),
            kept = report.kept,
            "Reconciled pollers"
        );
        report
    }

    /// Keys that currently have a running poller, sorted
    pub fn active_keys(&self) -> Vec<InterfaceKey> {
        let mut keys: Vec<InterfaceKey> = self.live().map(|(key, _)| key.clone()).collect();
        keys.sort();
        keys
    }

    /// Number of running pollers
    pub fn len(&self) -> usize {
        self.live().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn live(&self) -> impl Iterator<Item = (&InterfaceKey, &Poller)> {
        self.pollers.iter().filter(|(_, poller)| !poller.handle.is_finished())
    }

    /// Stop every poller and wait for them to exit
    pub async fn shutdown(&mut self) {
        let grace = self.settings.stop_grace;
        let store = &self.store;
        let stopping =
            self.pollers.drain().map(|(key, poller)| stop_poller(key, poller, grace, store));
        join_all(stopping).await;
        info!("All pollers stopped");
    }

    fn spawn_poller(&self, target: Target) -> Poller {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let address = target.address;
        let handle = tokio::spawn(run_poller(
            target,
            self.prober.clone(),
            self.store.clone(),
            self.settings.interval,
            shutdown_rx,
        ));
        Poller { address, shutdown_tx, handle }
    }
}

impl Drop for PollScheduler {
    fn drop(&mut self) {
        for poller in self.pollers.values() {
            poller.handle.abort();
        }
    }
}

async fn stop_poller(key: InterfaceKey, poller: Poller, grace: Duration, store: &StatusStore) {
    let Poller { shutdown_tx, mut handle, .. } = poller;

    // Already exited if the receiver is gone
    let _ = shutdown_tx.send(());

    if timeout(grace, &mut handle).await.is_err() {
        warn!(interface = %key, "Poller did not stop within {:?}, aborting", grace);
        handle.abort();
        let _ = handle.await;
    }

    store.remove(&key);
    info!(interface = %key, "Stopped poller");
}

/// Probe `target` right away, then once per `period` until shut down.
///
/// Shutdown is checked both while waiting for the next tick and while a probe
/// is in flight; an interrupted probe is dropped without writing a result.
async fn run_poller(
    target: Target,
    prober: Arc<dyn Prober>,
    store: StatusStore,
    period: Duration,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let mut timer = interval(period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(interface = %target.key, address = %target.address, "Started poller");

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown_rx => break,
            _ = timer.tick() => {}
        }

        let result = tokio::select! {
            biased;
            _ = &mut shutdown_rx => break,
            result = prober.probe(target.address) => result,
        };

        match &result {
            Ok(ProbeOutcome::Reachable) => {
                debug!(interface = %target.key, address = %target.address, "Probe succeeded")
            }
            Ok(ProbeOutcome::Unreachable) => {
                debug!(interface = %target.key, address = %target.address, "Probe found no answer")
            }
            Err(e) => {
                warn!(
                    interface = %target.key,
                    address = %target.address,
                    error = %e,
                    "Probe failed"
                )
            }
        }

        store.record(StatusRecord::from_probe(target.key.clone(), &result, Utc::now()));
    }

    debug!(interface = %target.key, "Poller exited");
}
