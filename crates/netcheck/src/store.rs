//! Shared status of every polled interface.
//!
//! Pollers write through [`StatusStore`], presentation layers read through the
//! read-only [`StatusView`]. Both wrap the same concurrent map; a write swaps
//! the whole [`StatusRecord`] in a single insert so a reader sees either the
//! old or the new record, never a mix.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::error::ProbeError;
use crate::events::StatusEvent;
use crate::prober::ProbeOutcome;
use crate::registry::InterfaceKey;

const EVENT_CAPACITY: usize = 256;

/// Latest known status of one interface
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusRecord {
    pub key: InterfaceKey,
    pub reachable: bool,
    pub checked_at: DateTime<Utc>,
    /// Set when the cycle ended in a probe error rather than a clean answer
    pub error: Option<String>,
}

impl StatusRecord {
    pub fn new(key: InterfaceKey, reachable: bool, checked_at: DateTime<Utc>) -> Self {
        Self { key, reachable, checked_at, error: None }
    }

    /// Fold a probe result into a record; errors count as unreachable
    pub fn from_probe(
        key: InterfaceKey,
        result: &Result<ProbeOutcome, ProbeError>,
        checked_at: DateTime<Utc>,
    ) -> Self {
        match result {
            Ok(outcome) => Self::new(key, outcome.is_reachable(), checked_at),
            Err(e) => Self { key, reachable: false, checked_at, error: Some(e.to_string()) },
        }
    }
}

struct Shared {
    records: DashMap<InterfaceKey, StatusRecord>,
    events: broadcast::Sender<StatusEvent>,
}

impl Shared {
    fn publish(&self, event: StatusEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

/// Write side of the status map, owned by the poll scheduler
#[derive(Clone)]
pub struct StatusStore {
    inner: Arc<Shared>,
}

impl Default for StatusStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusStore {
    pub fn new() -> Self {
        let (events, _rx) = broadcast::channel(EVENT_CAPACITY);
        Self { inner: Arc::new(Shared { records: DashMap::new(), events }) }
    }

    /// Store the result of one probe cycle
    pub fn record_result(&self, key: &InterfaceKey, reachable: bool, checked_at: DateTime<Utc>) {
        self.record(StatusRecord::new(key.clone(), reachable, checked_at));
    }

    /// Replace the record for `record.key` and notify subscribers
    pub fn record(&self, record: StatusRecord) {
        let previous = self.inner.records.insert(record.key.clone(), record.clone());

        match previous {
            Some(previous) if previous.reachable != record.reachable => {
                info!(
                    interface = %record.key,
                    reachable = record.reachable,
                    "Interface went {}",
                    if record.reachable { "online" } else { "offline" }
                );
            }
            None => debug!(
                interface = %record.key,
                reachable = record.reachable,
                "First status recorded"
            ),
            _ => {}
        }

        self.inner.publish(StatusEvent::Updated(record));
    }

    /// Drop the record of an interface that is no longer polled
    pub(crate) fn remove(&self, key: &InterfaceKey) {
        if self.inner.records.remove(key).is_some() {
            self.inner.publish(StatusEvent::Removed(key.clone()));
        }
    }

    pub(crate) fn publish(&self, event: StatusEvent) {
        self.inner.publish(event);
    }

    /// Read-only handle for presentation layers
    pub fn view(&self) -> StatusView {
        StatusView { inner: self.inner.clone() }
    }
}

/// Read side of the status map
#[derive(Clone)]
pub struct StatusView {
    inner: Arc<Shared>,
}

impl StatusView {
    /// Latest record, or `None` when no probe has finished yet
    pub fn get(&self, key: &InterfaceKey) -> Option<StatusRecord> {
        self.inner.records.get(key).map(|entry| entry.value().clone())
    }

    /// Snapshot of every record, ordered by key
    pub fn get_all(&self) -> BTreeMap<InterfaceKey, StatusRecord> {
        self.inner
            .records
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.records.is_empty()
    }

    /// Receive every change from now on.
    ///
    /// A receiver that falls behind gets `Lagged` and should re-read
    /// [`StatusView::get_all`].
    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.inner.events.subscribe()
    }
}
