//! Netcheck - reachability polling for configured network devices
//!
//! A device configuration is loaded into an immutable [`Registry`], the
//! [`PollScheduler`] keeps one recurring probe per interface running, and
//! every result lands in the [`StatusStore`] where presentation layers read
//! it through a [`StatusView`].

pub mod engine;
pub mod error;
pub mod events;
pub mod prober;
pub mod registry;
pub mod scheduler;
pub mod store;

pub use engine::Engine;
pub use error::{ConfigError, ProbeError};
pub use events::StatusEvent;
pub use prober::{ProbeOutcome, Prober, TcpProber};
pub use registry::{Device, Interface, InterfaceKey, Registry, Target};
pub use scheduler::{PollScheduler, PollSettings, ReconcileReport};
pub use store::{StatusRecord, StatusStore, StatusView};

use std::time::Duration;

/// Period between two probes of the same interface
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Shortest period the scheduler accepts
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// TCP port used by the default prober
pub const DEFAULT_PROBE_PORT: u16 = 80;

/// Upper bound for a single probe
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);
