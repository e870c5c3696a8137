//! Shared helpers for engine and scheduler tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{Error as IoError, ErrorKind};
use std::net::IpAddr;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use netcheck::{ProbeError, ProbeOutcome, Prober};

/// How the scripted prober answers for one address
#[derive(Debug, Clone, Copy)]
pub enum Behaviour {
    Reachable,
    Unreachable,
    Fail,
    /// Answer reachable after sleeping
    Slow(Duration),
    /// Panic inside the poller task
    Panic,
}

/// In-memory prober with per-address answers and call counting
#[derive(Default)]
pub struct ScriptedProber {
    behaviours: Mutex<HashMap<IpAddr, Behaviour>>,
    calls: Mutex<HashMap<IpAddr, usize>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedProber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, address: &str, behaviour: Behaviour) {
        self.behaviours.lock().unwrap().insert(ip(address), behaviour);
    }

    /// Probes started for `address`
    pub fn calls(&self, address: &str) -> usize {
        self.calls.lock().unwrap().get(&ip(address)).copied().unwrap_or(0)
    }

    /// Most slow probes that were pending at the same time
    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Prober for ScriptedProber {
    async fn probe(&self, address: IpAddr) -> Result<ProbeOutcome, ProbeError> {
        *self.calls.lock().unwrap().entry(address).or_default() += 1;
        let behaviour = self.behaviours.lock().unwrap().get(&address).copied();

        match behaviour.unwrap_or(Behaviour::Reachable) {
            Behaviour::Reachable => Ok(ProbeOutcome::Reachable),
            Behaviour::Unreachable => Ok(ProbeOutcome::Unreachable),
            Behaviour::Fail => {
                Err(ProbeError::Transport(IoError::new(ErrorKind::Other, "scripted failure")))
            }
            Behaviour::Slow(delay) => {
                let pending = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak.fetch_max(pending, Ordering::SeqCst);
                tokio::time::sleep(delay).await;
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(ProbeOutcome::Reachable)
            }
            Behaviour::Panic => panic!("scripted panic for {address}"),
        }
    }
}

pub fn ip(address: &str) -> IpAddr {
    address.parse().unwrap()
}

/// Build a configuration document from `(device, [(nic, ip)])` pairs
pub fn config(devices: &[(&str, &[(&str, &str)])]) -> String {
    let devices: Vec<serde_json::Value> = devices
        .iter()
        .map(|(name, nics)| {
            let nics: Vec<serde_json::Value> = nics
                .iter()
                .map(|(nic, ip)| serde_json::json!({ "name": nic, "ip": ip }))
                .collect();
            serde_json::json!({ "name": name, "nics": nics })
        })
        .collect();
    serde_json::json!({ "devices": devices }).to_string()
}

/// Let spawned pollers run without moving far along the paused clock
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}
