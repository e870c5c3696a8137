//! Target registry built from a device configuration.
//!
//! The configuration is the JSON document
//! `{ "devices": [ { "name": ..., "nics": [ { "name": ..., "ip": ... } ] } ] }`.
//! Loading validates it and produces an immutable snapshot; a reload builds a
//! new snapshot instead of mutating the old one.

use std::collections::HashSet;
use std::fmt;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Identity of a monitored interface: `(device name, interface name)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct InterfaceKey {
    pub device: String,
    pub interface: String,
}

impl InterfaceKey {
    pub fn new(device: impl Into<String>, interface: impl Into<String>) -> Self {
        Self { device: device.into(), interface: interface.into() }
    }
}

impl fmt::Display for InterfaceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.device, self.interface)
    }
}

/// A named network interface of a device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interface {
    pub name: String,
    pub address: IpAddr,
}

/// A monitored device and its interfaces, in configuration order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub name: String,
    pub interfaces: Vec<Interface>,
}

/// One interface to poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub key: InterfaceKey,
    pub address: IpAddr,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    devices: Option<Vec<RawDevice>>,
}

#[derive(Debug, Deserialize)]
struct RawDevice {
    name: Option<String>,
    nics: Option<Vec<RawNic>>,
}

#[derive(Debug, Deserialize)]
struct RawNic {
    name: Option<String>,
    ip: Option<String>,
}

/// Immutable snapshot of every monitored device
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registry {
    devices: Vec<Device>,
}

impl Registry {
    /// A registry with nothing to monitor
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse and validate a raw JSON configuration.
    ///
    /// Blank input and a document without a `devices` list are reported as
    /// [`ConfigError::Empty`] and [`ConfigError::MissingDevices`]; an explicit
    /// empty list is a valid, empty registry.
    pub fn load(raw: &str) -> Result<Self, ConfigError> {
        if raw.trim().is_empty() {
            return Err(ConfigError::Empty);
        }

        let config: RawConfig = serde_json::from_str(raw)?;
        let raw_devices = config.devices.ok_or(ConfigError::MissingDevices)?;

        let mut device_names = HashSet::new();
        let mut keys = HashSet::new();
        let mut devices = Vec::with_capacity(raw_devices.len());

        for (index, raw_device) in raw_devices.into_iter().enumerate() {
            let name = non_blank(raw_device.name).ok_or(ConfigError::UnnamedDevice { index })?;
            if !device_names.insert(name.clone()) {
                return Err(ConfigError::DuplicateDevice(name));
            }

            let raw_nics = raw_device.nics.unwrap_or_default();
            let mut interfaces = Vec::with_capacity(raw_nics.len());

            for (index, raw_nic) in raw_nics.into_iter().enumerate() {
                let nic_name = non_blank(raw_nic.name)
                    .ok_or_else(|| ConfigError::UnnamedInterface { device: name.clone(), index })?;
                let key = InterfaceKey::new(name.clone(), nic_name.clone());

                let raw_address = raw_nic.ip.unwrap_or_default();
                let address = raw_address
                    .trim()
                    .parse::<IpAddr>()
                    .map_err(|_| ConfigError::InvalidAddress {
                        key: key.clone(),
                        address: raw_address,
                    })?;

                if !keys.insert(key.clone()) {
                    return Err(ConfigError::DuplicateKey(key));
                }

                interfaces.push(Interface { name: nic_name, address });
            }

            devices.push(Device { name, interfaces });
        }

        Ok(Self { devices })
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    /// Every interface as a pollable target, in configuration order
    pub fn targets(&self) -> impl Iterator<Item = Target> + '_ {
        self.devices.iter().flat_map(|device| {
            device.interfaces.iter().map(move |nic| Target {
                key: InterfaceKey::new(device.name.clone(), nic.name.clone()),
                address: nic.address,
            })
        })
    }

    pub fn keys(&self) -> impl Iterator<Item = InterfaceKey> + '_ {
        self.targets().map(|target| target.key)
    }

    /// Number of interfaces
    pub fn len(&self) -> usize {
        self.devices.iter().map(|device| device.interfaces.len()).sum()
    }

    /// True when there are no interfaces to poll
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
