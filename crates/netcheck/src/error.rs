use std::io::Error as IoError;

use thiserror::Error;

use crate::registry::InterfaceKey;

/// Reasons a device configuration cannot become a registry
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration is empty")]
    Empty,

    #[error("configuration has no devices list")]
    MissingDevices,

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("device #{index} has no name")]
    UnnamedDevice { index: usize },

    #[error("device {0:?} is configured more than once")]
    DuplicateDevice(String),

    #[error("interface #{index} of device {device:?} has no name")]
    UnnamedInterface { device: String, index: usize },

    #[error("interface {key} has an invalid address {address:?}")]
    InvalidAddress { key: InterfaceKey, address: String },

    #[error("interface {0} is configured more than once")]
    DuplicateKey(InterfaceKey),
}

impl ConfigError {
    /// True when the input holds nothing to monitor rather than being broken.
    ///
    /// Callers show "no configuration" for these and the error text otherwise.
    pub fn is_missing_targets(&self) -> bool {
        matches!(self, Self::Empty | Self::MissingDevices)
    }
}

/// Failure of a single reachability probe
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("invalid probe address: {0:?}")]
    InvalidAddress(String),

    #[error("transport error: {0}")]
    Transport(#[from] IoError),
}
