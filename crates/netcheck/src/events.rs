use crate::registry::InterfaceKey;
use crate::store::StatusRecord;

/// Change notification published by the status store
#[derive(Debug, Clone)]
pub enum StatusEvent {
    /// A poller wrote a new result
    Updated(StatusRecord),
    /// The interface left the registry and its record was dropped
    Removed(InterfaceKey),
    /// A new registry was applied
    Reloaded { devices: usize, interfaces: usize },
}
