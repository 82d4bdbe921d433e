//! Device manager errors

use romlink_core::{ProtocolError, TransportError};
use thiserror::Error;

/// Result type for device manager operations
pub type ManagerResult<T> = Result<T, ManagerError>;

/// Errors raised while discovering, selecting or driving a device
#[derive(Debug, Error)]
pub enum ManagerError {
    /// Every registered transport reported zero devices
    #[error("No devices found on any registered transport")]
    NoDevicesFound,

    /// The selector declined to pick a device
    #[error("Device selection cancelled")]
    SelectionCancelled,

    /// The selected device names a transport that is not registered
    #[error("Transport not registered: {0}")]
    TransportNotRegistered(String),

    /// No registered protocol accepted the connection
    #[error("No protocol can handle {device} (tried: {})", .tried.join(", "))]
    NoMatchingProtocol { device: String, tried: Vec<String> },

    /// Operation needs an active connection
    #[error("Not connected")]
    NotConnected,

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}
