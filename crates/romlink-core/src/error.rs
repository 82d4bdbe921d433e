//! Common error types for transports and protocols

use thiserror::Error;

/// Errors raised by a physical transport or one of its connections
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Transport not supported: {0}")]
    Unsupported(String),

    /// A telemetry stream owns the connection; no request frames may be sent
    #[error("Telemetry stream active, request frames are blocked")]
    StreamActive,
}

/// Result type for protocol operations
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors that can occur while driving an ECU protocol
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Transport/communication error, propagated as-is
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Key derivation was handed a seed of the wrong size
    #[error("Invalid seed length: expected 2 bytes, got {0}")]
    InvalidSeedLength(usize),

    /// The ECU did not acknowledge the security key
    #[error("Security access denied: expected response {expected}, got {actual}")]
    SecurityAccessDenied {
        /// Expected leading bytes (hex)
        expected: String,
        /// Actual leading bytes (hex)
        actual: String,
    },

    /// The supplied ROM image does not match the ECU's address space
    #[error("Invalid ROM size: expected {expected} bytes, got {actual}")]
    InvalidRomSize { expected: usize, actual: usize },

    /// Response was malformed or too short
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// ECU returned a negative response
    #[error("Negative response to service 0x{service:02X}: {message} (NRC 0x{nrc:02X})")]
    NegativeResponse {
        service: u8,
        nrc: u8,
        message: String,
    },

    /// Capability not offered by this protocol
    #[error("Not supported: {0}")]
    NotSupported(String),
}
