//! Transport and connection traits

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::TransportError;
use crate::models::{DeviceInfo, StreamFrame};

/// One physical medium (USB-CAN adapter, K-line cable, simulator, ...)
#[async_trait]
pub trait Transport: Send + Sync {
    /// Registry id of this transport
    fn name(&self) -> &str;

    /// Enumerate reachable devices
    ///
    /// Fails when the medium itself is unavailable (e.g. no adapter plugged in).
    async fn list_devices(&self) -> Result<Vec<DeviceInfo>, TransportError>;

    /// Open a connection to one device returned by [`Transport::list_devices`]
    async fn connect(&self, device_id: &str) -> Result<Arc<dyn Connection>, TransportError>;
}

/// Duplex, single-outstanding-request channel to one device
///
/// Callers must await each [`Connection::send_frame`] before sending the next
/// frame. A connection is exclusively owned by one code path at a time.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Name of the transport this connection was opened on
    fn transport_name(&self) -> &str;

    /// Identifier of the connected device
    fn device_id(&self) -> &str;

    /// Send one request frame and wait for exactly one response frame
    async fn send_frame(&self, frame: &[u8]) -> Result<Vec<u8>, TransportError>;

    /// Start a push-style telemetry stream
    ///
    /// While a stream is active no request frames may be sent.
    async fn start_stream(&self) -> Result<broadcast::Receiver<StreamFrame>, TransportError> {
        Err(TransportError::Unsupported(format!(
            "streaming not available on {}",
            self.transport_name()
        )))
    }

    /// Stop a running telemetry stream
    async fn stop_stream(&self) -> Result<(), TransportError> {
        Err(TransportError::Unsupported(format!(
            "streaming not available on {}",
            self.transport_name()
        )))
    }

    /// Close the session; the connection is unusable afterwards
    async fn close(&self) -> Result<(), TransportError>;
}
