//! Device Manager - transport/protocol registry and connection lifecycle
//!
//! The manager owns at most one [`ActiveConnection`]. Protocol operations
//! issued through it hold the connection lock for their whole duration, so
//! no two operations ever share the connection.

use std::sync::Arc;

use parking_lot::RwLock;
use romlink_core::{
    Connection, DeviceInfo, EcuProtocol, PidDescriptor, RomCallbacks, Transport, WriteOptions,
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::error::{ManagerError, ManagerResult};
use crate::selector::{DeviceSelector, FirstDeviceSelector};

// =============================================================================
// Types
// =============================================================================

/// Connection-state notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Connected { device: String, protocol: String },
    Disconnected,
}

/// The currently connected device and the protocol driving it
#[derive(Clone)]
pub struct ActiveConnection {
    pub connection: Arc<dyn Connection>,
    pub protocol: Arc<dyn EcuProtocol>,
    pub device_name: String,
}

impl std::fmt::Debug for ActiveConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveConnection")
            .field("device_name", &self.device_name)
            .field("device_id", &self.connection.device_id())
            .field("transport", &self.connection.transport_name())
            .field("protocol", &self.protocol.name())
            .finish()
    }
}

// =============================================================================
// DeviceManager
// =============================================================================

/// Registry of transports and protocols plus the single active connection
pub struct DeviceManager {
    /// Registered transports by id, in registration order
    transports: RwLock<Vec<(String, Arc<dyn Transport>)>>,
    /// Registered protocols; registration order is the matching order
    protocols: RwLock<Vec<Arc<dyn EcuProtocol>>>,
    selector: RwLock<Arc<dyn DeviceSelector>>,
    active: Mutex<Option<ActiveConnection>>,
    events: broadcast::Sender<ConnectionEvent>,
}

impl Default for DeviceManager {
    fn default() -> Self {
        Self::new(Arc::new(FirstDeviceSelector))
    }
}

impl DeviceManager {
    pub fn new(selector: Arc<dyn DeviceSelector>) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            transports: RwLock::new(Vec::new()),
            protocols: RwLock::new(Vec::new()),
            selector: RwLock::new(selector),
            active: Mutex::new(None),
            events,
        }
    }

    /// Register a transport, replacing any transport with the same id
    pub fn register_transport(&self, id: impl Into<String>, transport: Arc<dyn Transport>) {
        let id = id.into();
        let mut transports = self.transports.write();
        match transports.iter_mut().find(|(existing, _)| *existing == id) {
            Some(slot) => {
                info!(transport = %id, "Replacing registered transport");
                slot.1 = transport;
            }
            None => {
                info!(transport = %id, "Registering transport");
                transports.push((id, transport));
            }
        }
    }

    /// Append a protocol to the matching order
    pub fn register_protocol(&self, protocol: Arc<dyn EcuProtocol>) {
        info!(protocol = %protocol.name(), "Registering protocol");
        self.protocols.write().push(protocol);
    }

    pub fn set_selector(&self, selector: Arc<dyn DeviceSelector>) {
        *self.selector.write() = selector;
    }

    pub fn transport_ids(&self) -> Vec<String> {
        self.transports
            .read()
            .iter()
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn protocol_names(&self) -> Vec<String> {
        self.protocols
            .read()
            .iter()
            .map(|p| p.name().to_string())
            .collect()
    }

    /// Subscribe to connection-state changes
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.events.subscribe()
    }

    fn transport(&self, id: &str) -> Option<Arc<dyn Transport>> {
        self.transports
            .read()
            .iter()
            .find(|(existing, _)| existing == id)
            .map(|(_, t)| t.clone())
    }

    /// Enumerate devices on every registered transport
    ///
    /// A transport that fails to enumerate contributes no devices.
    pub async fn list_all_devices(&self) -> Vec<DeviceInfo> {
        let transports = self.transports.read().clone();

        let mut devices = Vec::new();
        for (id, transport) in &transports {
            match transport.list_devices().await {
                Ok(found) => {
                    debug!(transport = %id, count = found.len(), "Transport enumerated");
                    devices.extend(found);
                }
                Err(e) => {
                    warn!(transport = %id, error = %e, "Transport enumeration failed, skipping");
                }
            }
        }
        devices
    }

    /// Pick a device, open it and find the first protocol that can drive it
    pub async fn select_device_and_protocol(&self) -> ManagerResult<ActiveConnection> {
        let mut devices = self.list_all_devices().await;
        let device = match devices.len() {
            0 => return Err(ManagerError::NoDevicesFound),
            1 => devices.swap_remove(0),
            _ => {
                let labels: Vec<String> = devices.iter().map(DeviceInfo::label).collect();
                let selector = self.selector.read().clone();
                let index = selector
                    .select(&labels)
                    .await
                    .ok_or(ManagerError::SelectionCancelled)?;
                if index >= devices.len() {
                    return Err(ManagerError::SelectionCancelled);
                }
                devices.swap_remove(index)
            }
        };
        info!(device = %device.label(), "Device selected");

        let transport = self
            .transport(&device.transport_name)
            .ok_or_else(|| ManagerError::TransportNotRegistered(device.transport_name.clone()))?;
        let connection = transport.connect(&device.id).await?;

        let protocols = self.protocols.read().clone();
        for protocol in &protocols {
            match protocol.can_handle(connection.as_ref()).await {
                Ok(true) => {
                    info!(device = %device.label(), protocol = %protocol.name(), "Protocol matched");
                    return Ok(ActiveConnection {
                        connection,
                        protocol: protocol.clone(),
                        device_name: device.name,
                    });
                }
                Ok(false) => {
                    debug!(protocol = %protocol.name(), "Protocol declined device");
                }
                Err(e) => {
                    warn!(protocol = %protocol.name(), error = %e, "Protocol check failed, treating as no match");
                }
            }
        }

        if let Err(e) = connection.close().await {
            warn!(device = %device.label(), error = %e, "Failed to close unmatched connection");
        }
        Err(ManagerError::NoMatchingProtocol {
            device: device.label(),
            tried: protocols.iter().map(|p| p.name().to_string()).collect(),
        })
    }

    /// Connect, or return the existing connection without re-probing
    pub async fn connect(&self) -> ManagerResult<ActiveConnection> {
        let mut active = self.active.lock().await;
        if let Some(existing) = active.as_ref() {
            debug!(device = %existing.device_name, "Already connected");
            return Ok(existing.clone());
        }

        let selected = self.select_device_and_protocol().await?;
        info!(
            device = %selected.device_name,
            protocol = %selected.protocol.name(),
            "Connected"
        );
        *active = Some(selected.clone());
        let _ = self.events.send(ConnectionEvent::Connected {
            device: selected.device_name.clone(),
            protocol: selected.protocol.name().to_string(),
        });
        Ok(selected)
    }

    /// Close the active connection, if any
    ///
    /// Close failures are logged, not returned.
    pub async fn disconnect(&self) {
        let mut active = self.active.lock().await;
        let Some(current) = active.take() else {
            return;
        };

        if let Err(e) = current.connection.close().await {
            warn!(device = %current.device_name, error = %e, "Error closing connection");
        }
        info!(device = %current.device_name, "Disconnected");
        let _ = self.events.send(ConnectionEvent::Disconnected);
    }

    pub async fn active(&self) -> Option<ActiveConnection> {
        self.active.lock().await.clone()
    }

    pub async fn is_connected(&self) -> bool {
        self.active.lock().await.is_some()
    }

    /// Disconnect and clear every registry
    pub async fn dispose(&self) {
        self.disconnect().await;
        self.transports.write().clear();
        self.protocols.write().clear();
        debug!("Device manager disposed");
    }

    // =========================================================================
    // Operations on the active connection
    // =========================================================================

    pub async fn read_rom(&self, callbacks: &RomCallbacks) -> ManagerResult<Vec<u8>> {
        let active = self.active.lock().await;
        let current = active.as_ref().ok_or(ManagerError::NotConnected)?;
        Ok(current
            .protocol
            .read_rom(current.connection.as_ref(), callbacks)
            .await?)
    }

    pub async fn write_rom(
        &self,
        rom: &[u8],
        options: WriteOptions<'_>,
        callbacks: &RomCallbacks,
    ) -> ManagerResult<()> {
        let active = self.active.lock().await;
        let current = active.as_ref().ok_or(ManagerError::NotConnected)?;
        current
            .protocol
            .write_rom(current.connection.as_ref(), rom, options, callbacks)
            .await?;
        Ok(())
    }

    pub async fn supported_pids(&self) -> ManagerResult<Vec<PidDescriptor>> {
        let active = self.active.lock().await;
        let current = active.as_ref().ok_or(ManagerError::NotConnected)?;
        Ok(current
            .protocol
            .get_supported_pids(current.connection.as_ref())
            .await?)
    }
}
