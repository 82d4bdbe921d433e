//! Integration tests for the romlink stack
//!
//! These tests drive the device manager, the KWP2000 protocol and the
//! simulated ECU together, asserting on the exact frames the ECU received.
//!
//! # Test Structure
//!
//! - `rom_flow_test.rs` - read and diffed write through the manager
//! - `discovery_test.rs` - transport/protocol matching and selection
//! - `failure_test.rs` - injected faults, response-pending, streaming guard

use std::sync::Arc;

use parking_lot::Mutex;
use romlink_core::{EcuEvent, RomCallbacks, RomProgress};
use romlink_kwp::{
    Kwp2000CanProtocol, SimulatedEcu, SimulatedTransport, SimulatorConfig, SIM_TRANSPORT_NAME,
};
use romlink_manager::{DeviceManager, FirstDeviceSelector};

/// Manager wired to one simulated transport running the KWP2000 protocol
pub struct SimBench {
    pub manager: DeviceManager,
    pub transport: Arc<SimulatedTransport>,
}

impl SimBench {
    pub fn new(devices: &[&str]) -> Self {
        Self::on_transport(SIM_TRANSPORT_NAME, devices)
    }

    /// Simulator announcing itself as `transport_name`
    pub fn on_transport(transport_name: &str, devices: &[&str]) -> Self {
        let config = SimulatorConfig {
            devices: devices.iter().map(|d| d.to_string()).collect(),
            ..SimulatorConfig::default()
        };
        let transport = Arc::new(SimulatedTransport::with_name(transport_name, config));
        let manager = DeviceManager::new(Arc::new(FirstDeviceSelector));
        manager.register_transport(transport_name, transport.clone());
        manager.register_protocol(Arc::new(Kwp2000CanProtocol::new()));
        Self { manager, transport }
    }

    /// The single-device bench
    pub fn single() -> Self {
        Self::new(&["Bench ECU"])
    }

    pub fn ecu(&self, index: usize) -> Arc<SimulatedEcu> {
        self.transport
            .ecu(&format!("sim-{index}"))
            .unwrap_or_else(|| panic!("no simulated ECU at index {index}"))
    }
}

/// Records every progress report and event handed to the callbacks
#[derive(Clone, Default)]
pub struct Recorder {
    pub progress: Arc<Mutex<Vec<RomProgress>>>,
    pub events: Arc<Mutex<Vec<EcuEvent>>>,
}

impl Recorder {
    pub fn callbacks(&self) -> RomCallbacks {
        let progress = self.progress.clone();
        let events = self.events.clone();
        RomCallbacks::new()
            .with_progress(move |p| progress.lock().push(p))
            .with_event(move |e| events.lock().push(e))
    }
}

/// Frames whose first byte is `sid`
pub fn frames_for(ecu: &SimulatedEcu, sid: u8) -> Vec<Vec<u8>> {
    ecu.frames()
        .into_iter()
        .filter(|f| f.first() == Some(&sid))
        .collect()
}

/// 24-bit big-endian address at `at`
pub fn address_at(frame: &[u8], at: usize) -> usize {
    (frame[at] as usize) << 16 | (frame[at + 1] as usize) << 8 | frame[at + 2] as usize
}
