//! Simulated KWP2000 ECU transport
//!
//! `SimulatedTransport` stands in for a USB-CAN adapter: it lists a fixed set
//! of virtual ECUs and hands out [`SimulatedEcu`] connections backed by an
//! in-memory 1 MiB ROM. ECU state (ROM contents, recorded frames) survives
//! reconnects for the lifetime of the transport.

mod ecu;

pub use ecu::SimulatedEcu;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use romlink_core::{Connection, DeviceInfo, Transport, TransportError};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Transport name the simulator registers under
pub const SIM_TRANSPORT_NAME: &str = "sim-can";

/// Simulator configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// One virtual ECU per name
    pub devices: Vec<String>,
    /// Simulated per-frame latency in milliseconds
    pub latency_ms: u64,
    /// Seed handed out on security access, as a hex string (e.g. "1234")
    #[serde(with = "seed_hex")]
    pub seed: [u8; 2],
    /// Initial content of every ROM byte
    pub fill: u8,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            devices: vec!["Simulated ECU".to_string()],
            latency_ms: 0,
            seed: [0x12, 0x34],
            fill: 0xFF,
        }
    }
}

mod seed_hex {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(seed: &[u8; 2], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(seed))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; 2], D::Error> {
        let text = String::deserialize(deserializer)?;
        let text = text.trim_start_matches("0x");
        let bytes = hex::decode(text).map_err(de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|b: Vec<u8>| de::Error::invalid_length(b.len(), &"2 bytes"))
    }
}

/// Transport over a set of virtual ECUs
pub struct SimulatedTransport {
    name: String,
    config: SimulatorConfig,
    /// Virtual ECUs in enumeration order; `ecus[i]` is `sim-{i}`
    ecus: Vec<Arc<SimulatedEcu>>,
}

impl SimulatedTransport {
    pub fn new(config: SimulatorConfig) -> Self {
        Self::with_name(SIM_TRANSPORT_NAME, config)
    }

    /// Simulator announcing itself under a different transport name
    pub fn with_name(name: impl Into<String>, config: SimulatorConfig) -> Self {
        let name = name.into();
        let latency = Duration::from_millis(config.latency_ms);
        let ecus = config
            .devices
            .iter()
            .enumerate()
            .map(|(i, device_name)| {
                let id = format!("sim-{}", i);
                let ecu = SimulatedEcu::new(
                    id,
                    device_name.clone(),
                    name.clone(),
                    config.seed,
                    config.fill,
                    latency,
                );
                Arc::new(ecu)
            })
            .collect();

        Self { name, config, ecus }
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Virtual ECU behind `device_id`, for inspection
    pub fn ecu(&self, device_id: &str) -> Option<Arc<SimulatedEcu>> {
        self.ecus
            .iter()
            .find(|ecu| ecu.device_id() == device_id)
            .cloned()
    }
}

#[async_trait]
impl Transport for SimulatedTransport {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_devices(&self) -> Result<Vec<DeviceInfo>, TransportError> {
        let devices = self
            .ecus
            .iter()
            .map(|ecu| DeviceInfo {
                id: ecu.device_id().to_string(),
                name: ecu.name().to_string(),
                transport_name: self.name.clone(),
                connected: ecu.is_open(),
            })
            .collect();
        Ok(devices)
    }

    async fn connect(&self, device_id: &str) -> Result<Arc<dyn Connection>, TransportError> {
        let ecu = self
            .ecu(device_id)
            .ok_or_else(|| TransportError::DeviceNotFound(device_id.to_string()))?;
        ecu.open();
        info!(device = %device_id, transport = %self.name, "Simulated ECU connected");
        Ok(ecu as Arc<dyn Connection>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_lists_configured_devices() {
        let transport = SimulatedTransport::new(SimulatorConfig {
            devices: vec!["Bench A".to_string(), "Bench B".to_string()],
            ..Default::default()
        });

        let devices = transport.list_devices().await.unwrap();
        let labels: Vec<String> = devices.iter().map(|d| d.label()).collect();
        assert_eq!(labels, vec!["Bench A (sim-can)", "Bench B (sim-can)"]);
        assert!(devices.iter().all(|d| !d.connected));
    }

    #[tokio::test]
    async fn test_devices_listed_in_enumeration_order() {
        let transport = SimulatedTransport::new(SimulatorConfig {
            devices: (0..12).map(|i| format!("ECU {i}")).collect(),
            ..Default::default()
        });

        let devices = transport.list_devices().await.unwrap();
        let ids: Vec<&str> = devices.iter().map(|d| d.id.as_str()).collect();
        let expected: Vec<String> = (0..12).map(|i| format!("sim-{i}")).collect();
        assert_eq!(ids, expected.iter().map(String::as_str).collect::<Vec<_>>());
        assert_eq!(devices[10].name, "ECU 10");
        assert!(transport.ecu("sim-11").is_some());
    }

    #[tokio::test]
    async fn test_connect_marks_device_connected() {
        let transport = SimulatedTransport::new(SimulatorConfig::default());
        let conn = transport.connect("sim-0").await.unwrap();
        assert_eq!(conn.transport_name(), "sim-can");
        assert_eq!(conn.device_id(), "sim-0");

        let devices = transport.list_devices().await.unwrap();
        assert!(devices[0].connected);

        conn.close().await.unwrap();
        let devices = transport.list_devices().await.unwrap();
        assert!(!devices[0].connected);
    }

    #[tokio::test]
    async fn test_unknown_device() {
        let transport = SimulatedTransport::new(SimulatorConfig::default());
        let err = transport.connect("sim-9").await.err().unwrap();
        assert_eq!(err, TransportError::DeviceNotFound("sim-9".to_string()));
    }

    #[test]
    fn test_config_from_toml() {
        let config: SimulatorConfig = toml::from_str(
            r#"
            devices = ["Track car"]
            latency_ms = 2
            seed = "0xBEEF"
            "#,
        )
        .unwrap();

        assert_eq!(config.devices, vec!["Track car".to_string()]);
        assert_eq!(config.latency_ms, 2);
        assert_eq!(config.seed, [0xBE, 0xEF]);
        assert_eq!(config.fill, 0xFF);
    }

    #[test]
    fn test_config_rejects_bad_seed() {
        let result: Result<SimulatorConfig, _> = toml::from_str(r#"seed = "123456""#);
        assert!(result.is_err());
    }
}
