//! Data model shared between transports, protocols and the device manager

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Discovery
// =============================================================================

/// A physically discoverable device, as reported by one transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Transport-specific device identifier
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Registry id of the transport that found this device
    pub transport_name: String,
    /// Whether the device currently has an open connection
    pub connected: bool,
}

impl DeviceInfo {
    /// Label used when presenting the device in a selection list
    pub fn label(&self) -> String {
        format!("{} ({})", self.name, self.transport_name)
    }
}

// =============================================================================
// Progress & Events
// =============================================================================

/// Phase of a long-running ROM operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RomPhase {
    Reading,
    Erasing,
    Writing,
    Verifying,
}

impl std::fmt::Display for RomPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RomPhase::Reading => "reading",
            RomPhase::Erasing => "erasing",
            RomPhase::Writing => "writing",
            RomPhase::Verifying => "verifying",
        };
        f.write_str(s)
    }
}

/// Progress report emitted after each unit of work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RomProgress {
    pub phase: RomPhase,
    /// Bytes processed so far within this phase
    pub bytes_processed: usize,
    pub total_bytes: usize,
    /// Progress percentage (0-100)
    pub percent_complete: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RomProgress {
    pub fn new(phase: RomPhase, bytes_processed: usize, total_bytes: usize) -> Self {
        let percent_complete = if total_bytes > 0 {
            (bytes_processed as f64 / total_bytes as f64) * 100.0
        } else {
            100.0
        };
        Self {
            phase,
            bytes_processed,
            total_bytes,
            percent_complete,
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Discrete protocol milestones
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EcuEventKind {
    SecurityAccessRequested,
    SecurityAccessGranted,
    SectorEraseStarted,
    SectorEraseComplete,
}

/// A milestone notification with its timestamp and optional payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EcuEvent {
    pub kind: EcuEventKind,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl EcuEvent {
    pub fn new(kind: EcuEventKind) -> Self {
        Self {
            kind,
            timestamp: Utc::now(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

// =============================================================================
// ROM Write
// =============================================================================

/// Options for a ROM write
#[derive(Debug, Clone, Copy, Default)]
pub struct WriteOptions<'a> {
    /// Perform the handshake only; send no erase/download/transfer frames
    pub dry_run: bool,
    /// Previously-read image used to skip sectors that did not change
    pub original_rom: Option<&'a [u8]>,
}

impl<'a> WriteOptions<'a> {
    pub fn dry_run() -> Self {
        Self {
            dry_run: true,
            original_rom: None,
        }
    }

    pub fn diffed_against(original_rom: &'a [u8]) -> Self {
        Self {
            dry_run: false,
            original_rom: Some(original_rom),
        }
    }
}

// =============================================================================
// Telemetry
// =============================================================================

/// Protocol-agnostic telemetry parameter description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PidDescriptor {
    pub pid: u16,
    pub name: String,
    pub unit: String,
    pub min_value: f64,
    pub max_value: f64,
}

/// Frame pushed by a device while a telemetry stream is active
#[derive(Debug, Clone)]
pub struct StreamFrame {
    /// Timestamp when the frame was received
    pub timestamp: Instant,
    pub data: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_progress_percent() {
        let p = RomProgress::new(RomPhase::Reading, 512, 1024);
        assert_eq!(p.percent_complete, 50.0);

        let done = RomProgress::new(RomPhase::Writing, 0, 0);
        assert_eq!(done.percent_complete, 100.0);
    }

    #[test]
    fn test_device_label() {
        let dev = DeviceInfo {
            id: "sim-0".to_string(),
            name: "Bench ECU".to_string(),
            transport_name: "sim-can".to_string(),
            connected: false,
        };
        assert_eq!(dev.label(), "Bench ECU (sim-can)");
    }

    #[test]
    fn test_event_kind_serializes_screaming_case() {
        let json = serde_json::to_value(EcuEventKind::SectorEraseStarted).unwrap();
        assert_eq!(json, serde_json::json!("SECTOR_ERASE_STARTED"));
    }
}
