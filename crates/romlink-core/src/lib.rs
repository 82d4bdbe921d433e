//! romlink-core - Core traits and types for ECU ROM access
//!
//! This crate provides the abstractions shared by every transport, protocol
//! and the device manager:
//!
//! ```text
//! ┌──────────────┐  list_devices()  ┌──────────────┐
//! │  Transport   │ ───────────────▶ │  DeviceInfo  │
//! └──────┬───────┘                  └──────────────┘
//!        │ connect(id)
//!        ▼
//! ┌──────────────┐  can_handle / read_rom / write_rom
//! │  Connection  │ ◀──────────────────────────────── EcuProtocol
//! └──────────────┘
//! ```

pub mod error;
pub mod models;
pub mod protocol;
pub mod transport;

pub use error::{ProtocolError, ProtocolResult, TransportError};
pub use models::{
    DeviceInfo, EcuEvent, EcuEventKind, PidDescriptor, RomPhase, RomProgress, StreamFrame,
    WriteOptions,
};
pub use protocol::{EcuProtocol, EventCallback, ProgressCallback, RomCallbacks};
pub use transport::{Connection, Transport};
