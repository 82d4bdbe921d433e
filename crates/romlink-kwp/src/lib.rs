//! romlink-kwp - KWP2000-over-CAN ROM protocol
//!
//! Implements [`EcuProtocol`](romlink_core::EcuProtocol) for ECUs that speak
//! KWP2000 over a CAN adapter, plus a simulated ECU transport used for
//! development and tests.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │              Kwp2000CanProtocol              │
//! │  handshake · read_rom · write_rom · pids     │
//! │                      │                       │
//! │   ┌──────────────┐   │   ┌───────────────┐   │
//! │   │ RomGeometry  │   │   │  derive_key   │   │
//! │   │ (sector diff)│   │   │  (seed/key)   │   │
//! │   └──────────────┘   │   └───────────────┘   │
//! │                ┌─────┴──────┐                │
//! │                │ KwpService │                │
//! │                │ (frames)   │                │
//! │                └─────┬──────┘                │
//! └──────────────────────┼───────────────────────┘
//!                        │ send_frame
//!              ┌─────────┴─────────┐
//!              │    Connection     │
//!              │ (adapter or sim)  │
//!              └───────────────────┘
//! ```

pub mod geometry;
pub mod nrc;
pub mod protocol;
pub mod security;
pub mod services;
pub mod sim;

pub use geometry::RomGeometry;
pub use nrc::NegativeResponseCode;
pub use protocol::{Kwp2000CanProtocol, ROM_GEOMETRY, SUPPORTED_TRANSPORTS};
pub use security::derive_key;
pub use services::KwpService;
pub use sim::{SimulatedEcu, SimulatedTransport, SimulatorConfig, SIM_TRANSPORT_NAME};
