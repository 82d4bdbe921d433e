//! romlink-manager - Device discovery and connection lifecycle
//!
//! ```text
//!   register_transport()        register_protocol()
//!          │                            │
//!          ▼                            ▼
//! ┌──────────────────┐  match   ┌──────────────────┐
//! │ Transport (N)    │ ───────▶ │ EcuProtocol (M)  │
//! └────────┬─────────┘          └────────┬─────────┘
//!          │ list / select / connect     │ first can_handle() == true
//!          ▼                             ▼
//!        ┌──────────────────────────────────┐
//!        │        ActiveConnection          │  at most one
//!        └──────────────────────────────────┘
//! ```

mod error;
mod manager;
mod selector;

pub use error::{ManagerError, ManagerResult};
pub use manager::{ActiveConnection, ConnectionEvent, DeviceManager};
pub use selector::{DeclineSelector, DeviceSelector, FirstDeviceSelector};
