//! Command implementations for romlink

pub mod decode;
pub mod devices;
pub mod pids;
pub mod rom;

pub use decode::decode;
pub use devices::devices;
pub use pids::pids;
pub use rom::{read, write};
