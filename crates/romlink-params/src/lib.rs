//! romlink-params - Telemetry parameter registry and bit decoder
//!
//! Telemetry values arrive packed into fixed-size blocks. Each value is
//! described by a [`ParameterDef`]: where its bits live inside the block,
//! whether they are signed, and how to turn the raw integer into a physical
//! value.
//!
//! Bit numbering is big-endian: bit 0 is the most significant bit of byte 0,
//! bit 8 the most significant bit of byte 1, and so on.
//!
//! # Quick Start
//!
//! ```rust
//! use romlink_params::{decode_block, BlockId};
//!
//! let mut block = [0u8; 16];
//! block[0] = 0x0B; // engine speed, raw 0x0BB8 * 0.25 = 750 rpm
//! block[1] = 0xB8;
//!
//! let values = decode_block(&block, BlockId::Engine).unwrap();
//! assert_eq!(values["engine_speed"], 750.0);
//! ```

pub mod bits;
pub mod catalog;
pub mod decode;
pub mod error;
pub mod registry;
pub mod types;

pub use bits::{extract_bits, sign_extend};
pub use decode::{decode_block, extract_all_parameters, extract_parameter};
pub use error::{ParamError, ParamResult};
pub use registry::{ParameterRegistry, PidEntry, PID_BASE};
pub use types::{BlockDef, BlockId, ParameterCategory, ParameterDef, RangeCheck};
