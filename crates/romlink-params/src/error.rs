//! Error types for parameter decoding

use thiserror::Error;

/// Errors that can occur while decoding telemetry blocks
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParamError {
    /// Buffer is shorter than the block it claims to hold
    #[error("buffer too short for block {block}: expected {expected} bytes, got {actual}")]
    BufferTooShort {
        block: String,
        expected: usize,
        actual: usize,
    },

    /// Requested bit range runs past the end of the buffer
    #[error("bit range {bit_offset}+{bit_length} exceeds buffer of {buffer_bits} bits")]
    BitRangeOutOfBounds {
        bit_offset: usize,
        bit_length: usize,
        buffer_bits: usize,
    },

    /// Parameter definition does not fit inside its block
    #[error("parameter {name}: bits {bit_offset}+{bit_length} exceed block of {block_size} bytes")]
    ParameterOutOfBounds {
        name: String,
        bit_offset: usize,
        bit_length: usize,
        block_size: usize,
    },

    /// Bit width outside 1..=32
    #[error("invalid bit length {bit_length} (supported: 1-32)")]
    InvalidBitLength { bit_length: usize },

    /// Two parameters resolve to the same PID
    #[error("duplicate PID: 0x{0:04X}")]
    DuplicatePid(u16),

    /// The same block id was registered twice
    #[error("duplicate block: {0}")]
    DuplicateBlock(String),

    /// Block name could not be parsed
    #[error("unknown block: {0}")]
    UnknownBlock(String),
}

/// Result type for parameter operations
pub type ParamResult<T> = Result<T, ParamError>;
