//! Parameter and block definitions

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParamError;

/// Identifier of a telemetry block
///
/// Blocks form a closed set: every lookup by `BlockId` is resolved by an
/// exhaustive match in [`crate::catalog::block_def`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockId {
    /// Engine speed, temperatures, throttle, ignition
    Engine,
    /// Fuel trims, injectors, wideband AFR
    Fuel,
    /// Manifold pressure, boost control, airflow
    Boost,
    /// Gear, switches, wheel speeds, dynamics
    Chassis,
}

impl BlockId {
    pub const ALL: [BlockId; 4] = [
        BlockId::Engine,
        BlockId::Fuel,
        BlockId::Boost,
        BlockId::Chassis,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BlockId::Engine => "engine",
            BlockId::Fuel => "fuel",
            BlockId::Boost => "boost",
            BlockId::Chassis => "chassis",
        }
    }
}

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlockId {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "engine" => Ok(BlockId::Engine),
            "fuel" => Ok(BlockId::Fuel),
            "boost" => Ok(BlockId::Boost),
            "chassis" => Ok(BlockId::Chassis),
            _ => Err(ParamError::UnknownBlock(s.to_string())),
        }
    }
}

/// Grouping used by display/logging collaborators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterCategory {
    Engine,
    Temperature,
    Ignition,
    Fuel,
    Airflow,
    Electrical,
    Chassis,
    Status,
}

/// One named telemetry value inside a block
#[derive(Debug, Clone, Copy)]
pub struct ParameterDef {
    /// Stable identifier (snake_case)
    pub name: &'static str,
    pub unit: &'static str,
    /// First bit, big-endian bit numbering from the start of the block
    pub bit_offset: usize,
    /// Width in bits (1-32)
    pub bit_length: usize,
    /// Apply two's-complement sign extension at the top bit of the width
    pub signed: bool,
    /// Raw integer to physical value
    pub convert: fn(i64) -> f64,
    pub category: ParameterCategory,
    /// Descriptive only; never enforced during decode
    pub min_value: Option<f64>,
    /// Descriptive only; never enforced during decode
    pub max_value: Option<f64>,
    /// Explicit PID; the registry assigns one when absent
    pub pid: Option<u16>,
}

/// Result of comparing a decoded value against a parameter's range metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeCheck {
    InRange,
    BelowMin,
    AboveMax,
    /// Parameter declares no range
    Unbounded,
}

impl ParameterDef {
    /// End of the bit range (exclusive)
    pub fn bit_end(&self) -> usize {
        self.bit_offset + self.bit_length
    }

    /// Whether the bit range fits inside a block of `block_size` bytes
    pub fn fits_in(&self, block_size: usize) -> bool {
        self.bit_end() <= block_size * 8
    }

    /// Compare a physical value against the declared range
    pub fn check_range(&self, value: f64) -> RangeCheck {
        if self.min_value.is_none() && self.max_value.is_none() {
            return RangeCheck::Unbounded;
        }
        if let Some(min) = self.min_value {
            if value < min {
                return RangeCheck::BelowMin;
            }
        }
        if let Some(max) = self.max_value {
            if value > max {
                return RangeCheck::AboveMax;
            }
        }
        RangeCheck::InRange
    }

    /// Physical range, falling back to the converted raw extremes
    pub fn physical_range(&self) -> (f64, f64) {
        let (raw_min, raw_max) = if self.signed {
            let half = 1i64 << (self.bit_length - 1);
            (-half, half - 1)
        } else {
            (0, (1i64 << self.bit_length) - 1)
        };
        let a = (self.convert)(raw_min);
        let b = (self.convert)(raw_max);
        (
            self.min_value.unwrap_or(a.min(b)),
            self.max_value.unwrap_or(a.max(b)),
        )
    }
}

/// A fixed-size buffer's worth of co-located parameters
#[derive(Debug, Clone, Copy)]
pub struct BlockDef {
    pub block_id: BlockId,
    /// Size of the block in bytes
    pub block_size: usize,
    pub parameters: &'static [ParameterDef],
}

impl BlockDef {
    pub fn parameter(&self, name: &str) -> Option<&'static ParameterDef> {
        self.parameters.iter().find(|p| p.name == name)
    }
}
