//! Immutable by-block and by-PID lookup tables

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use romlink_core::PidDescriptor;

use crate::bits::MAX_BIT_LENGTH;
use crate::catalog::ALL_BLOCKS;
use crate::error::{ParamError, ParamResult};
use crate::types::{BlockDef, BlockId, ParameterDef};

/// First PID of the vendor-specific range, clear of OBD-II `0x00`-`0xFF`
pub const PID_BASE: u16 = 0x8000;

/// PID stride between consecutive blocks when a PID is assigned implicitly
const BLOCK_PID_STRIDE: u16 = 0x10;

/// A parameter resolved through its PID
#[derive(Debug, Clone, Copy)]
pub struct PidEntry {
    pub pid: u16,
    pub block: BlockId,
    pub param: &'static ParameterDef,
}

/// Read-only catalog lookup
///
/// Built once from a list of block definitions and never mutated afterwards.
#[derive(Debug)]
pub struct ParameterRegistry {
    by_block: HashMap<BlockId, &'static BlockDef>,
    by_pid: HashMap<u16, PidEntry>,
    /// PIDs in catalog order
    pids: Vec<u16>,
}

impl ParameterRegistry {
    /// Build a registry, validating every definition
    pub fn new(blocks: &[&'static BlockDef]) -> ParamResult<Self> {
        Self::validate(blocks)?;
        Ok(Self::build(blocks))
    }

    /// Registry over the built-in catalog
    pub fn standard() -> &'static ParameterRegistry {
        static STANDARD: OnceLock<ParameterRegistry> = OnceLock::new();
        // The built-in catalog is covered by a validation test
        STANDARD.get_or_init(|| Self::build(&ALL_BLOCKS))
    }

    /// Check bounds, widths and uniqueness of a set of block definitions
    pub fn validate(blocks: &[&'static BlockDef]) -> ParamResult<()> {
        let mut seen_blocks = HashSet::new();
        let mut seen_pids = HashSet::new();

        for (block_index, block) in blocks.iter().enumerate() {
            if !seen_blocks.insert(block.block_id) {
                return Err(ParamError::DuplicateBlock(block.block_id.to_string()));
            }

            for (param_index, param) in block.parameters.iter().enumerate() {
                if param.bit_length == 0 || param.bit_length > MAX_BIT_LENGTH {
                    return Err(ParamError::InvalidBitLength {
                        bit_length: param.bit_length,
                    });
                }
                if !param.fits_in(block.block_size) {
                    return Err(ParamError::ParameterOutOfBounds {
                        name: param.name.to_string(),
                        bit_offset: param.bit_offset,
                        bit_length: param.bit_length,
                        block_size: block.block_size,
                    });
                }
                let pid = resolve_pid(param, block_index, param_index);
                if !seen_pids.insert(pid) {
                    return Err(ParamError::DuplicatePid(pid));
                }
            }
        }
        Ok(())
    }

    fn build(blocks: &[&'static BlockDef]) -> Self {
        let mut by_block = HashMap::new();
        let mut by_pid = HashMap::new();
        let mut pids = Vec::new();

        for (block_index, block) in blocks.iter().enumerate() {
            by_block.insert(block.block_id, *block);
            for (param_index, param) in block.parameters.iter().enumerate() {
                let pid = resolve_pid(param, block_index, param_index);
                by_pid.insert(
                    pid,
                    PidEntry {
                        pid,
                        block: block.block_id,
                        param,
                    },
                );
                pids.push(pid);
            }
        }

        Self {
            by_block,
            by_pid,
            pids,
        }
    }

    pub fn block(&self, id: BlockId) -> Option<&'static BlockDef> {
        self.by_block.get(&id).copied()
    }

    pub fn by_pid(&self, pid: u16) -> Option<&PidEntry> {
        self.by_pid.get(&pid)
    }

    /// All parameters, in catalog order
    pub fn entries(&self) -> impl Iterator<Item = &PidEntry> + '_ {
        self.pids.iter().filter_map(|pid| self.by_pid.get(pid))
    }

    pub fn len(&self) -> usize {
        self.pids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pids.is_empty()
    }

    /// Catalog reshaped into the protocol-agnostic descriptor form
    pub fn pid_descriptors(&self) -> Vec<PidDescriptor> {
        self.entries()
            .map(|entry| {
                let (min_value, max_value) = entry.param.physical_range();
                PidDescriptor {
                    pid: entry.pid,
                    name: entry.param.name.to_string(),
                    unit: entry.param.unit.to_string(),
                    min_value,
                    max_value,
                }
            })
            .collect()
    }
}

fn resolve_pid(param: &ParameterDef, block_index: usize, param_index: usize) -> u16 {
    param.pid.unwrap_or_else(|| {
        PID_BASE + block_index as u16 * BLOCK_PID_STRIDE + param_index as u16
    })
}
