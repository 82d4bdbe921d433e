//! Decoding telemetry blocks to physical values

use std::collections::HashMap;

use crate::bits::{extract_bits, sign_extend};
use crate::catalog::block_def;
use crate::error::{ParamError, ParamResult};
use crate::types::{BlockDef, BlockId, ParameterDef};

/// Decode one parameter from a block buffer
///
/// Reads the parameter's bit range, sign-extends it when the parameter is
/// signed and applies the parameter's conversion.
pub fn extract_parameter(buf: &[u8], def: &ParameterDef) -> ParamResult<f64> {
    let raw = extract_bits(buf, def.bit_offset, def.bit_length)?;
    let value = if def.signed {
        sign_extend(raw, def.bit_length)
    } else {
        raw as i64
    };
    Ok((def.convert)(value))
}

/// Decode every parameter of a block
pub fn extract_all_parameters(
    buf: &[u8],
    block: &BlockDef,
) -> ParamResult<HashMap<&'static str, f64>> {
    check_length(buf, block)?;

    let mut values = HashMap::with_capacity(block.parameters.len());
    for def in block.parameters {
        values.insert(def.name, extract_parameter(buf, def)?);
    }
    Ok(values)
}

/// Decode a buffer as the built-in block identified by `id`
pub fn decode_block(buf: &[u8], id: BlockId) -> ParamResult<HashMap<&'static str, f64>> {
    extract_all_parameters(buf, block_def(id))
}

fn check_length(buf: &[u8], block: &BlockDef) -> ParamResult<()> {
    if buf.len() < block.block_size {
        return Err(ParamError::BufferTooShort {
            block: block.block_id.to_string(),
            expected: block.block_size,
            actual: buf.len(),
        });
    }
    Ok(())
}
