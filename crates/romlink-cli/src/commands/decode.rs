//! Decode command - turn a captured telemetry block into physical values

use anyhow::{Context, Result};
use romlink_params::{extract_all_parameters, BlockId, ParameterRegistry, RangeCheck};

use crate::output::{OutputContext, ValueRow};

/// Decode a hex-encoded block buffer for a named block
pub fn decode(block: &str, data: &str, ctx: &OutputContext) -> Result<()> {
    let rows = decode_rows(block, data)?;
    ctx.render(&rows);
    Ok(())
}

fn decode_rows(block: &str, data: &str) -> Result<Vec<ValueRow>> {
    let id: BlockId = block.parse()?;
    let cleaned: String = data
        .trim()
        .trim_start_matches("0x")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    let buf = hex::decode(&cleaned).context("Block data is not valid hex")?;

    let def = ParameterRegistry::standard()
        .block(id)
        .with_context(|| format!("Block {id} is not registered"))?;
    let values = extract_all_parameters(&buf, def)
        .with_context(|| format!("Failed to decode {id} block"))?;

    Ok(def
        .parameters
        .iter()
        .filter_map(|p| {
            let value = *values.get(p.name)?;
            let range = match p.check_range(value) {
                RangeCheck::InRange => "ok",
                RangeCheck::BelowMin => "below min",
                RangeCheck::AboveMax => "above max",
                RangeCheck::Unbounded => "-",
            };
            Some(ValueRow {
                parameter: p.name.to_string(),
                value: format!("{value:.2}"),
                unit: p.unit.to_string(),
                range: range.to_string(),
            })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_decode_engine_block() {
        let data = format!("0FA0{}", "00".repeat(14));
        let rows = decode_rows("Engine", &data).unwrap();

        assert_eq!(rows[0].parameter, "engine_speed");
        assert_eq!(rows[0].value, "1000.00");
        assert_eq!(rows[0].range, "ok");
        assert_eq!(
            rows.len(),
            romlink_params::catalog::ENGINE_BLOCK.parameters.len()
        );
    }

    #[test]
    fn test_decode_rejects_bad_input() {
        let zeros = "00".repeat(16);
        assert!(decode_rows("gearbox", &zeros).is_err());
        assert!(decode_rows("engine", "zz").is_err());
        assert!(decode_rows("engine", "0011").is_err());
    }
}
