//! PIDs command - telemetry parameters of the connected ECU

use anyhow::{Context, Result};
use romlink_manager::DeviceManager;

use crate::output::{OutputContext, PidRow};

pub async fn pids(manager: &DeviceManager, ctx: &OutputContext) -> Result<()> {
    manager.connect().await.context("Failed to connect")?;
    let pids = manager
        .supported_pids()
        .await
        .context("Failed to list supported PIDs")?;

    let rows: Vec<PidRow> = pids
        .into_iter()
        .map(|p| PidRow {
            pid: format!("0x{:04X}", p.pid),
            name: p.name,
            unit: p.unit,
            min: format!("{}", p.min_value),
            max: format!("{}", p.max_value),
        })
        .collect();

    ctx.render(&rows);
    Ok(())
}
