//! Devices command - enumerate every registered transport

use anyhow::Result;
use romlink_manager::DeviceManager;

use crate::output::{DeviceRow, OutputContext};

/// List devices reachable on all transports
pub async fn devices(manager: &DeviceManager, ctx: &OutputContext) -> Result<()> {
    let devices = manager.list_all_devices().await;

    let rows: Vec<DeviceRow> = devices
        .into_iter()
        .map(|d| DeviceRow {
            id: d.id,
            name: d.name,
            transport: d.transport_name,
            connected: if d.connected { "yes" } else { "no" }.to_string(),
        })
        .collect();

    ctx.render(&rows);
    Ok(())
}
