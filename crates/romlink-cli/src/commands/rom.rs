//! ROM commands - full read to file, diffed write from file

use std::path::Path;

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use romlink_core::{EcuEvent, EcuEventKind, RomCallbacks, RomProgress, WriteOptions};
use romlink_manager::DeviceManager;

use crate::output::OutputContext;

fn progress_bar(quiet: bool) -> Result<ProgressBar> {
    if quiet {
        return Ok(ProgressBar::hidden());
    }
    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {percent:>3}% {msg}")?
            .progress_chars("=>-"),
    );
    Ok(pb)
}

/// Callbacks that drive a progress bar and print milestones above it
fn callbacks(pb: &ProgressBar) -> RomCallbacks {
    let progress_pb = pb.clone();
    let event_pb = pb.clone();
    RomCallbacks::new()
        .with_progress(move |p: RomProgress| {
            progress_pb.set_length(p.total_bytes.max(1) as u64);
            progress_pb.set_position(p.bytes_processed as u64);
            progress_pb.set_message(match p.message {
                Some(msg) => format!("{} - {}", p.phase, msg),
                None => p.phase.to_string(),
            });
        })
        .with_event(move |e: EcuEvent| {
            let line = match (e.kind, &e.data) {
                (EcuEventKind::SecurityAccessRequested, _) => "Requesting security access".into(),
                (EcuEventKind::SecurityAccessGranted, _) => "Security access granted".into(),
                (EcuEventKind::SectorEraseStarted, Some(data)) => format!("Erasing sector {data}"),
                (EcuEventKind::SectorEraseStarted, None) => "Erasing sector".into(),
                (EcuEventKind::SectorEraseComplete, _) => "Sector erased".into(),
            };
            event_pb.println(line);
        })
}

/// Read the full ROM and save it
pub async fn read(manager: &DeviceManager, output: &Path, ctx: &OutputContext) -> Result<()> {
    let active = manager.connect().await.context("Failed to connect")?;
    ctx.status(&format!(
        "Reading ROM from {} via {}...",
        active.device_name,
        active.protocol.name()
    ));

    let pb = progress_bar(ctx.quiet)?;
    let rom = manager
        .read_rom(&callbacks(&pb))
        .await
        .context("ROM read failed")?;
    pb.finish_with_message("Complete!");

    std::fs::write(output, &rom)
        .with_context(|| format!("Failed to write ROM file: {}", output.display()))?;
    ctx.done(&format!("Saved {} bytes to {}", rom.len(), output.display()));
    Ok(())
}

/// Write a ROM image, optionally diffed against a previous read
pub async fn write(
    manager: &DeviceManager,
    file: &Path,
    original: Option<&Path>,
    dry_run: bool,
    ctx: &OutputContext,
) -> Result<()> {
    let rom = std::fs::read(file)
        .with_context(|| format!("Failed to read ROM file: {}", file.display()))?;
    let original_rom = original
        .map(|path| {
            std::fs::read(path)
                .with_context(|| format!("Failed to read original ROM: {}", path.display()))
        })
        .transpose()?;

    if dry_run && original_rom.is_some() {
        ctx.caution("--original is ignored for a dry run");
    }
    let options = match (&original_rom, dry_run) {
        (_, true) => WriteOptions::dry_run(),
        (Some(orig), false) => WriteOptions::diffed_against(orig),
        (None, false) => WriteOptions::default(),
    };

    let active = manager.connect().await.context("Failed to connect")?;
    ctx.status(&format!(
        "Writing {} bytes to {} via {}{}...",
        rom.len(),
        active.device_name,
        active.protocol.name(),
        if dry_run { " (dry run)" } else { "" }
    ));

    let pb = progress_bar(ctx.quiet)?;
    if let Err(e) = manager.write_rom(&rom, options, &callbacks(&pb)).await {
        pb.abandon_with_message("Write failed!");
        if !dry_run {
            ctx.caution(
                "The ECU may hold a partially written image; re-run the write before power-cycling",
            );
        }
        bail!("ROM write failed: {e}");
    }
    pb.finish_with_message("Complete!");

    ctx.done(if dry_run {
        "Dry run complete: security access verified, nothing written"
    } else {
        "ROM write completed successfully"
    });
    Ok(())
}
