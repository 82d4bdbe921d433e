//! romlink - read and reprogram ECU ROMs over a diagnostic link
//!
//! Registers every available transport and the KWP2000-over-CAN protocol
//! with a device manager, then runs one command against it.

mod commands;
mod config;
mod output;
mod selector;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use romlink_kwp::{Kwp2000CanProtocol, SimulatedTransport, SIM_TRANSPORT_NAME};
use romlink_manager::DeviceManager;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::Config;
use crate::output::{OutputContext, OutputFormat};
use crate::selector::PromptSelector;

#[derive(Parser)]
#[command(name = "romlink")]
#[command(author, version, about = "ECU ROM read/write tool")]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "ROMLINK_CONFIG")]
    config: Option<PathBuf>,

    /// Device to use when several are found (label or name prefix)
    #[arg(short, long, env = "ROMLINK_DEVICE")]
    device: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    output: OutputFormat,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Minimal output (for scripting)
    #[arg(short, long)]
    quiet: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List devices on every transport
    Devices,

    /// Read the full ROM into a file
    Read {
        /// Destination file
        output: PathBuf,
    },

    /// Write a ROM image from a file
    Write {
        /// ROM image to write
        file: PathBuf,

        /// Previously read image; only sectors that differ are reflashed
        #[arg(long)]
        original: Option<PathBuf>,

        /// Unlock the ECU but write nothing
        #[arg(long)]
        dry_run: bool,
    },

    /// List telemetry parameters supported by the connected ECU
    Pids,

    /// Decode a hex-encoded telemetry block
    Decode {
        /// Block name: engine, fuel, boost, chassis
        block: String,

        /// Block bytes as hex
        data: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config file
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load().unwrap_or_default(),
    };

    // Set up logging
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(EnvFilter::new(config.log_filter(cli.verbose)))
        .init();
    tracing::debug!(
        config = ?cli.config,
        simulator = config.simulator.enabled,
        "Configuration loaded"
    );

    let ctx = OutputContext::new(cli.output, cli.no_color, cli.quiet);

    // Decoding needs no device
    if let Commands::Decode { block, data } = &cli.command {
        return commands::decode(block, data, &ctx);
    }

    let manager = build_manager(&config, cli.device.clone());
    let result = match &cli.command {
        Commands::Devices => commands::devices(&manager, &ctx).await,
        Commands::Read { output } => commands::read(&manager, output, &ctx).await,
        Commands::Write {
            file,
            original,
            dry_run,
        } => commands::write(&manager, file, original.as_deref(), *dry_run, &ctx).await,
        Commands::Pids => commands::pids(&manager, &ctx).await,
        Commands::Decode { .. } => Ok(()),
    };

    manager.dispose().await;
    result
}

/// Register transports and protocols
fn build_manager(config: &Config, device: Option<String>) -> DeviceManager {
    let manager = DeviceManager::new(Arc::new(PromptSelector::new(device)));

    if config.simulator.enabled {
        manager.register_transport(
            SIM_TRANSPORT_NAME,
            Arc::new(SimulatedTransport::new(config.simulator.config.clone())),
        );
    }
    manager.register_protocol(Arc::new(Kwp2000CanProtocol::new()));

    manager
}
