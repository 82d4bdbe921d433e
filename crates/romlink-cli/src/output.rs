//! Terminal rendering for romlink

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{Table, Tabled};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// Pretty-printed JSON array
    Json,
}

/// Where and how command results are written
///
/// Status lines go to stdout and are suppressed by `--quiet`; cautions
/// always go to stderr.
pub struct OutputContext {
    format: OutputFormat,
    pub quiet: bool,
}

impl OutputContext {
    pub fn new(format: OutputFormat, no_color: bool, quiet: bool) -> Self {
        if no_color {
            colored::control::set_override(false);
        }
        Self { format, quiet }
    }

    pub fn status(&self, line: &str) {
        if !self.quiet {
            println!("{line}");
        }
    }

    pub fn done(&self, line: &str) {
        if !self.quiet {
            println!("{}", line.green().bold());
        }
    }

    pub fn caution(&self, line: &str) {
        eprintln!("{}", line.yellow());
    }

    /// Render rows as a table or JSON
    pub fn render<R: Tabled + Serialize>(&self, rows: &[R]) {
        match self.format {
            OutputFormat::Table if rows.is_empty() => self.status("(none)"),
            OutputFormat::Table => println!("{}", Table::new(rows)),
            OutputFormat::Json => match serde_json::to_string_pretty(rows) {
                Ok(json) => println!("{json}"),
                Err(e) => self.caution(&format!("Could not encode JSON: {e}")),
            },
        }
    }
}

// =============================================================================
// Row types
// =============================================================================

#[derive(Debug, Tabled, Serialize)]
pub struct DeviceRow {
    #[tabled(rename = "Device ID")]
    pub id: String,
    #[tabled(rename = "Device")]
    pub name: String,
    #[tabled(rename = "Transport")]
    pub transport: String,
    #[tabled(rename = "Open")]
    pub connected: String,
}

#[derive(Debug, Tabled, Serialize)]
pub struct PidRow {
    #[tabled(rename = "PID")]
    pub pid: String,
    #[tabled(rename = "Parameter")]
    pub name: String,
    #[tabled(rename = "Unit")]
    pub unit: String,
    #[tabled(rename = "Min")]
    pub min: String,
    #[tabled(rename = "Max")]
    pub max: String,
}

/// One decoded value of a telemetry block
#[derive(Debug, Tabled, Serialize)]
pub struct ValueRow {
    #[tabled(rename = "Parameter")]
    pub parameter: String,
    #[tabled(rename = "Value")]
    pub value: String,
    #[tabled(rename = "Unit")]
    pub unit: String,
    #[tabled(rename = "Range")]
    pub range: String,
}
