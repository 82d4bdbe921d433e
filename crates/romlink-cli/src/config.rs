//! Configuration file handling for romlink

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use romlink_kwp::SimulatorConfig;
use serde::{Deserialize, Serialize};

const DEFAULT_LOG_FILTER: &str = "romlink=info,romlink_kwp=info,romlink_manager=info";

/// Configuration for the CLI tool
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// `tracing` filter directive used when `--verbose` is not given
    pub log_filter: Option<String>,
    pub simulator: SimulatorSection,
}

/// `[simulator]` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulatorSection {
    /// Register the simulated CAN transport
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(flatten)]
    pub config: SimulatorConfig,
}

fn default_enabled() -> bool {
    true
}

impl Default for SimulatorSection {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            config: SimulatorConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// A missing file yields the defaults.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Get the default config file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("romlink");

        Ok(config_dir.join("config.toml"))
    }

    /// Filter directive, with `--verbose` taking precedence over the file
    pub fn log_filter(&self, verbose: bool) -> String {
        if verbose {
            return "debug".to_string();
        }
        self.log_filter
            .clone()
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string())
    }
}
