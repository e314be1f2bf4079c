//! CLI command implementations for the Tally MCP server.

pub mod check;
pub mod init;
pub mod serve;
pub mod tools;

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use tally_core::{TallyConfig, Variant};

/// Configuration file selection shared by every command.
#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Configuration file path.
    #[arg(short, long, default_value = "tally.yaml", env = "TALLY_CONFIG")]
    pub config: PathBuf,

    /// Record variant (todo or wish). Overrides config file.
    #[arg(long)]
    pub variant: Option<String>,
}

impl ConfigArgs {
    /// Load the config file (defaults if absent) and apply the variant override.
    pub fn load(&self) -> Result<TallyConfig> {
        let mut config = TallyConfig::load_or_default(&self.config)
            .with_context(|| format!("Failed to load configuration from {:?}", self.config))?;
        if let Some(variant) = &self.variant {
            config.variant = Variant::parse(variant)?;
        }
        Ok(config)
    }
}
