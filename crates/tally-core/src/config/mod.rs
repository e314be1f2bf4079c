//! Configuration types for Tally.
//!
//! Configuration is loaded from a single YAML file (`tally.yaml` by default).
//! Every section is optional and falls back to the defaults below, so an empty
//! file describes an in-memory todo server with a 10-record mirror window.
//!
//! ```yaml
//! variant: todo
//! store:
//!   backend: file
//!   path: .tally/records.jsonl
//! mirror:
//!   window: 10
//!   strategy: swap
//! ```

pub mod mcp;
pub mod mirror;
pub mod store;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub use mcp::McpConfig;
pub use mirror::{MirrorConfig, RefreshStrategy};
pub use store::{StoreBackend, StoreConfig};

/// Complete Tally configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TallyConfig {
    /// Which data set the server exposes.
    #[serde(default)]
    pub variant: Variant,

    /// Record store backend.
    #[serde(default)]
    pub store: StoreConfig,

    /// Mirror cache window and refresh strategy.
    #[serde(default)]
    pub mirror: MirrorConfig,

    /// MCP server details.
    #[serde(default)]
    pub mcp: McpConfig,
}

/// The data set variant served.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// Plain todo list (`todo:///<id>`).
    #[default]
    Todo,
    /// Christmas wishlist with elf shopping items (`wish:///<id>`).
    Wish,
}

impl Variant {
    /// URI scheme used for resources of this variant.
    pub fn scheme(self) -> &'static str {
        match self {
            Variant::Todo => "todo",
            Variant::Wish => "wish",
        }
    }

    /// Singular noun used in tool output.
    pub fn noun(self) -> &'static str {
        match self {
            Variant::Todo => "todo",
            Variant::Wish => "wish",
        }
    }

    /// Plural noun used in tool output.
    pub fn plural(self) -> &'static str {
        match self {
            Variant::Todo => "todos",
            Variant::Wish => "wishes",
        }
    }

    /// Parse a variant name as given on the command line.
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim() {
            "todo" => Ok(Variant::Todo),
            "wish" => Ok(Variant::Wish),
            other => Err(ConfigError::Config(format!(
                "unknown variant `{other}` (expected `todo` or `wish`)"
            ))),
        }
    }
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl TallyConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML content.
    ///
    /// An empty document yields the default configuration.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(ConfigError::from)
    }

    /// Load configuration from `path` if it exists, otherwise use defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::from_file(path)
        } else {
            tracing::warn!(config = %path.display(), "Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Serialize the configuration back to YAML.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(ConfigError::from)
    }

    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.mirror.validate()?;
        self.store.validate()?;
        Ok(())
    }
}
