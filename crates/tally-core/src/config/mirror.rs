//! Mirror cache configuration.

use super::ConfigError;
use serde::{Deserialize, Serialize};

/// Configuration for the in-memory mirror of the record store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorConfig {
    /// Maximum number of most-recent records held in the mirror.
    #[serde(default = "default_window")]
    pub window: usize,

    /// How a refresh replaces the mirror contents.
    #[serde(default)]
    pub strategy: RefreshStrategy,

    /// Store index used to order records (most recent first).
    #[serde(default = "default_index")]
    pub index: String,
}

/// How the refresh procedure replaces the mirror contents.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RefreshStrategy {
    /// Query first, then swap the new snapshot in. Readers never see an empty
    /// mirror, and a failed query keeps the previous snapshot.
    #[default]
    Swap,
    /// Clear, query, then repopulate. Readers may observe an empty mirror while
    /// the query is in flight, and a failed query leaves it empty.
    ClearFirst,
}

impl RefreshStrategy {
    /// Parse a strategy name as given on the command line.
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim() {
            "swap" => Ok(RefreshStrategy::Swap),
            "clear_first" | "clear-first" => Ok(RefreshStrategy::ClearFirst),
            other => Err(ConfigError::Config(format!(
                "unknown refresh strategy `{other}` (expected `swap` or `clear_first`)"
            ))),
        }
    }
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            window: default_window(),
            strategy: RefreshStrategy::default(),
            index: default_index(),
        }
    }
}

impl MirrorConfig {
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.window == 0 {
            return Err(ConfigError::Config(
                "`mirror.window` must be at least 1".to_string(),
            ));
        }
        if self.index.trim().is_empty() {
            return Err(ConfigError::Config(
                "`mirror.index` must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_window() -> usize {
    10
}

fn default_index() -> String {
    "created".to_string()
}
