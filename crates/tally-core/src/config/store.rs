//! Record store configuration.

use super::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the record store backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Backend type: "memory", "file" or "postgres".
    #[serde(default)]
    pub backend: StoreBackend,

    /// JSON Lines log path (file backend only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Postgres connection URL (postgres backend only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Environment variable holding the connection URL (alternative to `url`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_env: Option<String>,

    /// Maximum pool connections (postgres backend only).
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

/// Record store backend type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process-local store; contents are lost on exit.
    #[default]
    Memory,
    /// JSON Lines append log on local disk.
    File,
    /// Postgres table with LISTEN/NOTIFY change feed.
    Postgres,
}

impl StoreBackend {
    /// Parse a backend name as given on the command line.
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim() {
            "memory" => Ok(StoreBackend::Memory),
            "file" => Ok(StoreBackend::File),
            "postgres" => Ok(StoreBackend::Postgres),
            other => Err(ConfigError::Config(format!(
                "unknown store backend `{other}` (expected `memory`, `file` or `postgres`)"
            ))),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: None,
            url: None,
            url_env: None,
            max_connections: default_max_connections(),
        }
    }
}

impl StoreConfig {
    /// Path of the JSON Lines log, falling back to `.tally/records.jsonl`.
    pub fn file_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(default_file_path)
    }

    /// Resolve the Postgres URL: explicit `url` wins over `url_env`.
    pub fn resolve_url(&self) -> Result<String, ConfigError> {
        if let Some(url) = &self.url {
            return Ok(url.clone());
        }
        match &self.url_env {
            Some(var) => std::env::var(var).map_err(|_| {
                ConfigError::Config(format!("environment variable `{var}` is not set"))
            }),
            None => Err(ConfigError::Config(
                "postgres backend requires `store.url` or `store.url_env`".to_string(),
            )),
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.backend == StoreBackend::Postgres && self.url.is_none() && self.url_env.is_none() {
            return Err(ConfigError::Config(
                "postgres backend requires `store.url` or `store.url_env`".to_string(),
            ));
        }
        if self.max_connections == 0 {
            return Err(ConfigError::Config(
                "`store.max_connections` must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_max_connections() -> u32 {
    5
}

fn default_file_path() -> PathBuf {
    PathBuf::from(".tally/records.jsonl")
}
