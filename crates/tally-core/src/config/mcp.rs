//! MCP server configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the MCP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpConfig {
    /// Server name reported in the `initialize` response.
    #[serde(default = "default_server_name")]
    pub server_name: String,

    /// Optional usage instructions reported to the host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            server_name: default_server_name(),
            instructions: None,
        }
    }
}

fn default_server_name() -> String {
    "tally".to_string()
}
