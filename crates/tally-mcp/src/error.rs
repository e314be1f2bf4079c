//! Error types for the MCP crate.

use tally_core::RecordError;
use tally_store::StoreError;
use thiserror::Error;

/// JSON-RPC: invalid params.
pub const INVALID_PARAMS: i32 = -32602;
/// JSON-RPC: internal error.
pub const INTERNAL_ERROR: i32 = -32603;
/// MCP: resource not found.
pub const RESOURCE_NOT_FOUND: i32 = -32002;

/// Errors that can occur while answering a request.
#[derive(Debug, Error)]
pub enum McpError {
    /// Request params could not be parsed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A required argument is absent or empty.
    #[error("required field missing: {field}")]
    Validation { field: String },

    /// An argument is present but unusable.
    #[error("invalid argument {field}: {reason}")]
    InvalidArgument { field: String, reason: String },

    /// Resource URI does not use this server's scheme.
    #[error("invalid resource URI: {0}")]
    InvalidUri(String),

    /// Referenced record does not exist.
    #[error("not found: {id}")]
    NotFound { id: String },

    /// Tool name is not in the published list.
    #[error("unknown tool: {name}")]
    UnknownTool { name: String },

    /// Prompt name is not in the published list.
    #[error("unknown prompt: {name}")]
    UnknownPrompt { name: String },

    /// Record store call failed.
    #[error("store error: {0}")]
    Store(StoreError),

    /// Stored document could not be decoded.
    #[error("invalid stored document: {0}")]
    Record(#[from] RecordError),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StoreError> for McpError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { id } => McpError::NotFound { id },
            other => McpError::Store(other),
        }
    }
}

impl McpError {
    pub fn validation(field: impl Into<String>) -> Self {
        McpError::Validation {
            field: field.into(),
        }
    }

    pub fn not_found(id: impl Into<String>) -> Self {
        McpError::NotFound { id: id.into() }
    }

    /// Stable machine-readable category, sent as `error.data.kind`.
    pub fn kind(&self) -> &'static str {
        match self {
            McpError::InvalidRequest(_) | McpError::InvalidUri(_) => "invalid_request",
            McpError::Validation { .. } | McpError::InvalidArgument { .. } => "validation",
            McpError::NotFound { .. } => "not_found",
            McpError::UnknownTool { .. } | McpError::UnknownPrompt { .. } => "unknown_operation",
            McpError::Store(_) | McpError::Record(_) => "store",
            McpError::Serialization(_) | McpError::Io(_) => "internal",
        }
    }

    /// JSON-RPC error code.
    pub fn code(&self) -> i32 {
        match self {
            McpError::NotFound { .. } => RESOURCE_NOT_FOUND,
            McpError::InvalidRequest(_)
            | McpError::InvalidUri(_)
            | McpError::Validation { .. }
            | McpError::InvalidArgument { .. }
            | McpError::UnknownTool { .. }
            | McpError::UnknownPrompt { .. } => INVALID_PARAMS,
            McpError::Store(_)
            | McpError::Record(_)
            | McpError::Serialization(_)
            | McpError::Io(_) => INTERNAL_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_not_found_becomes_not_found() {
        let err: McpError = StoreError::NotFound {
            id: "abc".to_string(),
        }
        .into();
        assert!(matches!(err, McpError::NotFound { ref id } if id == "abc"));
        assert_eq!(err.kind(), "not_found");
        assert_eq!(err.code(), RESOURCE_NOT_FOUND);
    }

    #[test]
    fn other_store_errors_stay_store_errors() {
        let err: McpError = StoreError::IndexNotFound {
            index: "created".to_string(),
        }
        .into();
        assert_eq!(err.kind(), "store");
        assert_eq!(err.code(), INTERNAL_ERROR);
    }

    #[test]
    fn messages() {
        assert_eq!(
            McpError::validation("text").to_string(),
            "required field missing: text"
        );
        assert_eq!(
            McpError::UnknownTool {
                name: "fly".to_string()
            }
            .to_string(),
            "unknown tool: fly"
        );
        assert_eq!(
            McpError::UnknownPrompt {
                name: "x".to_string()
            }
            .kind(),
            "unknown_operation"
        );
    }
}
