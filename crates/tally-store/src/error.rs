//! Error types for the store crate.

use thiserror::Error;

/// Errors that can occur in a record store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No document with this id.
    #[error("document not found: {id}")]
    NotFound { id: String },

    /// The backend cannot order by this index.
    #[error("index not found: {index}")]
    IndexNotFound { index: String },

    /// Document could not be stored as given.
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// Backend configuration problem.
    #[error("store configuration error: {0}")]
    Config(String),

    /// An in-process lock was poisoned by a panicking writer.
    #[error("store lock poisoned")]
    LockPoisoned,

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    pub(crate) fn not_found(id: impl Into<String>) -> Self {
        StoreError::NotFound { id: id.into() }
    }

    /// Whether this error means the document does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}
