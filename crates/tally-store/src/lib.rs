//! # tally-store
//!
//! The record store consumed by the Tally MCP server: a document database
//! keyed by generated identifiers, with point reads, writes and deletes, an
//! index-ordered range query, and a change feed that fires after every
//! committed mutation.
//!
//! ## Backends
//!
//! | Backend | Type | Change feed |
//! |---------|------|-------------|
//! | `memory` | [`MemoryStore`] | local mutations |
//! | `file` | [`FileStore`] | local mutations |
//! | `postgres` | [`PostgresStore`] | `LISTEN/NOTIFY`, so writes from other processes are seen too |
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use tally_store::{MemoryStore, QueryOptions, RecordStore};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), tally_store::StoreError> {
//! let store = MemoryStore::new();
//! store.ready().await?;
//!
//! let mut changes = store.subscribe();
//! let doc = json!({"text": "Buy milk", "created": 1}).as_object().cloned().unwrap();
//! let put = store.put(doc).await?;
//! changes.recv().await.ok();
//!
//! let result = store
//!     .query("created", QueryOptions { include_docs: true, descending: true, limit: Some(10) })
//!     .await?;
//! assert_eq!(result.rows[0].id, put.id);
//! # Ok(())
//! # }
//! ```

pub mod document;
pub mod error;
pub mod file;
pub mod index;
pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use std::sync::Arc;
use tally_core::{StoreBackend, StoreConfig};

pub use document::{Change, ChangeFeed, DelResult, Document, PutResult, QueryOptions, QueryResult, Row};
pub use error::StoreError;
pub use file::FileStore;
pub use memory::MemoryStore;
pub use postgres::PostgresStore;

/// A subscription-based document store.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Resolve once the store is initialized. Callers wait on this before any
    /// other call.
    async fn ready(&self) -> Result<(), StoreError>;

    /// Insert or overwrite a document. A document without an `id` gets a
    /// freshly generated one.
    async fn put(&self, doc: Document) -> Result<PutResult, StoreError>;

    /// Fetch a document by id. Fails with [`StoreError::NotFound`] if absent.
    async fn get(&self, id: &str) -> Result<Document, StoreError>;

    /// Remove a document. Fails with [`StoreError::NotFound`] if absent.
    async fn del(&self, id: &str) -> Result<DelResult, StoreError>;

    /// Range query over the named index (a top-level document field).
    async fn query(&self, index: &str, opts: QueryOptions) -> Result<QueryResult, StoreError>;

    /// Register for change notifications. One [`Change`] is delivered per
    /// committed mutation; it carries no description of what changed.
    fn subscribe(&self) -> ChangeFeed;
}

/// Create a store backend based on configuration.
pub async fn create_store(config: &StoreConfig) -> Result<Arc<dyn RecordStore>, StoreError> {
    match config.backend {
        StoreBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        StoreBackend::File => Ok(Arc::new(FileStore::open(config.file_path())?)),
        StoreBackend::Postgres => {
            let url = config
                .resolve_url()
                .map_err(|e| StoreError::Config(e.to_string()))?;
            Ok(Arc::new(
                PostgresStore::connect(&url, config.max_connections).await?,
            ))
        }
    }
}
