//! In-memory record store.

use crate::document::{
    CHANGE_CHANNEL_CAPACITY, Change, ChangeFeed, DelResult, Document, PutResult, QueryOptions,
    QueryResult, assign_id,
};
use crate::error::StoreError;
use crate::index::DocumentIndex;
use crate::RecordStore;
use async_trait::async_trait;
use std::sync::RwLock;
use tokio::sync::broadcast;

/// Process-local store. Contents are lost when the process exits.
pub struct MemoryStore {
    index: RwLock<DocumentIndex>,
    changes: broadcast::Sender<Change>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            index: RwLock::new(DocumentIndex::new()),
            changes,
        }
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.index.read().map(|index| index.len()).unwrap_or(0)
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn notify(&self) {
        // No subscribers is not an error.
        let _ = self.changes.send(Change);
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn ready(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn put(&self, mut doc: Document) -> Result<PutResult, StoreError> {
        let id = assign_id(&mut doc);
        {
            let mut index = self.index.write().map_err(|_| StoreError::LockPoisoned)?;
            index.upsert(doc);
        }
        tracing::debug!(id = %id, "Stored document");
        self.notify();
        Ok(PutResult { id })
    }

    async fn get(&self, id: &str) -> Result<Document, StoreError> {
        let index = self.index.read().map_err(|_| StoreError::LockPoisoned)?;
        index
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(id))
    }

    async fn del(&self, id: &str) -> Result<DelResult, StoreError> {
        {
            let mut index = self.index.write().map_err(|_| StoreError::LockPoisoned)?;
            index.remove(id).ok_or_else(|| StoreError::not_found(id))?;
        }
        tracing::debug!(id = %id, "Deleted document");
        self.notify();
        Ok(DelResult { id: id.to_string() })
    }

    async fn query(&self, index: &str, opts: QueryOptions) -> Result<QueryResult, StoreError> {
        let docs = self.index.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(docs.query(index, opts))
    }

    fn subscribe(&self) -> ChangeFeed {
        self.changes.subscribe()
    }
}
