//! File-based record store.
//!
//! Mutations are appended to a JSON Lines log, one event per line:
//!
//! ```text
//! {"op":"put","doc":{"id":"...","text":"Buy milk","done":false,"created":1734000000000}}
//! {"op":"del","id":"..."}
//! ```
//!
//! On open the log is replayed into an in-memory [`DocumentIndex`] and then
//! compacted so it holds one `put` per live document. Lines that fail to parse
//! are skipped with a warning.

use crate::document::{
    CHANGE_CHANNEL_CAPACITY, Change, ChangeFeed, DelResult, Document, PutResult, QueryOptions,
    QueryResult, assign_id,
};
use crate::error::StoreError;
use crate::index::DocumentIndex;
use crate::RecordStore;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tokio::sync::broadcast;

/// One line of the log.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
enum LogEntry {
    Put { doc: Document },
    Del { id: String },
}

/// JSON Lines backed store.
pub struct FileStore {
    path: PathBuf,
    index: RwLock<DocumentIndex>,
    changes: broadcast::Sender<Change>,
}

impl FileStore {
    /// Open (or create) the log at `path`, replay it and compact it.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let index = Self::replay(&path)?;
        Self::compact(&path, &index)?;
        tracing::info!(
            path = %path.display(),
            documents = index.len(),
            "Opened file record store"
        );

        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Ok(Self {
            path,
            index: RwLock::new(index),
            changes,
        })
    }

    /// Path of the backing log.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn replay(path: &Path) -> Result<DocumentIndex, StoreError> {
        let mut index = DocumentIndex::new();
        if !path.exists() {
            return Ok(index);
        }

        let file = fs::File::open(path)?;
        let reader = BufReader::new(file);

        for (line_num, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            match serde_json::from_str::<LogEntry>(line) {
                Ok(LogEntry::Put { doc }) => index.upsert(doc),
                Ok(LogEntry::Del { id }) => {
                    index.remove(&id);
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to parse log entry on line {} of {}: {}",
                        line_num + 1,
                        path.display(),
                        e
                    );
                }
            }
        }

        Ok(index)
    }

    /// Rewrite the log with one `put` per live document, in commit order.
    fn compact(path: &Path, index: &DocumentIndex) -> Result<(), StoreError> {
        let tmp = path.with_extension("jsonl.tmp");
        {
            let mut file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&tmp)?;
            for doc in index.in_commit_order() {
                let entry = LogEntry::Put { doc: doc.clone() };
                writeln!(file, "{}", serde_json::to_string(&entry)?)?;
            }
            file.sync_all()?;
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }

    fn append(&self, entry: &LogEntry) -> Result<(), StoreError> {
        let json = serde_json::to_string(entry)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", json)?;
        Ok(())
    }

    fn notify(&self) {
        let _ = self.changes.send(Change);
    }
}

#[async_trait]
impl RecordStore for FileStore {
    async fn ready(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn put(&self, mut doc: Document) -> Result<PutResult, StoreError> {
        let id = assign_id(&mut doc);
        {
            let mut index = self.index.write().map_err(|_| StoreError::LockPoisoned)?;
            let entry = LogEntry::Put { doc };
            self.append(&entry)?;
            if let LogEntry::Put { doc } = entry {
                index.upsert(doc);
            }
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
            if !index.contains(id) {
                return Err(StoreError::not_found(id));
            }
            self.append(&LogEntry::Del { id: id.to_string() })?;
            index.remove(id);
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
