//! Document and query types shared by all store backends.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::broadcast;

/// A schemaless JSON document. The identifier lives in the `id` field.
pub type Document = Map<String, Value>;

/// Receiving end of a store's change notifications.
pub type ChangeFeed = broadcast::Receiver<Change>;

/// Capacity of each backend's change channel. Slow subscribers observe a
/// `Lagged` error instead of blocking writers.
pub(crate) const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Notification that some committed mutation happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Change;

/// Result of a `put`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutResult {
    pub id: String,
}

/// Result of a `del`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelResult {
    pub id: String,
}

/// Options for an index range query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryOptions {
    /// Attach the full document to each row.
    #[serde(default)]
    pub include_docs: bool,
    /// Highest key first.
    #[serde(default)]
    pub descending: bool,
    /// Maximum number of rows.
    #[serde(default)]
    pub limit: Option<usize>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            include_docs: true,
            descending: false,
            limit: None,
        }
    }
}

/// Result of an index range query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub rows: Vec<Row>,
}

/// One query row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub id: String,
    /// The indexed value.
    pub key: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<Document>,
}

/// Read a document's identifier (`id`, or CouchDB-style `_id`).
pub fn document_id(doc: &Document) -> Option<&str> {
    doc.get("id")
        .or_else(|| doc.get("_id"))
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
}

/// Ensure `doc` has an `id`, generating one if missing. Returns the id.
pub(crate) fn assign_id(doc: &mut Document) -> String {
    let id = match document_id(doc) {
        Some(id) => id.to_string(),
        None => uuid::Uuid::new_v4().to_string(),
    };
    doc.remove("_id");
    doc.insert("id".to_string(), Value::String(id.clone()));
    id
}
