//! In-process document index shared by the memory and file backends.
//!
//! Documents are keyed by id and stamped with a commit sequence number. Range
//! queries sort by the indexed field using CouchDB-style collation
//! (null < bool < number < string < array < object) and break ties by commit
//! order, so two documents created in the same millisecond still have a stable
//! recency order.

use crate::document::{Document, QueryOptions, QueryResult, Row, document_id};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct Slot {
    seq: u64,
    doc: Document,
}

/// Id-keyed documents with commit order.
#[derive(Debug, Default)]
pub struct DocumentIndex {
    docs: HashMap<String, Slot>,
    next_seq: u64,
}

impl DocumentIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite. The document must already carry its id.
    pub fn upsert(&mut self, doc: Document) {
        let Some(id) = document_id(&doc).map(str::to_string) else {
            tracing::warn!("Ignoring document without id");
            return;
        };
        let seq = self.next_seq;
        self.next_seq += 1;
        self.docs.insert(id, Slot { seq, doc });
    }

    pub fn remove(&mut self, id: &str) -> Option<Document> {
        self.docs.remove(id).map(|slot| slot.doc)
    }

    pub fn get(&self, id: &str) -> Option<&Document> {
        self.docs.get(id).map(|slot| &slot.doc)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.docs.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// All documents, oldest commit first.
    pub fn in_commit_order(&self) -> Vec<&Document> {
        let mut slots: Vec<&Slot> = self.docs.values().collect();
        slots.sort_by_key(|slot| slot.seq);
        slots.into_iter().map(|slot| &slot.doc).collect()
    }

    /// Range query over `field`. Documents without the field are not indexed.
    pub fn query(&self, field: &str, opts: QueryOptions) -> QueryResult {
        let mut hits: Vec<(&String, &Value, &Slot)> = self
            .docs
            .iter()
            .filter_map(|(id, slot)| slot.doc.get(field).map(|key| (id, key, slot)))
            .collect();

        hits.sort_by(|a, b| collate(a.1, b.1).then(a.2.seq.cmp(&b.2.seq)));
        if opts.descending {
            hits.reverse();
        }

        let limit = opts.limit.unwrap_or(usize::MAX);
        let rows = hits
            .into_iter()
            .take(limit)
            .map(|(id, key, slot)| Row {
                id: id.clone(),
                key: key.clone(),
                doc: opts.include_docs.then(|| slot.doc.clone()),
            })
            .collect();

        QueryResult { rows }
    }
}

fn rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Compare two index keys.
pub(crate) fn collate(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}
