//! Record model.
//!
//! Store documents are schemaless JSON objects. A [`Record`] is the typed view
//! of one document, decided once at decode time: documents tagged
//! `"type": "elf_item"` become [`RecordKind::SubItem`], everything else must
//! carry `text` and becomes [`RecordKind::Primary`].

use crate::config::Variant;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Document type tag for elf shopping items.
pub const ELF_ITEM_TYPE: &str = "elf_item";

/// A decoded store document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub id: String,
    /// Milliseconds since epoch, set once at insertion.
    pub created: i64,
    /// Milliseconds since epoch of the last mutation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<i64>,
    #[serde(flatten)]
    pub kind: RecordKind,
}

/// What a record holds.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RecordKind {
    /// A todo or a wish.
    Primary(Entry),
    /// An elf shopping item attached to a wish.
    SubItem(ElfItem),
}

/// A todo item or a wish.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entry {
    pub text: String,
    pub done: bool,
}

/// An item the elves have to buy for a wish.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ElfItem {
    pub wish_id: String,
    pub name: String,
    pub price: f64,
}

/// Errors decoding a document into a [`Record`].
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("document is missing required field `{0}`")]
    MissingField(&'static str),

    #[error("malformed document: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Wire shape of a document. `_id` is accepted for documents written by
/// CouchDB-style clients.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRecord {
    #[serde(alias = "_id")]
    id: Option<String>,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    created: Option<i64>,
    #[serde(default)]
    updated: Option<i64>,
    #[serde(default)]
    wish_id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    price: Option<f64>,
}

impl TryFrom<RawRecord> for Record {
    type Error = RecordError;

    fn try_from(raw: RawRecord) -> Result<Self, Self::Error> {
        let id = raw.id.ok_or(RecordError::MissingField("id"))?;
        let kind = if raw.kind.as_deref() == Some(ELF_ITEM_TYPE) {
            RecordKind::SubItem(ElfItem {
                wish_id: raw.wish_id.ok_or(RecordError::MissingField("wishId"))?,
                name: raw.name.ok_or(RecordError::MissingField("name"))?,
                price: raw.price.unwrap_or(0.0),
            })
        } else {
            RecordKind::Primary(Entry {
                text: raw.text.ok_or(RecordError::MissingField("text"))?,
                done: raw.done,
            })
        };

        Ok(Record {
            id,
            created: raw.created.unwrap_or(0),
            updated: raw.updated,
            kind,
        })
    }
}

impl Record {
    /// Decode a store document.
    pub fn from_document(doc: &Map<String, Value>) -> Result<Self, RecordError> {
        let raw: RawRecord = serde_json::from_value(Value::Object(doc.clone()))?;
        Record::try_from(raw)
    }

    /// Human-readable text used as resource name and content.
    pub fn display_text(&self) -> String {
        match &self.kind {
            RecordKind::Primary(entry) => entry.text.clone(),
            RecordKind::SubItem(item) => format!("{} (${:.2})", item.name, item.price),
        }
    }

    /// The primary entry, if this is not a sub-item.
    pub fn as_entry(&self) -> Option<&Entry> {
        match &self.kind {
            RecordKind::Primary(entry) => Some(entry),
            RecordKind::SubItem(_) => None,
        }
    }

    /// The elf item, if this is a sub-item.
    pub fn as_elf_item(&self) -> Option<&ElfItem> {
        match &self.kind {
            RecordKind::Primary(_) => None,
            RecordKind::SubItem(item) => Some(item),
        }
    }
}

impl Entry {
    /// Build the document for a new primary record. The store assigns the id.
    pub fn new_document(variant: Variant, text: &str, now: i64) -> Map<String, Value> {
        let value = json!({
            "type": variant.noun(),
            "text": text,
            "done": false,
            "created": now,
        });
        into_map(value)
    }
}

impl ElfItem {
    /// Build the document for a new elf item attached to `wish_id`.
    pub fn new_document(wish_id: &str, name: &str, price: f64, now: i64) -> Map<String, Value> {
        let value = json!({
            "type": ELF_ITEM_TYPE,
            "wishId": wish_id,
            "name": name,
            "price": price,
            "created": now,
        });
        into_map(value)
    }
}

/// Current time in milliseconds since epoch.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn into_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
