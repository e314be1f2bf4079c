//! Resource projection.
//!
//! Every mirrored record is exposed as `<scheme>:///<id>` with its display
//! text as plain-text content.

use crate::error::McpError;
use crate::protocol::{ResourceContents, ResourceDescriptor};
use tally_core::{Record, RecordKind, Variant};

/// MIME type of every resource.
pub const MIME_TYPE: &str = "text/plain";

/// URI of the record `id`.
pub fn resource_uri(variant: Variant, id: &str) -> String {
    format!("{}:///{}", variant.scheme(), id)
}

/// Extract the record id from a resource URI.
pub fn parse_uri(variant: Variant, uri: &str) -> Result<&str, McpError> {
    let id = uri
        .strip_prefix(variant.scheme())
        .and_then(|rest| rest.strip_prefix(":///"))
        .ok_or_else(|| McpError::InvalidUri(uri.to_string()))?;

    if id.is_empty() || id.contains('/') {
        return Err(McpError::InvalidUri(uri.to_string()));
    }
    Ok(id)
}

pub fn descriptor(variant: Variant, record: &Record) -> ResourceDescriptor {
    let description = match &record.kind {
        RecordKind::Primary(entry) if entry.done => Some(format!("A completed {}", variant.noun())),
        RecordKind::Primary(_) => Some(format!("A {}", variant.noun())),
        RecordKind::SubItem(item) => Some(format!("Elf shopping item for wish {}", item.wish_id)),
    };

    ResourceDescriptor {
        uri: resource_uri(variant, &record.id),
        mime_type: MIME_TYPE.to_string(),
        name: record.display_text(),
        description,
    }
}

pub fn contents(variant: Variant, record: &Record) -> ResourceContents {
    ResourceContents {
        uri: resource_uri(variant, &record.id),
        mime_type: MIME_TYPE.to_string(),
        text: record.display_text(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::{ElfItem, Entry};

    #[test]
    fn parses_own_scheme_only() {
        assert_eq!(parse_uri(Variant::Todo, "todo:///abc").unwrap(), "abc");
        assert!(matches!(
            parse_uri(Variant::Todo, "wish:///abc"),
            Err(McpError::InvalidUri(_))
        ));
        assert!(parse_uri(Variant::Todo, "todo:///").is_err());
        assert!(parse_uri(Variant::Todo, "todo://abc").is_err());
        assert!(parse_uri(Variant::Wish, "wish:///a/b").is_err());
    }

    #[test]
    fn elf_item_is_named_with_price() {
        let record = Record {
            id: "e1".to_string(),
            created: 1,
            updated: None,
            kind: RecordKind::SubItem(ElfItem {
                wish_id: "w1".to_string(),
                name: "Ribbon".to_string(),
                price: 3.5,
            }),
        };
        let descriptor = descriptor(Variant::Wish, &record);
        assert_eq!(descriptor.uri, "wish:///e1");
        assert_eq!(descriptor.name, "Ribbon ($3.50)");
        assert_eq!(descriptor.mime_type, "text/plain");
    }

    #[test]
    fn contents_carry_text() {
        let record = Record {
            id: "a".to_string(),
            created: 1,
            updated: None,
            kind: RecordKind::Primary(Entry {
                text: "Buy milk".to_string(),
                done: false,
            }),
        };
        let contents = contents(Variant::Todo, &record);
        assert_eq!(contents.uri, "todo:///a");
        assert_eq!(contents.text, "Buy milk");
    }
}
