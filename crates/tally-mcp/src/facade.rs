//! Protocol facade.
//!
//! Reads are answered from the mirror only. Tool writes go straight to the
//! store; the mirror picks them up on the next refresh.

use crate::error::McpError;
use crate::mirror::{MirrorCache, Snapshot};
use crate::prompts::PromptCatalog;
use crate::protocol::{
    GetPromptResult, PromptDefinition, ReadResourceResult, ResourceDescriptor, ToolDefinition,
};
use crate::resources;
use crate::tools::{ToolAction, ToolRegistry};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;
use tally_core::{ElfItem, Entry, Record, RecordKind, Variant, now_millis};
use tally_store::RecordStore;

pub struct Facade {
    variant: Variant,
    store: Arc<dyn RecordStore>,
    mirror: Arc<MirrorCache>,
    tools: ToolRegistry,
    prompts: PromptCatalog,
}

impl Facade {
    pub fn new(variant: Variant, store: Arc<dyn RecordStore>, mirror: Arc<MirrorCache>) -> Self {
        Self {
            variant,
            store,
            mirror,
            tools: ToolRegistry::for_variant(variant),
            prompts: PromptCatalog::for_variant(variant),
        }
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn mirror(&self) -> &Arc<MirrorCache> {
        &self.mirror
    }

    pub fn list_resources(&self) -> Vec<ResourceDescriptor> {
        self.mirror
            .all()
            .iter()
            .map(|record| resources::descriptor(self.variant, record))
            .collect()
    }

    pub fn read_resource(&self, uri: &str) -> Result<ReadResourceResult, McpError> {
        let id = resources::parse_uri(self.variant, uri)?;
        let record = self.mirror.get(id).ok_or_else(|| McpError::not_found(id))?;
        Ok(ReadResourceResult {
            contents: vec![resources::contents(self.variant, &record)],
        })
    }

    pub fn list_tools(&self) -> Vec<&ToolDefinition> {
        self.tools.list()
    }

    /// Whether `name` is a published tool.
    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains(name)
    }

    /// Run a tool and return its text output.
    pub async fn call_tool(&self, name: &str, args: &Value) -> Result<String, McpError> {
        let action = self.tools.action(name).ok_or_else(|| McpError::UnknownTool {
            name: name.to_string(),
        })?;
        tracing::debug!(tool = name, ?action, "Calling tool");

        match action {
            ToolAction::Create => self.create(required_text(args, "text")?).await,
            ToolAction::List => Ok(self.render_list()),
            ToolAction::MarkDone => self.mark_done(required_str(args, "id")?).await,
            ToolAction::Delete => self.delete(required_str(args, "id")?).await,
            ToolAction::AddElfItem => {
                let wish_id = required_str(args, "wishId")?;
                let name = required_text(args, "name")?;
                let price = required_price(args)?;
                self.add_elf_item(wish_id, name, price).await
            }
        }
    }

    pub fn list_prompts(&self) -> Vec<&PromptDefinition> {
        self.prompts.list()
    }

    pub fn get_prompt(
        &self,
        name: &str,
        arguments: &HashMap<String, String>,
    ) -> Result<GetPromptResult, McpError> {
        self.prompts.render(name, arguments, &self.mirror.all())
    }

    async fn create(&self, text: &str) -> Result<String, McpError> {
        let doc = Entry::new_document(self.variant, text, now_millis());
        let put = self.store.put(doc).await?;
        tracing::info!(id = %put.id, kind = self.variant.noun(), "Record created");
        Ok(format!("Created {} {}", self.variant.noun(), put.id))
    }

    // Read-modify-write without a revision check; a concurrent writer's
    // change to the same document between get and put is lost.
    async fn mark_done(&self, id: &str) -> Result<String, McpError> {
        let mut doc = self.store.get(id).await?;
        let record = Record::from_document(&doc)?;
        if record.as_entry().is_none() {
            return Err(McpError::InvalidArgument {
                field: "id".to_string(),
                reason: format!("{id} is not a {}", self.variant.noun()),
            });
        }

        doc.insert("done".to_string(), Value::Bool(true));
        doc.insert("updated".to_string(), Value::from(now_millis()));
        self.store.put(doc).await?;
        tracing::info!(%id, "Record marked done");
        Ok(format!("Marked {} {id} as done", self.variant.noun()))
    }

    // Elf items are found through the mirror; items outside the window stay.
    async fn delete(&self, id: &str) -> Result<String, McpError> {
        self.store.del(id).await?;
        tracing::info!(%id, "Record deleted");

        let snapshot = self.mirror.all();
        for item in elf_items_of(&snapshot, id) {
            match self.store.del(&item.id).await {
                Ok(_) => tracing::info!(id = %item.id, wish_id = %id, "Elf item deleted"),
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(format!("Deleted {} {id}", self.variant.noun()))
    }

    async fn add_elf_item(&self, wish_id: &str, name: &str, price: f64) -> Result<String, McpError> {
        let wish = Record::from_document(&self.store.get(wish_id).await?)?;
        if wish.as_entry().is_none() {
            return Err(McpError::InvalidArgument {
                field: "wishId".to_string(),
                reason: format!("{wish_id} is not a wish"),
            });
        }

        let put = self
            .store
            .put(ElfItem::new_document(wish_id, name, price, now_millis()))
            .await?;
        tracing::info!(id = %put.id, %wish_id, "Elf item added");
        Ok(format!("Added elf item {} to wish {wish_id}", put.id))
    }

    fn render_list(&self) -> String {
        let snapshot = self.mirror.all();
        let entries: Vec<&Record> = snapshot.iter().filter(|r| r.as_entry().is_some()).collect();
        if entries.is_empty() {
            return format!("No {} found.", self.variant.plural());
        }

        let mut out = String::new();
        for record in entries {
            let _ = writeln!(out, "{}", list_line(record));
            for item in elf_items_of(&snapshot, &record.id) {
                let _ = writeln!(out, "    - {} (id: {})", item.display_text(), item.id);
            }
        }
        out.truncate(out.trim_end().len());
        out
    }
}

fn list_line(record: &Record) -> String {
    match &record.kind {
        RecordKind::Primary(entry) => {
            let mark = if entry.done { "x" } else { " " };
            format!("- [{mark}] {} (id: {})", entry.text, record.id)
        }
        RecordKind::SubItem(_) => format!("- {} (id: {})", record.display_text(), record.id),
    }
}

fn elf_items_of<'a>(snapshot: &'a Snapshot, wish_id: &'a str) -> impl Iterator<Item = &'a Record> {
    snapshot
        .iter()
        .filter(move |r| r.as_elf_item().is_some_and(|item| item.wish_id == wish_id))
}

/// A required, non-blank identifier argument, trimmed.
fn required_str<'a>(args: &'a Value, field: &str) -> Result<&'a str, McpError> {
    required_text(args, field).map(str::trim)
}

/// A required, non-blank free-text argument, returned as given.
fn required_text<'a>(args: &'a Value, field: &str) -> Result<&'a str, McpError> {
    args.get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| McpError::validation(field))
}

fn required_price(args: &Value) -> Result<f64, McpError> {
    let value = args.get("price").ok_or_else(|| McpError::validation("price"))?;
    let price = value.as_f64().ok_or_else(|| McpError::InvalidArgument {
        field: "price".to_string(),
        reason: "must be a number".to_string(),
    })?;
    if !price.is_finite() || price < 0.0 {
        return Err(McpError::InvalidArgument {
            field: "price".to_string(),
            reason: "must be zero or more".to_string(),
        });
    }
    Ok(price)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tally_store::MemoryStore;

    fn facade(variant: Variant) -> (Facade, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let facade = Facade::new(variant, store.clone(), Arc::new(MirrorCache::new()));
        (facade, store)
    }

    fn created_id(output: &str) -> String {
        output.rsplit(' ').next().unwrap().to_string()
    }

    #[tokio::test]
    async fn create_writes_to_store_not_mirror() {
        let (facade, store) = facade(Variant::Todo);

        let output = facade
            .call_tool("create_todo", &json!({"text": "Buy milk"}))
            .await
            .unwrap();
        let id = created_id(&output);

        assert_eq!(store.get(&id).await.unwrap()["text"], "Buy milk");
        assert!(facade.mirror().is_empty());
    }

    #[tokio::test]
    async fn blank_text_is_rejected() {
        let (facade, store) = facade(Variant::Todo);

        for args in [json!({}), json!({"text": ""}), json!({"text": "  "}), json!(null)] {
            let err = facade.call_tool("create_todo", &args).await.unwrap_err();
            assert!(matches!(err, McpError::Validation { ref field } if field == "text"));
        }
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn create_keeps_surrounding_whitespace() {
        let (facade, store) = facade(Variant::Todo);

        let output = facade
            .call_tool("create_todo", &json!({"text": "  indented note\n"}))
            .await
            .unwrap();

        let doc = store.get(&created_id(&output)).await.unwrap();
        assert_eq!(doc["text"], "  indented note\n");
    }

    #[tokio::test]
    async fn ids_are_trimmed() {
        let (facade, store) = facade(Variant::Todo);
        let id = created_id(
            &facade
                .call_tool("create_todo", &json!({"text": "Buy milk"}))
                .await
                .unwrap(),
        );

        facade
            .call_tool("mark_todo_done", &json!({"id": format!(" {id} ")}))
            .await
            .unwrap();
        assert_eq!(store.get(&id).await.unwrap()["done"], true);
    }

    #[tokio::test]
    async fn mark_done_keeps_text() {
        let (facade, store) = facade(Variant::Todo);
        let id = created_id(
            &facade
                .call_tool("create_todo", &json!({"text": "Buy milk"}))
                .await
                .unwrap(),
        );

        facade
            .call_tool("mark_todo_done", &json!({"id": id}))
            .await
            .unwrap();

        let doc = store.get(&id).await.unwrap();
        assert_eq!(doc["done"], true);
        assert_eq!(doc["text"], "Buy milk");
        assert!(doc["updated"].is_i64());
    }

    #[tokio::test]
    async fn mark_done_of_missing_record_is_not_found() {
        let (facade, _) = facade(Variant::Todo);
        let err = facade
            .call_tool("mark_todo_done", &json!({"id": "ghost"}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[tokio::test]
    async fn elf_item_requires_existing_wish() {
        let (facade, store) = facade(Variant::Wish);

        let err = facade
            .call_tool(
                "add_elf_item",
                &json!({"wishId": "nope", "name": "Bow", "price": 2}),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, McpError::NotFound { .. }));

        let wish_id = created_id(
            &facade
                .call_tool("add_wish", &json!({"text": "Train set"}))
                .await
                .unwrap(),
        );
        let err = facade
            .call_tool(
                "add_elf_item",
                &json!({"wishId": wish_id, "name": "Bow", "price": -1}),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, McpError::InvalidArgument { .. }));

        let output = facade
            .call_tool(
                "add_elf_item",
                &json!({"wishId": wish_id, "name": "Bow", "price": 2.5}),
            )
            .await
            .unwrap();
        assert!(output.ends_with(&wish_id));
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn deleting_a_wish_removes_its_elf_items() {
        let (facade, store) = facade(Variant::Wish);
        let wish_id = created_id(
            &facade
                .call_tool("add_wish", &json!({"text": "Train set"}))
                .await
                .unwrap(),
        );
        let item_id = created_id(
            &facade
                .call_tool(
                    "add_elf_item",
                    &json!({"wishId": wish_id, "name": "Rails", "price": 4}),
                )
                .await
                .unwrap(),
        );
        let other_id = created_id(
            &facade
                .call_tool("add_wish", &json!({"text": "Kite"}))
                .await
                .unwrap(),
        );
        let item = Record::from_document(&store.get(&item_id).await.unwrap()).unwrap();
        facade.mirror().put(item);

        facade
            .call_tool("delete_wish", &json!({"id": wish_id}))
            .await
            .unwrap();

        assert!(store.get(&wish_id).await.unwrap_err().is_not_found());
        assert!(store.get(&item_id).await.unwrap_err().is_not_found());
        assert!(store.get(&other_id).await.is_ok());
    }

    #[tokio::test]
    async fn list_reads_the_mirror() {
        let (facade, _) = facade(Variant::Wish);
        assert_eq!(
            facade.call_tool("list_wishes", &json!({})).await.unwrap(),
            "No wishes found."
        );

        let mirror = facade.mirror();
        mirror.put(
            Record::from_document(
                json!({"id": "w1", "text": "Train set", "done": true, "created": 2})
                    .as_object()
                    .unwrap(),
            )
            .unwrap(),
        );
        mirror.put(
            Record::from_document(
                json!({"id": "e1", "type": "elf_item", "wishId": "w1", "name": "Rails", "price": 4, "created": 1})
                    .as_object()
                    .unwrap(),
            )
            .unwrap(),
        );

        assert_eq!(
            facade.call_tool("list_wishes", &json!({})).await.unwrap(),
            "- [x] Train set (id: w1)\n    - Rails ($4.00) (id: e1)"
        );
    }

    #[tokio::test]
    async fn read_resource_errors() {
        let (facade, _) = facade(Variant::Todo);
        assert!(matches!(
            facade.read_resource("todo:///missing"),
            Err(McpError::NotFound { .. })
        ));
        assert!(matches!(
            facade.read_resource("http://example.com"),
            Err(McpError::InvalidUri(_))
        ));
    }

    #[tokio::test]
    async fn unknown_tool() {
        let (facade, _) = facade(Variant::Todo);
        let err = facade.call_tool("add_wish", &json!({"text": "x"})).await.unwrap_err();
        assert_eq!(err.kind(), "unknown_operation");
    }
}
