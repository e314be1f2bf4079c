//! Tool registry for MCP tools.
//!
//! Each variant publishes a fixed set of tools. The registry keeps them in
//! publication order and maps each name to the [`ToolAction`] the facade
//! dispatches on.

use crate::protocol::{ToolAnnotations, ToolDefinition};
use serde_json::{Value, json};
use tally_core::Variant;

/// What a tool does, independent of the variant's naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolAction {
    /// Write a new primary record.
    Create,
    /// Render the mirrored records.
    List,
    /// Read-modify-write `done = true`.
    MarkDone,
    /// Remove a record.
    Delete,
    /// Attach an elf shopping item to a wish.
    AddElfItem,
}

/// Registry of available MCP tools.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<(ToolDefinition, ToolAction)>,
}

impl ToolRegistry {
    /// Create a new empty tool registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The published tools for `variant`.
    pub fn for_variant(variant: Variant) -> Self {
        let mut registry = Self::new();
        match variant {
            Variant::Todo => {
                registry.register(
                    tool(
                        "create_todo",
                        "Create a new todo item",
                        text_schema("Text of the todo item"),
                        write_hints(false),
                    ),
                    ToolAction::Create,
                );
                registry.register(
                    tool(
                        "list_todos",
                        "List the most recent todo items",
                        empty_schema(),
                        read_hints(),
                    ),
                    ToolAction::List,
                );
                registry.register(
                    tool(
                        "mark_todo_done",
                        "Mark a todo item as done",
                        id_schema("ID of the todo item"),
                        write_hints(false),
                    ),
                    ToolAction::MarkDone,
                );
                registry.register(
                    tool(
                        "delete_todo",
                        "Delete a todo item",
                        id_schema("ID of the todo item"),
                        write_hints(true),
                    ),
                    ToolAction::Delete,
                );
            }
            Variant::Wish => {
                registry.register(
                    tool(
                        "add_wish",
                        "Add a wish to the Christmas wishlist",
                        text_schema("What is wished for"),
                        write_hints(false),
                    ),
                    ToolAction::Create,
                );
                registry.register(
                    tool(
                        "list_wishes",
                        "List the most recent wishes and their elf shopping items",
                        empty_schema(),
                        read_hints(),
                    ),
                    ToolAction::List,
                );
                registry.register(
                    tool(
                        "grant_wish",
                        "Mark a wish as granted",
                        id_schema("ID of the wish"),
                        write_hints(false),
                    ),
                    ToolAction::MarkDone,
                );
                registry.register(
                    tool(
                        "delete_wish",
                        "Delete a wish or an elf shopping item",
                        id_schema("ID of the wish or elf item"),
                        write_hints(true),
                    ),
                    ToolAction::Delete,
                );
                registry.register(
                    tool(
                        "add_elf_item",
                        "Add an item the elves need to buy to fulfil a wish",
                        json!({
                            "type": "object",
                            "properties": {
                                "wishId": {"type": "string", "description": "ID of the wish"},
                                "name": {"type": "string", "description": "Item to buy"},
                                "price": {"type": "number", "minimum": 0, "description": "Estimated price"}
                            },
                            "required": ["wishId", "name", "price"]
                        }),
                        write_hints(false),
                    ),
                    ToolAction::AddElfItem,
                );
            }
        }
        registry
    }

    /// Register a tool. Re-registering a name replaces it in place.
    pub fn register(&mut self, tool: ToolDefinition, action: ToolAction) {
        match self.tools.iter_mut().find(|(t, _)| t.name == tool.name) {
            Some(slot) => *slot = (tool, action),
            None => self.tools.push((tool, action)),
        }
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.iter().find(|(t, _)| t.name == name).map(|(t, _)| t)
    }

    /// The action behind a tool name.
    pub fn action(&self, name: &str) -> Option<ToolAction> {
        self.tools
            .iter()
            .find(|(t, _)| t.name == name)
            .map(|(_, action)| *action)
    }

    /// Check if a tool exists.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// List all tools in publication order.
    pub fn list(&self) -> Vec<&ToolDefinition> {
        self.tools.iter().map(|(t, _)| t).collect()
    }

    /// Get the number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Get tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|(t, _)| t.name.as_str()).collect()
    }
}

fn tool(name: &str, description: &str, input_schema: Value, hints: ToolAnnotations) -> ToolDefinition {
    ToolDefinition {
        name: name.to_string(),
        description: Some(description.to_string()),
        input_schema,
        annotations: Some(hints),
    }
}

fn text_schema(description: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "text": {"type": "string", "minLength": 1, "description": description}
        },
        "required": ["text"]
    })
}

fn id_schema(description: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "id": {"type": "string", "minLength": 1, "description": description}
        },
        "required": ["id"]
    })
}

fn empty_schema() -> Value {
    json!({"type": "object", "properties": {}})
}

fn read_hints() -> ToolAnnotations {
    ToolAnnotations {
        read_only_hint: Some(true),
        destructive_hint: None,
        idempotent_hint: Some(true),
    }
}

fn write_hints(destructive: bool) -> ToolAnnotations {
    ToolAnnotations {
        read_only_hint: Some(false),
        destructive_hint: Some(destructive),
        idempotent_hint: Some(destructive),
    }
}
