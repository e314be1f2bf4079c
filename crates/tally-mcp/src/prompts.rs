//! Prompt catalog and rendering.
//!
//! Prompts wrap mirrored records, embedded as resources, in fixed
//! instruction text.

use crate::error::McpError;
use crate::mirror::Snapshot;
use crate::protocol::{GetPromptResult, PromptArgument, PromptDefinition, PromptMessage};
use crate::resources;
use std::collections::HashMap;
use tally_core::{Record, Variant};

/// What a prompt renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    /// Every mirrored primary record.
    Summarize,
    /// One wish and its elf items.
    ShoppingList,
}

/// The prompts published for one variant.
#[derive(Debug, Clone)]
pub struct PromptCatalog {
    variant: Variant,
    prompts: Vec<(PromptDefinition, PromptKind)>,
}

impl PromptCatalog {
    pub fn for_variant(variant: Variant) -> Self {
        let mut prompts = vec![(
            PromptDefinition {
                name: format!("summarize_{}", variant.plural()),
                description: Some(format!("Summarize the current {}", variant.plural())),
                arguments: Vec::new(),
            },
            PromptKind::Summarize,
        )];

        if variant == Variant::Wish {
            prompts.push((
                PromptDefinition {
                    name: "shopping_list".to_string(),
                    description: Some("Draft the elves' shopping list for one wish".to_string()),
                    arguments: vec![PromptArgument {
                        name: "wishId".to_string(),
                        description: Some("ID of the wish".to_string()),
                        required: true,
                    }],
                },
                PromptKind::ShoppingList,
            ));
        }

        Self { variant, prompts }
    }

    pub fn list(&self) -> Vec<&PromptDefinition> {
        self.prompts.iter().map(|(p, _)| p).collect()
    }

    pub fn kind(&self, name: &str) -> Option<PromptKind> {
        self.prompts
            .iter()
            .find(|(p, _)| p.name == name)
            .map(|(_, kind)| *kind)
    }

    /// Render the prompt `name` against `snapshot`.
    pub fn render(
        &self,
        name: &str,
        arguments: &HashMap<String, String>,
        snapshot: &Snapshot,
    ) -> Result<GetPromptResult, McpError> {
        let kind = self.kind(name).ok_or_else(|| McpError::UnknownPrompt {
            name: name.to_string(),
        })?;

        match kind {
            PromptKind::Summarize => Ok(self.summarize(snapshot)),
            PromptKind::ShoppingList => {
                let wish_id = arguments
                    .get("wishId")
                    .map(|s| s.trim())
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| McpError::validation("wishId"))?;
                self.shopping_list(wish_id, snapshot)
            }
        }
    }

    fn summarize(&self, snapshot: &Snapshot) -> GetPromptResult {
        let plural = self.variant.plural();
        let entries: Vec<&Record> = snapshot.iter().filter(|r| r.as_entry().is_some()).collect();

        let mut messages = Vec::with_capacity(entries.len() + 2);
        messages.push(PromptMessage::user_text(format!(
            "Here are my current {plural}:"
        )));
        messages.extend(
            entries
                .iter()
                .map(|r| PromptMessage::user_resource(resources::contents(self.variant, r))),
        );
        messages.push(PromptMessage::user_text(format!(
            "Summarize these {plural}. Group what is done and what is still open, \
             and suggest what to focus on next."
        )));

        GetPromptResult {
            description: Some(format!("Summary of {} {plural}", entries.len())),
            messages,
        }
    }

    fn shopping_list(&self, wish_id: &str, snapshot: &Snapshot) -> Result<GetPromptResult, McpError> {
        let wish = snapshot
            .get(wish_id)
            .filter(|r| r.as_entry().is_some())
            .ok_or_else(|| McpError::not_found(wish_id))?;
        let items: Vec<&Record> = snapshot
            .iter()
            .filter(|r| r.as_elf_item().is_some_and(|item| item.wish_id == wish_id))
            .collect();

        let mut messages = vec![
            PromptMessage::user_text("This is the wish to fulfil:"),
            PromptMessage::user_resource(resources::contents(self.variant, wish)),
        ];
        if !items.is_empty() {
            messages.push(PromptMessage::user_text("The elves have already noted:"));
            messages.extend(
                items
                    .iter()
                    .map(|r| PromptMessage::user_resource(resources::contents(self.variant, r))),
            );
        }
        messages.push(PromptMessage::user_text(
            "Write a complete shopping list for the elves, with an estimated price per item \
             and a total.",
        ));

        Ok(GetPromptResult {
            description: Some(format!("Shopping list for wish {wish_id}")),
            messages,
        })
    }
}
