//! Tools introspection command.
//!
//! `tally tools` prints what the server publishes for the configured variant,
//! without opening the store.

use super::ConfigArgs;
use anyhow::Result;
use clap::Args;
use tally_mcp::{PromptCatalog, ToolRegistry};

/// Arguments for `tally tools`.
#[derive(Debug, Args)]
pub struct ToolsArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Show input schemas.
    #[arg(long)]
    pub verbose: bool,
}

pub fn run(args: ToolsArgs) -> Result<()> {
    let config = args.config.load()?;
    let variant = config.variant;
    let tools = ToolRegistry::for_variant(variant);
    let prompts = PromptCatalog::for_variant(variant);

    println!("\n📋 Variant: {} ({}:///<id>)", variant.noun(), variant.scheme());

    println!("\n🔧 Tools ({}):", tools.len());
    for tool in tools.list() {
        let read_only = tool
            .annotations
            .as_ref()
            .is_some_and(|a| a.read_only_hint == Some(true));
        let destructive = tool
            .annotations
            .as_ref()
            .is_some_and(|a| a.destructive_hint == Some(true));

        let mut badges = vec![if read_only { "read" } else { "write" }];
        if destructive {
            badges.push("destructive");
        }

        println!("   • {} ({})", tool.name, badges.join(", "));
        if let Some(desc) = &tool.description {
            println!("     {}", desc);
        }
        if args.verbose {
            println!(
                "     Schema: {}",
                serde_json::to_string_pretty(&tool.input_schema)?
            );
        }
    }

    let prompts = prompts.list();
    println!("\n💬 Prompts ({}):", prompts.len());
    for prompt in prompts {
        let arguments: Vec<String> = prompt
            .arguments
            .iter()
            .map(|a| {
                if a.required {
                    a.name.clone()
                } else {
                    format!("{}?", a.name)
                }
            })
            .collect();
        println!("   • {}({})", prompt.name, arguments.join(", "));
        if let Some(desc) = &prompt.description {
            println!("     {}", desc);
        }
    }
    println!();

    Ok(())
}
