//! `tally check` command implementation.
//!
//! Validates the configuration, opens the store, loads the mirror once and
//! lists resources through the server, exactly as `serve` would.

use super::ConfigArgs;
use anyhow::{Context, Result};
use clap::Args;
use serde_json::json;
use std::sync::Arc;
use tally_mcp::{Facade, JsonRpcRequest, McpServer, MirrorCache, Synchronizer, WindowSynchronizer};

/// Arguments for `tally check`.
#[derive(Debug, Args)]
pub struct CheckArgs {
    #[command(flatten)]
    pub config: ConfigArgs,
}

pub async fn run(args: CheckArgs) -> Result<()> {
    println!("🔍 Checking {}", args.config.config.display());

    let config = args.config.load()?;
    config.validate().context("Invalid configuration")?;
    println!(
        "   ✓ Configuration is valid (variant: {}, backend: {:?}, window: {})",
        config.variant.noun(),
        config.store.backend,
        config.mirror.window
    );

    let store = tally_store::create_store(&config.store)
        .await
        .context("Failed to open record store")?;
    store.ready().await.context("Record store is not ready")?;
    println!("   ✓ Record store is reachable");

    let mirror = Arc::new(MirrorCache::new());
    let sync = WindowSynchronizer::new(store.clone(), mirror.clone(), &config.mirror);
    let count = sync.refresh().await.context("Mirror load failed")?;
    println!("   ✓ Mirror loaded {} record(s)", count);

    let server = McpServer::new(config.mcp.clone(), Facade::new(config.variant, store, mirror));
    let response = server
        .handle_request(JsonRpcRequest::new(1, "resources/list", Some(json!({}))))
        .await
        .context("Server gave no response")?;
    if let Some(error) = response.error {
        anyhow::bail!("resources/list failed: {}", error.message);
    }
    let listed = response
        .result
        .as_ref()
        .and_then(|r| r["resources"].as_array())
        .map_or(0, Vec::len);
    println!("   ✓ Server lists {} resource(s)", listed);

    println!("\n✅ All checks passed");
    Ok(())
}
