//! `tally serve` command implementation.

use super::ConfigArgs;
use anyhow::{Context, Result};
use clap::Args;
use std::sync::Arc;
use tally_core::{RefreshStrategy, StoreBackend, TallyConfig};
use tally_mcp::{Facade, McpServer, MirrorCache, Synchronizer, WindowSynchronizer, spawn_listener};
use tracing::info;

/// Arguments for `tally serve`.
#[derive(Debug, Args)]
pub struct ServeArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Store backend (memory, file or postgres). Overrides config file.
    #[arg(long)]
    pub backend: Option<String>,

    /// Number of most recent records kept in the mirror. Overrides config file.
    #[arg(long)]
    pub window: Option<usize>,

    /// Refresh strategy (swap or clear_first). Overrides config file.
    #[arg(long)]
    pub strategy: Option<String>,
}

pub async fn run(args: ServeArgs) -> Result<()> {
    let mut config = args.config.load()?;
    apply_overrides(&mut config, &args)?;
    config.validate().context("Invalid configuration")?;

    let store = tally_store::create_store(&config.store)
        .await
        .context("Failed to open record store")?;
    store.ready().await.context("Record store is not ready")?;

    // Subscribe before the first load so no write falls between the two.
    let feed = store.subscribe();
    let mirror = Arc::new(MirrorCache::new());
    let sync = Arc::new(WindowSynchronizer::new(
        store.clone(),
        mirror.clone(),
        &config.mirror,
    ));
    let count = sync.refresh().await.context("Initial mirror load failed")?;
    info!(
        records = count,
        window = config.mirror.window,
        strategy = ?config.mirror.strategy,
        backend = ?config.store.backend,
        "Mirror loaded"
    );
    let listener = spawn_listener(sync, feed);

    let server = McpServer::new(config.mcp.clone(), Facade::new(config.variant, store, mirror));
    tokio::select! {
        result = server.run_stdio() => result.context("MCP server failed")?,
        _ = tokio::signal::ctrl_c() => info!("Interrupted, shutting down"),
    }

    listener.abort();
    Ok(())
}

fn apply_overrides(config: &mut TallyConfig, args: &ServeArgs) -> Result<()> {
    if let Some(backend) = &args.backend {
        config.store.backend = StoreBackend::parse(backend)?;
    }
    if let Some(window) = args.window {
        config.mirror.window = window;
    }
    if let Some(strategy) = &args.strategy {
        config.mirror.strategy = RefreshStrategy::parse(strategy)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn args(backend: Option<&str>, window: Option<usize>, strategy: Option<&str>) -> ServeArgs {
        ServeArgs {
            config: ConfigArgs {
                config: PathBuf::from("tally.yaml"),
                variant: None,
            },
            backend: backend.map(String::from),
            window,
            strategy: strategy.map(String::from),
        }
    }

    #[test]
    fn overrides_replace_file_values() {
        let mut config = TallyConfig::default();
        apply_overrides(&mut config, &args(Some("file"), Some(3), Some("clear_first"))).unwrap();

        assert_eq!(config.store.backend, StoreBackend::File);
        assert_eq!(config.mirror.window, 3);
        assert_eq!(config.mirror.strategy, RefreshStrategy::ClearFirst);
    }

    #[test]
    fn bad_override_is_an_error() {
        let mut config = TallyConfig::default();
        assert!(apply_overrides(&mut config, &args(Some("couchdb"), None, None)).is_err());
    }

    #[test]
    fn zero_window_fails_validation() {
        let mut config = TallyConfig::default();
        apply_overrides(&mut config, &args(None, Some(0), None)).unwrap();
        assert!(config.validate().is_err());
    }
}
