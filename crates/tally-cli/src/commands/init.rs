//! `tally init` command implementation.
//!
//! Writes a starter `tally.yaml` built from the default configuration.

use anyhow::{Context, Result};
use clap::Args;
use std::fs;
use std::path::{Path, PathBuf};
use tally_core::{StoreBackend, TallyConfig, Variant};

const HEADER: &str = "\
# Tally configuration.
#
# variant:          todo | wish
# store.backend:    memory | file | postgres (postgres needs url or url_env)
# mirror.strategy:  swap | clear_first
";

/// Arguments for `tally init`.
#[derive(Debug, Args)]
pub struct InitArgs {
    /// Directory to write tally.yaml into.
    #[arg(long, default_value = ".")]
    pub dir: PathBuf,

    /// Record variant (todo or wish).
    #[arg(long, default_value = "todo")]
    pub variant: String,

    /// Store backend (memory, file or postgres).
    #[arg(long, default_value = "file")]
    pub backend: String,

    /// Overwrite an existing tally.yaml.
    #[arg(long, default_value_t = false)]
    pub force: bool,
}

pub fn run(args: InitArgs) -> Result<()> {
    let path = write_config(&args)?;
    println!("✅ Wrote {}", path.display());
    println!("   Run `tally check -c {}` to verify it.", path.display());
    Ok(())
}

fn write_config(args: &InitArgs) -> Result<PathBuf> {
    let path = args.dir.join("tally.yaml");
    if path.exists() && !args.force {
        anyhow::bail!(
            "'{}' already exists. Use --force to overwrite.",
            path.display()
        );
    }

    let mut config = TallyConfig::default();
    config.variant = Variant::parse(&args.variant)?;
    config.store.backend = StoreBackend::parse(&args.backend)?;
    match config.store.backend {
        StoreBackend::File => config.store.path = Some(config.store.file_path()),
        StoreBackend::Postgres => config.store.url_env = Some("TALLY_DATABASE_URL".to_string()),
        StoreBackend::Memory => {}
    }

    let content = format!("{HEADER}{}", config.to_yaml()?);
    create_dir(&args.dir)?;
    fs::write(&path, content).with_context(|| format!("Failed to write {:?}", path))?;
    Ok(path)
}

fn create_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create directory {:?}", dir))
}
