//! # tally-core
//!
//! Types shared across the Tally crates:
//!
//! - [`config`]: the `tally.yaml` configuration (variant, store backend,
//!   mirror window, MCP server details).
//! - [`record`]: the record model decoded from store documents. A record is
//!   either a primary entry (a todo or a wish) or an elf shopping item attached
//!   to a wish.

// Configuration types shared across all Tally crates
pub mod config;
pub mod record;

pub use config::{
    ConfigError, McpConfig, MirrorConfig, RefreshStrategy, StoreBackend, StoreConfig, TallyConfig,
    Variant,
};
pub use record::{ElfItem, Entry, Record, RecordError, RecordKind, now_millis};
