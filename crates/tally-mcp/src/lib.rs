//! # tally-mcp
//!
//! MCP (Model Context Protocol) server for Tally.
//!
//! The server keeps an in-memory mirror of the most recent records in a
//! [`RecordStore`](tally_store::RecordStore) and answers resource, tool and
//! prompt requests from it. Writes go straight to the store; the store's
//! change feed triggers a full refresh of the mirror.
//!
//! ## Architecture
//!
//! ```text
//! AI host (Claude Desktop, IDE, ...)
//!       │
//!       │ JSON-RPC over stdio
//!       ▼
//! ┌──────────────────┐   reads    ┌──────────────┐
//! │  McpServer       │ ─────────▶ │ MirrorCache  │
//! │  └─ Facade       │            └──────▲───────┘
//! └────────┬─────────┘                   │ refresh
//!          │ put / get / del             │
//!          ▼                     ┌───────┴────────┐
//!    RecordStore ──── change ──▶ │ Synchronizer   │
//!                      feed      └────────────────┘
//! ```
//!
//! ## Example Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use tally_core::TallyConfig;
//! use tally_mcp::{Facade, McpServer, MirrorCache, WindowSynchronizer, spawn_listener};
//!
//! let config = TallyConfig::from_file("tally.yaml")?;
//! let store = tally_store::create_store(&config.store).await?;
//! store.ready().await?;
//!
//! let mirror = Arc::new(MirrorCache::new());
//! let sync = Arc::new(WindowSynchronizer::new(store.clone(), mirror.clone(), &config.mirror));
//! sync.refresh().await?;
//! spawn_listener(sync, store.subscribe());
//!
//! let server = McpServer::new(config.mcp, Facade::new(config.variant, store, mirror));
//! server.run_stdio().await?;
//! ```

pub mod error;
pub mod facade;
pub mod mirror;
pub mod prompts;
pub mod protocol;
pub mod resources;
pub mod server;
pub mod sync;
pub mod tools;

// Re-export main types
pub use error::McpError;
pub use facade::Facade;
pub use mirror::{MirrorCache, Snapshot};
pub use prompts::{PromptCatalog, PromptKind};
pub use protocol::{
    CallToolParams, CallToolResponse, JsonRpcRequest, JsonRpcResponse, ToolAnnotations,
    ToolContent, ToolDefinition,
};
pub use server::McpServer;
pub use sync::{Synchronizer, WindowSynchronizer, spawn_listener};
pub use tools::{ToolAction, ToolRegistry};
