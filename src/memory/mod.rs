//! Memory engine — the tool operations over scanner, workspace resolver,
//! embedding engine, and vector store.
//!
//! Write path in [`store`], read paths in [`search`], mutation in [`update`],
//! deletion in [`forget`], statistics in [`stats`]. Type definitions live in
//! [`types`].

pub mod forget;
pub mod search;
pub mod stats;
pub mod store;
pub mod types;
pub mod update;

use crate::config::MnemoConfig;
use crate::embedding::EmbeddingEngine;
use crate::index::VectorStore;
use crate::scanner::SecretScanner;
use crate::workspace::WorkspaceResolver;

/// Shared collaborators, constructed once in `main` and passed by reference
/// to every handler.
pub struct AppState {
    pub config: MnemoConfig,
    pub scanner: SecretScanner,
    pub workspace: WorkspaceResolver,
    pub engine: EmbeddingEngine,
    pub store: VectorStore,
}

impl AppState {
    pub fn new(config: MnemoConfig) -> anyhow::Result<Self> {
        let scanner = SecretScanner::new(config.scanner.medium_block_threshold)?;
        let workspace = WorkspaceResolver::new(
            config.workspace.auto_detect,
            config.workspace.default_workspace.clone(),
            std::time::Duration::from_millis(config.workspace.cache_ttl_ms),
        );
        let engine = EmbeddingEngine::from_config(&config)?;
        let (small_dims, large_dims) = config.vector_dims();
        let store = VectorStore::new(&config.qdrant, small_dims, large_dims)?;
        Ok(Self {
            config,
            scanner,
            workspace,
            engine,
            store,
        })
    }
}

/// Maximum content length accepted by store/update, in characters.
pub const MAX_CONTENT_CHARS: usize = 100_000;

/// Validate a point id as a UUID.
pub fn parse_point_id(id: &str) -> Result<uuid::Uuid, String> {
    uuid::Uuid::parse_str(id).map_err(|_| format!("'{id}' is not a valid UUID"))
}
