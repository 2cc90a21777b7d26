//! MCP `memory-update` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::memory::types::StoreMetadata;

/// Parameters for the `memory-update` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct MemoryUpdateParams {
    /// UUID of the memory to update.
    #[schemars(description = "UUID of the memory to update")]
    pub id: String,

    /// Replacement content. Stored as-is unless `reindex` is set.
    #[schemars(
        description = "Replacement content. Combine with reindex=true to regenerate embeddings."
    )]
    pub content: Option<String>,

    /// Metadata fields merged over the existing payload.
    #[schemars(description = "Metadata fields merged over the existing payload")]
    pub metadata: Option<StoreMetadata>,

    /// Regenerate embeddings for the new content. Defaults to `false`.
    #[schemars(
        description = "Regenerate embeddings for the new content. Defaults to false."
    )]
    pub reindex: Option<bool>,
}
