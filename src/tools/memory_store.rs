//! MCP `memory-store` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::memory::types::StoreMetadata;

/// Parameters for the `memory-store` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct MemoryStoreParams {
    /// The text to remember (1-100000 characters).
    #[schemars(description = "The text to remember (1-100000 characters)")]
    pub content: String,

    /// Optional metadata: workspace, memory_type, confidence, tags,
    /// expires_at, plus arbitrary extra fields.
    #[schemars(
        description = "Optional metadata: workspace, memory_type ('long-term', 'episodic', 'short-term'), confidence, tags, expires_at, plus arbitrary extra fields stored verbatim"
    )]
    pub metadata: Option<StoreMetadata>,

    /// Split content longer than the chunk size into overlapping chunks.
    /// Defaults to `true`.
    #[schemars(
        description = "Split long content into overlapping chunks sharing a group id. Defaults to true."
    )]
    pub auto_chunk: Option<bool>,
}
