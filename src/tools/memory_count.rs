//! MCP `memory-count` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::index::SearchFilters;

/// Parameters for the `memory-count` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct MemoryCountParams {
    /// Payload filters: workspace, memory_type, min_confidence, tags, metadata.
    #[schemars(
        description = "Payload filters: workspace, memory_type, min_confidence, tags, metadata equalities"
    )]
    pub filter: Option<SearchFilters>,
}
