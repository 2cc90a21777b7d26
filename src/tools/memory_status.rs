//! MCP `memory-status` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `memory-status` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct MemoryStatusParams {
    /// Workspace to break counts down for.
    #[schemars(description = "Workspace to report a per-workspace count for")]
    pub workspace: Option<String>,

    /// Include embedding cache/token/cost statistics. Defaults to `true`.
    #[schemars(
        description = "Include embedding cache, token, and cost statistics. Defaults to true."
    )]
    pub include_embedding_stats: Option<bool>,
}
