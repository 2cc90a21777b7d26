//! MCP `memory-batch-delete` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `memory-batch-delete` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct MemoryBatchDeleteParams {
    /// UUIDs of the memories to delete (1-100).
    #[schemars(description = "UUIDs of the memories to delete (1-100 ids)")]
    pub ids: Vec<String>,
}
