//! MCP `memory-delete` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `memory-delete` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct MemoryDeleteParams {
    /// UUID of the memory to delete.
    #[schemars(description = "UUID of the memory to delete")]
    pub id: String,
}
