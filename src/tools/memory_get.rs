//! MCP `memory-get` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `memory-get` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct MemoryGetParams {
    /// UUID of the memory to retrieve.
    #[schemars(description = "UUID of the memory to retrieve")]
    pub id: String,
}
