//! MCP `memory-list` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::index::SearchFilters;

/// Parameters for the `memory-list` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct MemoryListParams {
    /// Payload filters: workspace, memory_type, min_confidence, tags, metadata.
    #[schemars(
        description = "Payload filters: workspace, memory_type, min_confidence, tags, metadata equalities"
    )]
    pub filter: Option<SearchFilters>,

    /// Maximum rows (1-1000). Defaults to 100.
    #[schemars(description = "Maximum number of rows (1-1000). Defaults to 100.")]
    pub limit: Option<usize>,

    /// Rows to skip for pagination. Defaults to 0.
    #[schemars(description = "Rows to skip for pagination. Defaults to 0.")]
    pub offset: Option<usize>,

    /// Sort field: `created_at` (default), `updated_at`, `access_count`, or
    /// `confidence`.
    #[schemars(
        description = "Sort field: 'created_at' (default), 'updated_at', 'access_count', or 'confidence'"
    )]
    pub sort_by: Option<String>,

    /// `asc` or `desc`. Defaults to `desc`.
    #[schemars(description = "Sort order: 'asc' or 'desc'. Defaults to 'desc'.")]
    pub sort_order: Option<String>,
}
