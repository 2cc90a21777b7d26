//! MCP `memory-query` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::index::SearchFilters;

/// Parameters for the `memory-query` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct MemoryQueryParams {
    /// Natural language query (1-10000 characters).
    #[schemars(description = "Natural language query to search memories (1-10000 characters)")]
    pub query: String,

    /// Payload filters: workspace, memory_type, min_confidence, tags, metadata.
    #[schemars(
        description = "Payload filters: workspace, memory_type, min_confidence, tags, metadata equalities"
    )]
    pub filter: Option<SearchFilters>,

    /// Maximum results (1-100). Defaults to 10.
    #[schemars(description = "Maximum number of results (1-100). Defaults to 10.")]
    pub limit: Option<usize>,

    /// Results to skip for pagination. Defaults to 0.
    #[schemars(description = "Results to skip for pagination. Defaults to 0.")]
    pub offset: Option<usize>,

    /// Minimum cosine score in `[0, 1]` for returned results.
    #[schemars(description = "Minimum similarity score 0.0-1.0")]
    pub score_threshold: Option<f64>,

    /// HNSW search beam width (64-512); higher trades latency for recall.
    #[schemars(description = "HNSW ef parameter (64-512); higher improves recall at some latency cost")]
    pub hnsw_ef: Option<u64>,

    /// Fuse dense results with full-text matches via Reciprocal Rank Fusion.
    #[schemars(
        description = "Fuse semantic results with full-text matches (Reciprocal Rank Fusion). Defaults to false."
    )]
    pub use_hybrid_search: Option<bool>,

    /// Dense/text weighting in `[0, 1]`. Accepted for compatibility; RRF
    /// currently weighs both sources equally.
    #[schemars(
        description = "Dense/text weighting 0.0-1.0. Accepted for compatibility; currently unused."
    )]
    pub hybrid_alpha: Option<f64>,
}
