pub mod memory_batch_delete;
pub mod memory_count;
pub mod memory_delete;
pub mod memory_get;
pub mod memory_list;
pub mod memory_query;
pub mod memory_status;
pub mod memory_store;
pub mod memory_update;

use memory_batch_delete::MemoryBatchDeleteParams;
use memory_count::MemoryCountParams;
use memory_delete::MemoryDeleteParams;
use memory_get::MemoryGetParams;
use memory_list::MemoryListParams;
use memory_query::MemoryQueryParams;
use memory_status::MemoryStatusParams;
use memory_store::MemoryStoreParams;
use memory_update::MemoryUpdateParams;
use rmcp::handler::server::tool::Parameters;
use rmcp::handler::server::tool::ToolRouter;
use rmcp::{tool, tool_handler, tool_router, ServerHandler};
use std::future::Future;
use std::sync::Arc;

use crate::memory::search::{ListOptions, QueryOptions, SortField, SortOrder};
use crate::memory::AppState;
use crate::response::ToolResponse;

/// The mnemo MCP tool handler. Holds the shared state and exposes all nine
/// memory tools via the `#[tool_router]` macro.
#[derive(Clone)]
pub struct MnemoTools {
    tool_router: ToolRouter<Self>,
    state: Arc<AppState>,
}

#[tool_router]
impl MnemoTools {
    pub fn new(state: Arc<AppState>) -> Self {
        Self {
            tool_router: Self::tool_router(),
            state,
        }
    }

    /// Store a new memory with optional metadata and auto-chunking.
    #[tool(
        name = "memory-store",
        description = "Store a memory. Content is secret-scanned, tagged with a workspace, embedded, and indexed. Long content is split into overlapping chunks."
    )]
    async fn memory_store(
        &self,
        Parameters(params): Parameters<MemoryStoreParams>,
    ) -> Result<String, String> {
        tracing::info!(content_len = params.content.len(), "memory-store called");
        crate::memory::store::store_memory(
            &self.state,
            params.content,
            params.metadata,
            params.auto_chunk.unwrap_or(true),
        )
        .await
        .into_tool_result()
    }

    /// Search memories by natural-language query.
    #[tool(
        name = "memory-query",
        description = "Search memories by natural language. Dense semantic search by default; set use_hybrid_search to fuse with full-text matches."
    )]
    async fn memory_query(
        &self,
        Parameters(params): Parameters<MemoryQueryParams>,
    ) -> Result<String, String> {
        tracing::info!(query_len = params.query.len(), "memory-query called");
        let options = QueryOptions {
            filter: params.filter.unwrap_or_default(),
            limit: params.limit.unwrap_or(10),
            offset: params.offset.unwrap_or(0),
            score_threshold: params.score_threshold,
            hnsw_ef: params.hnsw_ef,
            use_hybrid_search: params.use_hybrid_search.unwrap_or(false),
            hybrid_alpha: params.hybrid_alpha,
        };
        crate::memory::search::query_memories(&self.state, params.query, options)
            .await
            .into_tool_result()
    }

    /// List memories with filtering and sorting.
    #[tool(
        name = "memory-list",
        description = "List memories matching a filter, sorted by created_at, updated_at, access_count, or confidence. Content is truncated to a preview."
    )]
    async fn memory_list(
        &self,
        Parameters(params): Parameters<MemoryListParams>,
    ) -> Result<String, String> {
        let sort_by = match params.sort_by.as_deref().unwrap_or("created_at").parse::<SortField>()
        {
            Ok(field) => field,
            Err(violation) => {
                return ToolResponse::validation(violation, None).into_tool_result()
            }
        };
        let sort_order = match params.sort_order.as_deref().unwrap_or("desc").parse::<SortOrder>()
        {
            Ok(order) => order,
            Err(violation) => {
                return ToolResponse::validation(violation, None).into_tool_result()
            }
        };
        let options = ListOptions {
            filter: params.filter.unwrap_or_default(),
            limit: params.limit.unwrap_or(100),
            offset: params.offset.unwrap_or(0),
            sort_by,
            sort_order,
        };
        crate::memory::search::list_memories(&self.state, options)
            .await
            .into_tool_result()
    }

    /// Retrieve a single memory by id.
    #[tool(
        name = "memory-get",
        description = "Retrieve one memory by UUID, including full content and metadata."
    )]
    async fn memory_get(
        &self,
        Parameters(params): Parameters<MemoryGetParams>,
    ) -> Result<String, String> {
        crate::memory::search::get_memory(&self.state, &params.id)
            .await
            .into_tool_result()
    }

    /// Update a memory's content and/or metadata.
    #[tool(
        name = "memory-update",
        description = "Update a memory's content or metadata. Set reindex=true with new content to regenerate embeddings. Chunk members cannot be updated individually."
    )]
    async fn memory_update(
        &self,
        Parameters(params): Parameters<MemoryUpdateParams>,
    ) -> Result<String, String> {
        crate::memory::update::update_memory(
            &self.state,
            &params.id,
            params.content,
            params.metadata,
            params.reindex.unwrap_or(false),
        )
        .await
        .into_tool_result()
    }

    /// Delete one memory by id.
    #[tool(
        name = "memory-delete",
        description = "Delete one memory by UUID. Deleting an absent id is a no-op."
    )]
    async fn memory_delete(
        &self,
        Parameters(params): Parameters<MemoryDeleteParams>,
    ) -> Result<String, String> {
        crate::memory::forget::delete_memory(&self.state, &params.id)
            .await
            .into_tool_result()
    }

    /// Delete up to 100 memories in one call.
    #[tool(
        name = "memory-batch-delete",
        description = "Delete up to 100 memories by UUID in one call."
    )]
    async fn memory_batch_delete(
        &self,
        Parameters(params): Parameters<MemoryBatchDeleteParams>,
    ) -> Result<String, String> {
        crate::memory::forget::batch_delete_memories(&self.state, params.ids)
            .await
            .into_tool_result()
    }

    /// Report collection health and usage statistics.
    #[tool(
        name = "memory-status",
        description = "Collection health, counts by memory type, optional per-workspace count, and embedding usage statistics."
    )]
    async fn memory_status(
        &self,
        Parameters(params): Parameters<MemoryStatusParams>,
    ) -> Result<String, String> {
        crate::memory::stats::memory_status(
            &self.state,
            params.workspace,
            params.include_embedding_stats.unwrap_or(true),
        )
        .await
        .into_tool_result()
    }

    /// Count memories matching a filter.
    #[tool(
        name = "memory-count",
        description = "Approximate count of memories matching a filter."
    )]
    async fn memory_count(
        &self,
        Parameters(params): Parameters<MemoryCountParams>,
    ) -> Result<String, String> {
        crate::memory::stats::count_memories(&self.state, params.filter.unwrap_or_default())
            .await
            .into_tool_result()
    }
}

#[tool_handler]
impl ServerHandler for MnemoTools {
    fn get_info(&self) -> rmcp::model::ServerInfo {
        rmcp::model::ServerInfo {
            instructions: Some(
                "mnemo is a persistent semantic memory server. Use memory-store to save \
                 knowledge, memory-query to search it by meaning, and memory-list / \
                 memory-get to browse. Memories expire based on their type unless \
                 long-term."
                    .into(),
            ),
            capabilities: rmcp::model::ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }
}
