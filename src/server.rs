//! MCP server initialization for the stdio transport.
//!
//! Wires the scanner, workspace resolver, embedding engine, and vector store
//! into the tool handler and runs it over stdin/stdout. Collection schema
//! validation happens before the server accepts traffic; a mismatch refuses
//! startup.

use anyhow::Result;
use rmcp::ServiceExt;
use std::sync::Arc;

use crate::config::MnemoConfig;
use crate::memory::AppState;
use crate::tools::MnemoTools;

/// Start the MCP server over stdio transport.
pub async fn serve_stdio(config: MnemoConfig) -> Result<()> {
    tracing::info!("starting mnemo MCP server on stdio");

    let provider = config.provider_kind();
    let (small_dims, large_dims) = config.vector_dims();
    let state = AppState::new(config)?;

    // Create-or-validate the collection up front. A schema mismatch is fatal;
    // the server must not serve traffic against mismatched vector spaces.
    state.store.ensure_ready().await?;
    tracing::info!(
        provider = ?provider,
        dense = small_dims,
        dense_large = large_dims,
        "vector collection ready"
    );

    let tools = MnemoTools::new(Arc::new(state));
    let transport = rmcp::transport::stdio();

    let server = tools.serve(transport).await?;
    tracing::info!("MCP server running — waiting for client");

    server.waiting().await?;
    tracing::info!("MCP server shut down");

    Ok(())
}
