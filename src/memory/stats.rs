//! Statistics — collection status, per-type counts, and embedding usage.

use serde_json::json;
use std::time::Instant;

use super::types::MemoryType;
use super::AppState;
use crate::index::SearchFilters;
use crate::response::{failure, ToolResponse};
use crate::workspace::validate_workspace;

/// Collection health plus memory-type breakdown and optional embedding usage.
pub async fn memory_status(
    state: &AppState,
    workspace: Option<String>,
    include_embedding_stats: bool,
) -> ToolResponse {
    let started = Instant::now();

    if let Some(name) = &workspace {
        if let Err(violation) = validate_workspace(name) {
            return ToolResponse::validation(violation, None).with_duration(started);
        }
    }

    let index_stats = match state.store.stats().await {
        Ok(stats) => stats,
        Err(err) => return failure("failed to read collection stats", &err).with_duration(started),
    };

    let mut by_type = serde_json::Map::new();
    for memory_type in MemoryType::ALL {
        let filter = SearchFilters {
            memory_type: Some(memory_type),
            workspace: workspace.clone().map(|w| w.to_lowercase()),
            ..Default::default()
        };
        match state.store.count(&filter).await {
            Ok(count) => {
                by_type.insert(memory_type.as_str().to_string(), json!(count));
            }
            Err(err) => return failure("failed to count memories", &err).with_duration(started),
        }
    }

    let workspace_count = match &workspace {
        Some(name) => {
            let filter = SearchFilters {
                workspace: Some(name.to_lowercase()),
                ..Default::default()
            };
            match state.store.count(&filter).await {
                Ok(count) => Some(count),
                Err(err) => {
                    return failure("failed to count workspace", &err).with_duration(started)
                }
            }
        }
        None => None,
    };

    let mut data = json!({
        "collection": index_stats,
        "counts_by_type": by_type,
    });
    if let Some(count) = workspace_count {
        data["workspace"] = json!({
            "name": workspace.as_deref().map(|w| w.to_lowercase()),
            "count": count,
        });
    }
    if include_embedding_stats {
        data["embedding"] = json!(state.engine.stats());
    }

    ToolResponse::success("Memory store status", data).with_duration(started)
}

/// Approximate count of memories matching the filter.
pub async fn count_memories(state: &AppState, filter: SearchFilters) -> ToolResponse {
    let started = Instant::now();
    match state.store.count(&filter).await {
        Ok(count) => ToolResponse::success(
            format!("{count} memories match"),
            json!({"count": count}),
        )
        .with_duration(started),
        Err(err) => failure("count failed", &err).with_duration(started),
    }
}
