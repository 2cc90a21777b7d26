//! Deletion — single points and batches.

use serde_json::json;
use std::time::Instant;

use super::{parse_point_id, AppState};
use crate::response::{failure, ToolResponse};

/// Delete one memory. Deleting an id that is already gone is a no-op, not an
/// error.
pub async fn delete_memory(state: &AppState, id: &str) -> ToolResponse {
    let started = Instant::now();

    if let Err(violation) = parse_point_id(id) {
        return ToolResponse::validation(violation, None).with_duration(started);
    }

    let exists = match state.store.get(id).await {
        Ok(hit) => hit.is_some(),
        Err(err) => return failure("lookup failed", &err).with_duration(started),
    };
    if !exists {
        return ToolResponse::success(
            format!("Memory {id} was already absent"),
            json!({"id": id, "deleted": false}),
        )
        .with_duration(started);
    }

    match state.store.delete(id).await {
        Ok(()) => {
            tracing::info!(id = %id, "memory deleted");
            ToolResponse::success(
                format!("Memory {id} deleted"),
                json!({"id": id, "deleted": true}),
            )
            .with_duration(started)
        }
        Err(err) => failure("delete failed", &err).with_duration(started),
    }
}

/// Delete up to 100 memories by id in one call. Ids are validated up front;
/// there is no per-id existence check.
pub async fn batch_delete_memories(state: &AppState, ids: Vec<String>) -> ToolResponse {
    let started = Instant::now();

    if ids.is_empty() || ids.len() > 100 {
        return ToolResponse::validation(
            format!("ids must contain 1-100 entries, got {}", ids.len()),
            None,
        )
        .with_duration(started);
    }
    for id in &ids {
        if let Err(violation) = parse_point_id(id) {
            return ToolResponse::validation(violation, None).with_duration(started);
        }
    }

    match state.store.delete_batch(&ids).await {
        Ok(()) => {
            tracing::info!(count = ids.len(), "batch delete completed");
            ToolResponse::success(
                format!("Deleted {} memories", ids.len()),
                json!({"deleted_count": ids.len(), "ids": ids}),
            )
            .with_duration(started)
        }
        Err(err) => failure("batch delete failed", &err).with_duration(started),
    }
}
