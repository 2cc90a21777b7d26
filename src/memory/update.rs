//! Mutation path — payload merges and optional re-embedding.

use serde_json::{json, Map, Value};
use std::time::Instant;

use super::types::{MemoryPayload, StoreMetadata};
use super::{parse_point_id, AppState, MAX_CONTENT_CHARS};
use crate::index::UpsertPoint;
use crate::response::{failure, ToolResponse};
use crate::scanner::Decision;

/// Update a memory's content and/or metadata.
///
/// Chunk members cannot be updated individually; the caller is told to delete
/// the group and re-store. With `reindex`, new content regenerates both
/// vectors and overwrites the point in place (same id, merged payload).
pub async fn update_memory(
    state: &AppState,
    id: &str,
    content: Option<String>,
    metadata: Option<StoreMetadata>,
    reindex: bool,
) -> ToolResponse {
    let started = Instant::now();

    if let Err(violation) = parse_point_id(id) {
        return ToolResponse::validation(violation, None).with_duration(started);
    }

    if let Some(content) = &content {
        if content.is_empty() {
            return ToolResponse::validation("content must not be empty", None)
                .with_duration(started);
        }
        if content.chars().count() > MAX_CONTENT_CHARS {
            return ToolResponse::validation(
                format!("content exceeds {MAX_CONTENT_CHARS} characters"),
                None,
            )
            .with_duration(started);
        }
        let report = state.scanner.scan(content);
        if let Decision::Block { reason } = &report.decision {
            return ToolResponse::validation(
                format!("Content blocked by secret scanner: {reason}"),
                None,
            )
            .with_metadata("error_code", json!("SECRETS_DETECTED"))
            .with_metadata("detections", json!(report.detections))
            .with_duration(started);
        }
    }

    let metadata = metadata.unwrap_or_default();
    if let Err(violation) = metadata.validate() {
        return ToolResponse::validation(violation, None).with_duration(started);
    }

    let existing = match state.store.get(id).await {
        Ok(Some(hit)) => hit,
        Ok(None) => return ToolResponse::not_found(format!("Memory {id}")).with_duration(started),
        Err(err) => return failure("lookup failed", &err).with_duration(started),
    };

    let parsed = MemoryPayload::from_map(existing.payload.clone());
    if parsed.is_chunk() {
        return ToolResponse::validation(
            "This memory is one chunk of a chunked document and cannot be updated \
             individually. Delete the chunk group and store the document again.",
            None,
        )
        .with_metadata(
            "chunk_group_id",
            json!(parsed.chunk_group_id),
        )
        .with_duration(started);
    }

    let mut changes = metadata.into_payload();

    let result = match (content, reindex) {
        (Some(new_content), true) => {
            reindex_point(state, id, &new_content, existing.payload, changes).await
        }
        (maybe_content, _) => {
            if let Some(new_content) = maybe_content {
                changes.insert("content".into(), Value::String(new_content));
            }
            state
                .store
                .update_payload(id, changes)
                .await
                .map(|()| json!({"id": id, "reindexed": false}))
        }
    };

    match result {
        Ok(data) => ToolResponse::success("Memory updated", data).with_duration(started),
        Err(err) => failure("update failed", &err).with_duration(started),
    }
}

/// Regenerate both vectors for new content and overwrite the point in place.
/// Idempotent per id: the merged payload replaces the old one, no delete.
async fn reindex_point(
    state: &AppState,
    id: &str,
    content: &str,
    existing: Map<String, Value>,
    changes: Map<String, Value>,
) -> anyhow::Result<Value> {
    let embedding = state.engine.generate(content).await?;

    let mut payload = existing;
    for (key, value) in changes {
        payload.insert(key, value);
    }
    payload.remove("content");

    state
        .store
        .upsert(UpsertPoint {
            id: Some(id.to_string()),
            content: content.to_string(),
            dense_small: embedding.small,
            dense_large: embedding.large,
            payload,
        })
        .await?;

    tracing::info!(id = %id, "memory re-embedded");
    Ok(json!({"id": id, "reindexed": true}))
}
