//! Write path — admission control, workspace tagging, expiry derivation,
//! chunking, embedding, and upsert.

use serde_json::{json, Map, Value};
use std::time::Instant;
use uuid::Uuid;

use super::types::{MemoryType, StoreMetadata};
use super::{AppState, MAX_CONTENT_CHARS};
use crate::index::UpsertPoint;
use crate::response::{failure, ToolResponse};
use crate::scanner::{Decision, ScanReport};
use crate::workspace::{validate_workspace, WorkspaceArg};

/// Store one memory, chunking long content into a group of points.
pub async fn store_memory(
    state: &AppState,
    content: String,
    metadata: Option<StoreMetadata>,
    auto_chunk: bool,
) -> ToolResponse {
    let started = Instant::now();

    if content.is_empty() {
        return ToolResponse::validation("content must not be empty", None)
            .with_duration(started);
    }
    let content_chars = content.chars().count();
    if content_chars > MAX_CONTENT_CHARS {
        return ToolResponse::validation(
            format!("content exceeds {MAX_CONTENT_CHARS} characters ({content_chars})"),
            Some(json!({"field": "content", "length": content_chars})),
        )
        .with_duration(started);
    }

    let metadata = metadata.unwrap_or_default();
    if let Err(violation) = metadata.validate() {
        return ToolResponse::validation(violation, None).with_duration(started);
    }

    // Admission control before anything touches the index.
    let report = state.scanner.scan(&content);
    match &report.decision {
        Decision::Block { reason } => {
            return secrets_blocked_response(reason, &report).with_duration(started);
        }
        Decision::Warn => {
            tracing::warn!(
                detections = report.detections.len(),
                "storing content with potential sensitive data"
            );
        }
        Decision::Admit => {}
    }

    // Workspace: explicit names validate; otherwise run the detection chain.
    let workspace = match &metadata.workspace {
        Some(name) => match validate_workspace(name) {
            Ok(()) => Some(name.to_lowercase()),
            Err(violation) => {
                return ToolResponse::validation(violation, None).with_duration(started)
            }
        },
        None => match state.workspace.resolve(WorkspaceArg::Unspecified) {
            Ok(resolution) => {
                if let Some(ws) = &resolution.workspace {
                    tracing::debug!(workspace = %ws, source = ?resolution.source, "workspace resolved");
                }
                resolution.workspace
            }
            Err(err) => return failure("workspace resolution failed", &err).with_duration(started),
        },
    };

    let memory_type = metadata.memory_type.unwrap_or(MemoryType::LongTerm);
    let expires_at = metadata
        .expires_at
        .clone()
        .or_else(|| memory_type.default_expiry(chrono::Utc::now()).map(|t| t.to_rfc3339()));

    let mut payload = metadata.into_payload();
    payload.insert("memory_type".into(), json!(memory_type.as_str()));
    if let Some(ws) = &workspace {
        payload.insert("workspace".into(), json!(ws));
    } else {
        payload.remove("workspace");
    }
    match &expires_at {
        Some(instant) => {
            payload.insert("expires_at".into(), json!(instant));
        }
        None => {
            payload.remove("expires_at");
        }
    }

    let warned = !report.detections.is_empty();
    let chunk_threshold = state.config.chunking.chunk_size;
    let response = if auto_chunk && content_chars > chunk_threshold {
        store_chunked(state, &content, payload).await
    } else {
        store_single(state, &content, payload).await
    };

    match response {
        Ok(mut response) => {
            if warned {
                response = response.with_metadata(
                    "secret_warning",
                    json!({
                        "detections": report.detections,
                        "note": "content stored; review for sensitive data",
                    }),
                );
            }
            response.with_duration(started)
        }
        Err(err) => failure("failed to store memory", &err).with_duration(started),
    }
}

/// Single-point path: dual embeddings, one upsert.
async fn store_single(
    state: &AppState,
    content: &str,
    payload: Map<String, Value>,
) -> anyhow::Result<ToolResponse> {
    let embedding = state.engine.generate(content).await?;
    let id = state
        .store
        .upsert(UpsertPoint {
            id: None,
            content: content.to_string(),
            dense_small: embedding.small,
            dense_large: embedding.large,
            payload: payload.clone(),
        })
        .await?;

    tracing::info!(id = %id, content_len = content.len(), "memory stored");
    Ok(ToolResponse::success(
        "Memory stored",
        json!({
            "id": id,
            "workspace": payload.get("workspace"),
            "memory_type": payload.get("memory_type"),
            "expires_at": payload.get("expires_at"),
        }),
    ))
}

/// Chunked path: one point per overlapping window, all sharing a fresh
/// chunk group id, written through the batched upsert pipeline.
async fn store_chunked(
    state: &AppState,
    content: &str,
    payload: Map<String, Value>,
) -> anyhow::Result<ToolResponse> {
    let chunks = state.engine.generate_chunked(content).await?;
    let group_id = Uuid::now_v7().to_string();
    let total = chunks.len();

    let mut points = Vec::with_capacity(total);
    for chunk in chunks {
        let large = state
            .engine
            .generate_for_space(&chunk.text, crate::embedding::VectorSpace::Large)
            .await?;

        let mut chunk_payload = payload.clone();
        chunk_payload.insert("chunk_index".into(), json!(chunk.index));
        chunk_payload.insert("total_chunks".into(), json!(chunk.total));
        chunk_payload.insert("chunk_group_id".into(), json!(group_id));

        points.push(UpsertPoint {
            id: None,
            content: chunk.text,
            dense_small: chunk.small,
            dense_large: large,
            payload: chunk_payload,
        });
    }

    let outcome = state.store.batch_upsert(points).await?;
    if !outcome.failed.is_empty() {
        let first = &outcome.failed[0];
        anyhow::bail!(
            "{} of {} chunks failed to store (first: {})",
            outcome.failed.len(),
            outcome.total_processed,
            first.error
        );
    }

    tracing::info!(
        group = %group_id,
        chunks = total,
        content_len = content.len(),
        "chunked memory stored"
    );
    Ok(ToolResponse::success(
        format!("Memory stored as {total} chunks"),
        json!({
            "ids": outcome.successful_ids,
            "chunks": total,
            "chunk_group_id": group_id,
            "workspace": payload.get("workspace"),
        }),
    ))
}

/// The `SECRETS_DETECTED` refusal, carrying the redaction preview and the
/// detection list.
fn secrets_blocked_response(reason: &str, report: &ScanReport) -> ToolResponse {
    ToolResponse::validation(
        format!("Content blocked by secret scanner: {reason}"),
        None,
    )
    .with_metadata("error_code", json!("SECRETS_DETECTED"))
    .with_metadata("detections", json!(report.detections))
    .with_metadata("sanitized_preview", json!(preview(&report.sanitized)))
}

fn preview(text: &str) -> String {
    const PREVIEW_CHARS: usize = 500;
    if text.chars().count() <= PREVIEW_CHARS {
        text.to_string()
    } else {
        let cut: String = text.chars().take(PREVIEW_CHARS).collect();
        format!("{cut}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocked_response_carries_error_code_and_detections() {
        let scanner = crate::scanner::SecretScanner::new(3).unwrap();
        let text = format!("key=sk-{}", "a".repeat(48));
        let report = scanner.scan(&text);
        let Decision::Block { reason } = report.decision.clone() else {
            panic!("expected block");
        };

        let response = secrets_blocked_response(&reason, &report);
        let json: Value = serde_json::to_value(&response).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error_type"], "VALIDATION_ERROR");
        assert_eq!(json["metadata"]["error_code"], "SECRETS_DETECTED");
        assert!(json["metadata"]["detections"].as_array().unwrap().len() >= 1);
        assert!(json["metadata"]["sanitized_preview"]
            .as_str()
            .unwrap()
            .contains("[REDACTED_OPENAI_API_KEY]"));
    }

    #[test]
    fn preview_truncates_long_text() {
        let text = "a".repeat(600);
        let shortened = preview(&text);
        assert!(shortened.ends_with("..."));
        assert_eq!(shortened.chars().count(), 503);
        assert_eq!(preview("short"), "short");
    }
}
