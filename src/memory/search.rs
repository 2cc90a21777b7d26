//! Read paths — semantic query, filtered listing, and single-point lookup.

use serde_json::{json, Value};
use std::time::Instant;

use super::{parse_point_id, AppState};
use crate::index::{SearchFilters, SearchHit, SearchRequest};
use crate::response::{failure, ToolResponse};

const MAX_QUERY_CHARS: usize = 10_000;

/// Rows fetched for in-memory sorting before the guardrail kicks in.
const SORT_FETCH_CAP: usize = 10_000;

/// Characters of content echoed in list previews.
const PREVIEW_CHARS: usize = 200;

/// Parameters for a semantic query, after tool-level validation.
#[derive(Debug, Clone)]
pub struct QueryOptions {
    pub filter: SearchFilters,
    pub limit: usize,
    pub offset: usize,
    pub score_threshold: Option<f64>,
    pub hnsw_ef: Option<u64>,
    pub use_hybrid_search: bool,
    /// Accepted for API compatibility; RRF weighs both sources equally, so
    /// this currently has no effect.
    pub hybrid_alpha: Option<f64>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            filter: SearchFilters::default(),
            limit: 10,
            offset: 0,
            score_threshold: None,
            hnsw_ef: None,
            use_hybrid_search: false,
            hybrid_alpha: None,
        }
    }
}

/// Semantic search over the large vector space, optionally fused with
/// full-text matches.
pub async fn query_memories(state: &AppState, query: String, options: QueryOptions) -> ToolResponse {
    let started = Instant::now();

    if query.is_empty() {
        return ToolResponse::validation("query must not be empty", None).with_duration(started);
    }
    if query.chars().count() > MAX_QUERY_CHARS {
        return ToolResponse::validation(
            format!("query exceeds {MAX_QUERY_CHARS} characters"),
            None,
        )
        .with_duration(started);
    }
    if !(1..=100).contains(&options.limit) {
        return ToolResponse::validation("limit must be between 1 and 100", None)
            .with_duration(started);
    }
    if let Some(threshold) = options.score_threshold {
        if !(0.0..=1.0).contains(&threshold) {
            return ToolResponse::validation("score_threshold must be in [0, 1]", None)
                .with_duration(started);
        }
    }
    if let Some(ef) = options.hnsw_ef {
        if !(64..=512).contains(&ef) {
            return ToolResponse::validation("hnsw_ef must be between 64 and 512", None)
                .with_duration(started);
        }
    }
    if let Some(alpha) = options.hybrid_alpha {
        if !(0.0..=1.0).contains(&alpha) {
            return ToolResponse::validation("hybrid_alpha must be in [0, 1]", None)
                .with_duration(started);
        }
    }

    let embedding = match state.engine.generate(&query).await {
        Ok(pair) => pair,
        Err(err) => return failure("failed to embed query", &err).with_duration(started),
    };

    let request = SearchRequest {
        vector: embedding.small,
        large_vector: Some(embedding.large),
        filter: options.filter,
        limit: options.limit,
        offset: options.offset,
        score_threshold: options.score_threshold,
        hnsw_ef: options.hnsw_ef,
    };

    let result = if options.use_hybrid_search {
        state.store.hybrid_search(request, &query).await
    } else {
        state.store.search(request).await
    };

    match result {
        Ok(hits) => {
            let results: Vec<Value> = hits.iter().map(hit_to_result).collect();
            let count = results.len();
            ToolResponse::success(
                format!("Found {count} memories"),
                json!({
                    "query": query,
                    "results": results,
                    "count": count,
                }),
            )
            .with_duration(started)
        }
        Err(err) => failure("search failed", &err).with_duration(started),
    }
}

/// Listing options after tool-level validation.
#[derive(Debug, Clone)]
pub struct ListOptions {
    pub filter: SearchFilters,
    pub limit: usize,
    pub offset: usize,
    pub sort_by: SortField,
    pub sort_order: SortOrder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    CreatedAt,
    UpdatedAt,
    AccessCount,
    Confidence,
}

impl SortField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
            Self::AccessCount => "access_count",
            Self::Confidence => "confidence",
        }
    }
}

impl std::str::FromStr for SortField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created_at" => Ok(Self::CreatedAt),
            "updated_at" => Ok(Self::UpdatedAt),
            "access_count" => Ok(Self::AccessCount),
            "confidence" => Ok(Self::Confidence),
            _ => Err(format!(
                "unknown sort field: {s} (expected created_at, updated_at, access_count, or confidence)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl std::str::FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            _ => Err(format!("unknown sort order: {s} (expected asc or desc)")),
        }
    }
}

/// Filtered listing with content previews.
///
/// `created_at` sorting scrolls directly (point ids are time-ordered). Other
/// sort fields fetch up to 10 000 matching rows and sort in memory; larger
/// result sets are truncated with a logged warning, not an error.
pub async fn list_memories(state: &AppState, options: ListOptions) -> ToolResponse {
    let started = Instant::now();

    if !(1..=1000).contains(&options.limit) {
        return ToolResponse::validation("limit must be between 1 and 1000", None)
            .with_duration(started);
    }

    let result = if options.sort_by == SortField::CreatedAt {
        list_fast_path(state, &options).await
    } else {
        list_sorted(state, &options).await
    };

    match result {
        Ok(rows) => {
            let memories: Vec<Value> = rows.iter().map(|hit| listed_row(hit)).collect();
            let count = memories.len();
            ToolResponse::success(
                format!("Listed {count} memories"),
                json!({
                    "memories": memories,
                    "count": count,
                    "limit": options.limit,
                    "offset": options.offset,
                    "sort_by": options.sort_by.as_str(),
                }),
            )
            .with_duration(started)
        }
        Err(err) => failure("list failed", &err).with_duration(started),
    }
}

/// Scroll order is point-id order, which is creation order for our
/// time-ordered UUIDs; descending just reverses the page in-process.
async fn list_fast_path(state: &AppState, options: &ListOptions) -> anyhow::Result<Vec<SearchHit>> {
    let mut rows = state
        .store
        .list(&options.filter, options.limit, options.offset)
        .await?;
    if options.sort_order == SortOrder::Desc {
        rows.reverse();
    }
    Ok(rows)
}

async fn list_sorted(state: &AppState, options: &ListOptions) -> anyhow::Result<Vec<SearchHit>> {
    let matched = state.store.count(&options.filter).await? as usize;
    let fetch = matched.min(SORT_FETCH_CAP);
    if matched > SORT_FETCH_CAP {
        tracing::warn!(
            matched,
            cap = SORT_FETCH_CAP,
            sort_by = options.sort_by.as_str(),
            "sorted listing truncated; narrow the filter for a complete ordering"
        );
    }

    let mut rows = state.store.list(&options.filter, fetch, 0).await?;
    sort_rows(&mut rows, options.sort_by, options.sort_order);
    Ok(rows
        .into_iter()
        .skip(options.offset)
        .take(options.limit)
        .collect())
}

/// Numeric in-memory sort; timestamps compare as epoch milliseconds and
/// missing values sort as zero.
fn sort_rows(rows: &mut [SearchHit], field: SortField, order: SortOrder) {
    let key = |hit: &SearchHit| -> f64 {
        let value = hit.payload.get(field.as_str());
        match field {
            SortField::AccessCount => value.and_then(|v| v.as_f64()).unwrap_or(0.0),
            SortField::Confidence => value.and_then(|v| v.as_f64()).unwrap_or(0.0),
            SortField::CreatedAt | SortField::UpdatedAt => value
                .and_then(|v| v.as_str())
                .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
                .map(|t| t.timestamp_millis() as f64)
                .unwrap_or(0.0),
        }
    };
    rows.sort_by(|a, b| {
        let ordering = key(a).partial_cmp(&key(b)).unwrap_or(std::cmp::Ordering::Equal);
        match order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
}

/// Lookup by id; reported with score 1.0 and tracked as an access.
pub async fn get_memory(state: &AppState, id: &str) -> ToolResponse {
    let started = Instant::now();

    if let Err(violation) = parse_point_id(id) {
        return ToolResponse::validation(violation, None).with_duration(started);
    }

    match state.store.get(id).await {
        Ok(Some(hit)) => ToolResponse::success("Memory found", hit_to_result(&hit))
            .with_duration(started),
        Ok(None) => ToolResponse::not_found(format!("Memory {id}")).with_duration(started),
        Err(err) => failure("lookup failed", &err).with_duration(started),
    }
}

/// `{id, content, score, metadata}` — metadata is the payload minus content.
fn hit_to_result(hit: &SearchHit) -> Value {
    let mut metadata = hit.payload.clone();
    let content = metadata
        .remove("content")
        .and_then(|v| v.as_str().map(String::from))
        .unwrap_or_default();
    json!({
        "id": hit.id,
        "content": content,
        "score": hit.score,
        "metadata": metadata,
    })
}

fn listed_row(hit: &SearchHit) -> Value {
    let mut metadata = hit.payload.clone();
    let content = metadata
        .remove("content")
        .and_then(|v| v.as_str().map(String::from))
        .unwrap_or_default();
    json!({
        "id": hit.id,
        "content": truncate_preview(&content, PREVIEW_CHARS),
        "metadata": metadata,
    })
}

/// Truncate content to `max_chars` characters, appending "..." if truncated.
fn truncate_preview(content: &str, max_chars: usize) -> String {
    if content.chars().count() <= max_chars {
        content.to_string()
    } else {
        let cut: String = content.chars().take(max_chars).collect();
        format!("{cut}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(id: &str, payload: Value) -> SearchHit {
        SearchHit {
            id: id.into(),
            score: 1.0,
            payload: payload.as_object().unwrap().clone(),
        }
    }

    #[test]
    fn sort_by_confidence_desc() {
        let mut rows = vec![
            hit("a", json!({"confidence": 0.5})),
            hit("b", json!({"confidence": 0.9})),
            hit("c", json!({})),
        ];
        sort_rows(&mut rows, SortField::Confidence, SortOrder::Desc);
        let ids: Vec<&str> = rows.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, ["b", "a", "c"]);
    }

    #[test]
    fn sort_by_access_count_asc_missing_first() {
        let mut rows = vec![
            hit("a", json!({"access_count": 7})),
            hit("b", json!({})),
            hit("c", json!({"access_count": 2})),
        ];
        sort_rows(&mut rows, SortField::AccessCount, SortOrder::Asc);
        let ids: Vec<&str> = rows.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, ["b", "c", "a"]);
    }

    #[test]
    fn sort_by_updated_at_parses_timestamps() {
        let mut rows = vec![
            hit("old", json!({"updated_at": "2025-01-01T00:00:00Z"})),
            hit("new", json!({"updated_at": "2026-01-01T00:00:00Z"})),
            hit("invalid", json!({"updated_at": "not-a-date"})),
        ];
        sort_rows(&mut rows, SortField::UpdatedAt, SortOrder::Desc);
        let ids: Vec<&str> = rows.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, ["new", "old", "invalid"]);
    }

    #[test]
    fn sort_field_parsing() {
        assert_eq!("created_at".parse::<SortField>().unwrap(), SortField::CreatedAt);
        assert_eq!("confidence".parse::<SortField>().unwrap(), SortField::Confidence);
        assert!("score".parse::<SortField>().is_err());
        assert_eq!("asc".parse::<SortOrder>().unwrap(), SortOrder::Asc);
        assert!("down".parse::<SortOrder>().is_err());
    }

    #[test]
    fn hit_result_splits_content_from_metadata() {
        let result = hit_to_result(&hit(
            "abc",
            json!({"content": "the note", "confidence": 0.8, "workspace": "acme"}),
        ));
        assert_eq!(result["id"], "abc");
        assert_eq!(result["content"], "the note");
        assert_eq!(result["metadata"]["confidence"], 0.8);
        assert!(result["metadata"].get("content").is_none());
    }

    #[test]
    fn listed_rows_truncate_previews() {
        let long = "x".repeat(400);
        let row = listed_row(&hit("abc", json!({"content": long})));
        let content = row["content"].as_str().unwrap();
        assert_eq!(content.chars().count(), PREVIEW_CHARS + 3);
        assert!(content.ends_with("..."));
    }

    #[test]
    fn truncate_preview_respects_char_boundaries() {
        let text = "é".repeat(300);
        let preview = truncate_preview(&text, 200);
        assert_eq!(preview.chars().count(), 203);
    }
}
