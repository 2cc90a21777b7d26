//! Search filter construction.
//!
//! Translates the caller-facing [`SearchFilters`] into the Qdrant filter DSL:
//! an AND of equality/range conditions plus an always-present expiry exclusion
//! so expired points never surface from query, list, or count.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::memory::types::MemoryType;

/// Payload filters accepted by the query/list/count tools.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SearchFilters {
    /// Workspace slug to match exactly.
    #[schemars(description = "Workspace slug to match exactly")]
    pub workspace: Option<String>,

    /// Memory type: `"long-term"`, `"episodic"`, or `"short-term"`.
    #[schemars(description = "Memory type: 'long-term', 'episodic', or 'short-term'")]
    pub memory_type: Option<MemoryType>,

    /// Only points with confidence at or above this value.
    #[schemars(description = "Minimum confidence score 0.0-1.0")]
    pub min_confidence: Option<f64>,

    /// Points carrying any of these tags match.
    #[schemars(description = "Match points carrying any of these tags (1-20 tags)")]
    pub tags: Option<Vec<String>>,

    /// Extra payload fields to match by equality.
    #[schemars(description = "Arbitrary payload fields to match by equality")]
    pub metadata: Option<Map<String, Value>>,
}

/// Build the AND-of-conditions filter for a search, list, or count.
///
/// The expiry exclusion (`expires_at` absent or in the future) is always
/// appended, so the returned filter is never empty.
pub fn build_filter(filters: &SearchFilters, now: DateTime<Utc>) -> Value {
    let mut must: Vec<Value> = Vec::new();

    if let Some(workspace) = &filters.workspace {
        // Stored workspace slugs are always lowercased; fold the filter value
        // the same way so comparisons stay case-insensitive.
        must.push(json!({"key": "workspace", "match": {"value": workspace.to_lowercase()}}));
    }
    if let Some(memory_type) = filters.memory_type {
        must.push(json!({"key": "memory_type", "match": {"value": memory_type.as_str()}}));
    }
    if let Some(min_confidence) = filters.min_confidence {
        must.push(json!({"key": "confidence", "range": {"gte": min_confidence}}));
    }
    if let Some(tags) = filters.tags.as_ref().filter(|t| !t.is_empty()) {
        must.push(json!({"key": "tags", "match": {"any": tags}}));
    }
    if let Some(metadata) = &filters.metadata {
        for (key, value) in metadata {
            must.push(json!({"key": key, "match": {"value": value}}));
        }
    }

    must.push(expiry_exclusion(now));

    json!({"must": must})
}

/// Same filter with a full-text `content` condition appended, for the text
/// side of hybrid search.
pub fn build_text_filter(filters: &SearchFilters, query: &str, now: DateTime<Utc>) -> Value {
    let mut filter = build_filter(filters, now);
    if let Some(must) = filter
        .get_mut("must")
        .and_then(|m| m.as_array_mut())
    {
        must.push(json!({"key": "content", "match": {"text": query}}));
    }
    filter
}

/// Either `expires_at` is unset or it lies in the future.
fn expiry_exclusion(now: DateTime<Utc>) -> Value {
    json!({
        "should": [
            {"is_empty": {"key": "expires_at"}},
            {"key": "expires_at", "datetime_range": {"gt": now.to_rfc3339()}}
        ]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        "2026-01-15T12:00:00Z".parse().unwrap()
    }

    fn must_conditions(filter: &Value) -> &Vec<Value> {
        filter["must"].as_array().expect("must array")
    }

    #[test]
    fn empty_filters_still_exclude_expired() {
        let filter = build_filter(&SearchFilters::default(), now());
        let must = must_conditions(&filter);
        assert_eq!(must.len(), 1);
        let should = must[0]["should"].as_array().unwrap();
        assert_eq!(should[0]["is_empty"]["key"], "expires_at");
        assert_eq!(
            should[1]["key"], "expires_at",
        );
        assert!(should[1]["datetime_range"]["gt"]
            .as_str()
            .unwrap()
            .starts_with("2026-01-15T12:00:00"));
    }

    #[test]
    fn workspace_and_type_equalities() {
        let filters = SearchFilters {
            workspace: Some("acme".into()),
            memory_type: Some(MemoryType::Episodic),
            ..Default::default()
        };
        let filter = build_filter(&filters, now());
        let must = must_conditions(&filter);
        assert_eq!(must.len(), 3);
        assert_eq!(must[0]["key"], "workspace");
        assert_eq!(must[0]["match"]["value"], "acme");
        assert_eq!(must[1]["key"], "memory_type");
        assert_eq!(must[1]["match"]["value"], "episodic");
    }

    #[test]
    fn workspace_filter_folds_case() {
        let filters = SearchFilters {
            workspace: Some("Acme-Team".into()),
            ..Default::default()
        };
        let filter = build_filter(&filters, now());
        let must = must_conditions(&filter);
        assert_eq!(must[0]["match"]["value"], "acme-team");
    }

    #[test]
    fn confidence_is_a_range() {
        let filters = SearchFilters {
            min_confidence: Some(0.75),
            ..Default::default()
        };
        let filter = build_filter(&filters, now());
        let must = must_conditions(&filter);
        assert_eq!(must[0]["key"], "confidence");
        assert_eq!(must[0]["range"]["gte"], 0.75);
    }

    #[test]
    fn tags_match_any() {
        let filters = SearchFilters {
            tags: Some(vec!["rust".into(), "async".into()]),
            ..Default::default()
        };
        let filter = build_filter(&filters, now());
        let must = must_conditions(&filter);
        assert_eq!(must[0]["key"], "tags");
        assert_eq!(must[0]["match"]["any"], json!(["rust", "async"]));
    }

    #[test]
    fn empty_tags_add_no_condition() {
        let filters = SearchFilters {
            tags: Some(vec![]),
            ..Default::default()
        };
        let filter = build_filter(&filters, now());
        assert_eq!(must_conditions(&filter).len(), 1);
    }

    #[test]
    fn metadata_pairs_become_equalities() {
        let mut metadata = Map::new();
        metadata.insert("source".into(), json!("manual"));
        metadata.insert("priority".into(), json!(3));
        let filters = SearchFilters {
            metadata: Some(metadata),
            ..Default::default()
        };
        let filter = build_filter(&filters, now());
        let must = must_conditions(&filter);
        // two metadata equalities + expiry clause
        assert_eq!(must.len(), 3);
        assert!(must
            .iter()
            .any(|c| c["key"] == "source" && c["match"]["value"] == "manual"));
        assert!(must
            .iter()
            .any(|c| c["key"] == "priority" && c["match"]["value"] == 3));
    }

    #[test]
    fn text_filter_appends_content_match() {
        let filters = SearchFilters {
            workspace: Some("acme".into()),
            ..Default::default()
        };
        let filter = build_text_filter(&filters, "async runtime", now());
        let must = must_conditions(&filter);
        let last = must.last().unwrap();
        assert_eq!(last["key"], "content");
        assert_eq!(last["match"]["text"], "async runtime");
    }
}
