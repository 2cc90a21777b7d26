//! Minimal typed client for the Qdrant HTTP API.
//!
//! Covers exactly the endpoints the vector store needs: collection lifecycle,
//! payload indexes, point upsert/retrieve/delete, search, scroll, count, and
//! payload updates. Every call carries the configured timeout and goes through
//! the shared retry policy; the optional api-key travels in the `api-key`
//! header.

use anyhow::{Context, Result};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::time::Duration;

use crate::config::QdrantConfig;
use crate::retry::{with_retry, RetryPolicy, RetryableStatus};

#[derive(Clone)]
pub struct QdrantClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
    retry: RetryPolicy,
}

/// A point to upsert, with both named vectors and its payload.
#[derive(Debug, Clone, Serialize)]
pub struct PointStruct {
    pub id: String,
    pub vector: Map<String, Value>,
    pub payload: Map<String, Value>,
}

/// A search result with its similarity score.
#[derive(Debug, Clone, Deserialize)]
pub struct ScoredPoint {
    #[serde(deserialize_with = "point_id")]
    pub id: String,
    pub score: f64,
    #[serde(default)]
    pub payload: Option<Map<String, Value>>,
}

/// A point returned from retrieve or scroll (no score).
#[derive(Debug, Clone, Deserialize)]
pub struct RetrievedPoint {
    #[serde(deserialize_with = "point_id")]
    pub id: String,
    #[serde(default)]
    pub payload: Option<Map<String, Value>>,
}

/// Collection description as returned by `GET /collections/{name}`.
#[derive(Debug, Clone, Deserialize)]
pub struct CollectionInfo {
    pub status: String,
    #[serde(default)]
    pub optimizer_status: Value,
    #[serde(default)]
    pub points_count: Option<u64>,
    #[serde(default)]
    pub indexed_vectors_count: Option<u64>,
    #[serde(default)]
    pub segments_count: Option<u64>,
    pub config: CollectionConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollectionConfig {
    pub params: CollectionParams,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollectionParams {
    /// Either a single unnamed vector config or a map of named vector configs.
    pub vectors: Value,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// Qdrant ids come back as strings or integers; ours are always UUID strings.
fn point_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "unexpected point id: {other}"
        ))),
    }
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct CollectionsList {
    collections: Vec<CollectionDescription>,
}

#[derive(Debug, Deserialize)]
struct CollectionDescription {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ScrollResult {
    points: Vec<RetrievedPoint>,
}

#[derive(Debug, Deserialize)]
struct CountResult {
    count: u64,
}

impl QdrantClient {
    pub fn new(config: &QdrantConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
            retry: RetryPolicy::default(),
        })
    }

    pub async fn list_collections(&self) -> Result<Vec<String>> {
        let list: CollectionsList = self
            .request(Method::GET, "/collections", None)
            .await
            .context("failed to list collections")?;
        Ok(list.collections.into_iter().map(|c| c.name).collect())
    }

    /// Collection description, or `None` when the collection does not exist.
    pub async fn collection_info(&self, collection: &str) -> Result<Option<CollectionInfo>> {
        let path = format!("/collections/{collection}");
        match self.request::<CollectionInfo>(Method::GET, &path, None).await {
            Ok(info) => Ok(Some(info)),
            Err(err) => {
                if err
                    .chain()
                    .any(|c| matches!(c.downcast_ref::<RetryableStatus>(), Some(RetryableStatus(404))))
                {
                    Ok(None)
                } else {
                    Err(err)
                }
            }
        }
    }

    pub async fn create_collection(&self, collection: &str, body: &Value) -> Result<()> {
        let path = format!("/collections/{collection}");
        self.request::<Value>(Method::PUT, &path, Some(body))
            .await
            .with_context(|| format!("failed to create collection '{collection}'"))?;
        Ok(())
    }

    /// Create a payload index. An index that already exists is not an error.
    pub async fn create_field_index(
        &self,
        collection: &str,
        field_name: &str,
        field_schema: &Value,
    ) -> Result<()> {
        let path = format!("/collections/{collection}/index");
        let body = json!({
            "field_name": field_name,
            "field_schema": field_schema,
        });
        match self.request::<Value>(Method::PUT, &path, Some(&body)).await {
            Ok(_) => Ok(()),
            Err(err) => {
                let detail = format!("{err:#}");
                if detail.contains("already exists") {
                    Ok(())
                } else {
                    Err(err.context(format!("failed to index field '{field_name}'")))
                }
            }
        }
    }

    pub async fn upsert_points(
        &self,
        collection: &str,
        points: &[PointStruct],
        wait: bool,
    ) -> Result<()> {
        let path = format!("/collections/{collection}/points?wait={wait}");
        let body = json!({"points": points});
        self.request::<Value>(Method::PUT, &path, Some(&body))
            .await
            .context("point upsert failed")?;
        Ok(())
    }

    pub async fn search_points(&self, collection: &str, body: &Value) -> Result<Vec<ScoredPoint>> {
        let path = format!("/collections/{collection}/points/search");
        self.request(Method::POST, &path, Some(body))
            .await
            .context("vector search failed")
    }

    pub async fn scroll_points(
        &self,
        collection: &str,
        body: &Value,
    ) -> Result<Vec<RetrievedPoint>> {
        let path = format!("/collections/{collection}/points/scroll");
        let result: ScrollResult = self
            .request(Method::POST, &path, Some(body))
            .await
            .context("scroll failed")?;
        Ok(result.points)
    }

    pub async fn retrieve_points(
        &self,
        collection: &str,
        ids: &[String],
    ) -> Result<Vec<RetrievedPoint>> {
        let path = format!("/collections/{collection}/points");
        let body = json!({"ids": ids, "with_payload": true, "with_vector": false});
        self.request(Method::POST, &path, Some(&body))
            .await
            .context("point retrieve failed")
    }

    pub async fn delete_points(&self, collection: &str, ids: &[String], wait: bool) -> Result<()> {
        let path = format!("/collections/{collection}/points/delete?wait={wait}");
        let body = json!({"points": ids});
        self.request::<Value>(Method::POST, &path, Some(&body))
            .await
            .context("point delete failed")?;
        Ok(())
    }

    pub async fn count_points(&self, collection: &str, filter: &Value, exact: bool) -> Result<u64> {
        let path = format!("/collections/{collection}/points/count");
        let body = json!({"filter": filter, "exact": exact});
        let result: CountResult = self
            .request(Method::POST, &path, Some(&body))
            .await
            .context("count failed")?;
        Ok(result.count)
    }

    pub async fn set_payload(
        &self,
        collection: &str,
        ids: &[String],
        payload: &Map<String, Value>,
        wait: bool,
    ) -> Result<()> {
        let path = format!("/collections/{collection}/points/payload?wait={wait}");
        let body = json!({"payload": payload, "points": ids});
        self.request::<Value>(Method::POST, &path, Some(&body))
            .await
            .context("payload update failed")?;
        Ok(())
    }

    /// Issue one HTTP request with retry, returning the `result` field of the
    /// Qdrant response envelope.
    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<T> {
        let url = format!("{}{path}", self.base_url);
        with_retry(&self.retry, path, || async {
            let mut request = self
                .http
                .request(method.clone(), &url)
                .timeout(self.timeout);
            if let Some(key) = &self.api_key {
                request = request.header("api-key", key);
            }
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = request.send().await.context("qdrant request failed")?;
            let status = response.status();
            if !status.is_success() {
                let detail = response.text().await.unwrap_or_default();
                return Err(anyhow::Error::new(RetryableStatus(status.as_u16()))
                    .context(format!("qdrant returned {status}: {detail}")));
            }

            let envelope: ApiEnvelope<T> = response
                .json()
                .await
                .context("failed to decode qdrant response")?;
            envelope
                .result
                .context("qdrant response had no result field")
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scored_point_accepts_string_and_int_ids() {
        let json = r#"{"id": "0195c2a8-1111-7000-8000-000000000000", "score": 0.87, "payload": {"content": "x"}}"#;
        let point: ScoredPoint = serde_json::from_str(json).unwrap();
        assert_eq!(point.id, "0195c2a8-1111-7000-8000-000000000000");
        assert!((point.score - 0.87).abs() < 1e-9);

        let json = r#"{"id": 42, "score": 1.0}"#;
        let point: ScoredPoint = serde_json::from_str(json).unwrap();
        assert_eq!(point.id, "42");
        assert!(point.payload.is_none());
    }

    #[test]
    fn collection_info_decodes_named_vectors() {
        let json = r#"{
            "status": "green",
            "optimizer_status": "ok",
            "points_count": 10,
            "segments_count": 2,
            "config": {
                "params": {
                    "vectors": {
                        "dense": {"size": 384, "distance": "Cosine"},
                        "dense_large": {"size": 384, "distance": "Cosine"}
                    }
                },
                "hnsw_config": {"m": 16}
            }
        }"#;
        let info: CollectionInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.status, "green");
        assert_eq!(info.points_count, Some(10));
        assert_eq!(info.config.params.vectors["dense"]["size"], 384);
    }

    #[test]
    fn point_struct_serializes_named_vectors() {
        let mut vector = Map::new();
        vector.insert("dense".into(), json!([0.1, 0.2]));
        vector.insert("dense_large".into(), json!([0.3, 0.4]));
        let mut payload = Map::new();
        payload.insert("content".into(), json!("hello"));
        let point = PointStruct {
            id: "abc".into(),
            vector,
            payload,
        };
        let serialized = serde_json::to_value(&point).unwrap();
        assert_eq!(serialized["vector"]["dense"], json!([0.1, 0.2]));
        assert_eq!(serialized["payload"]["content"], "hello");
    }
}
