//! Vector store controller — owns the Qdrant collection.
//!
//! Responsible for collection lifecycle (create on first use, validate the
//! named-vector schema on reuse), payload index creation, upserts with payload
//! default synthesis, batched writes, dense and hybrid search, and the
//! best-effort access-tracking side channel.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;

use super::client::{CollectionInfo, PointStruct, QdrantClient, RetrievedPoint};
use super::filter::{build_filter, build_text_filter, SearchFilters};
use crate::config::QdrantConfig;
use crate::embedding::is_valid_vector;

/// Batch size for bulk upserts. Each batch is atomic at the index layer.
const UPSERT_BATCH_SIZE: usize = 500;

/// Dense candidates fetched per hybrid-search source, as a multiple of the
/// requested limit.
const HYBRID_FETCH_MULTIPLIER: usize = 3;

/// Reciprocal Rank Fusion constant.
const RRF_K: f64 = 60.0;

/// Default search beam width when the caller does not override `hnsw_ef`.
const DEFAULT_HNSW_EF: u64 = 128;

/// Minimum interval between access-tracking failure warnings.
const ACCESS_WARN_INTERVAL: Duration = Duration::from_secs(10);

/// A point to write, before payload default synthesis.
#[derive(Debug, Clone)]
pub struct UpsertPoint {
    /// Point id; a fresh UUID is minted when absent.
    pub id: Option<String>,
    pub content: String,
    pub dense_small: Vec<f32>,
    pub dense_large: Vec<f32>,
    /// Partial payload merged over the synthesized defaults.
    pub payload: Map<String, Value>,
}

/// One search result.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub id: String,
    pub score: f64,
    pub payload: Map<String, Value>,
}

/// Dense search request.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub vector: Vec<f32>,
    /// When present, the `dense_large` space is searched with this vector.
    pub large_vector: Option<Vec<f32>>,
    pub filter: SearchFilters,
    pub limit: usize,
    pub offset: usize,
    pub score_threshold: Option<f64>,
    pub hnsw_ef: Option<u64>,
}

/// Outcome of a batched upsert.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub successful_ids: Vec<String>,
    pub failed: Vec<FailedPoint>,
    pub total_processed: usize,
}

#[derive(Debug)]
pub struct FailedPoint {
    /// Index of the point in the original input.
    pub index: usize,
    pub id: String,
    pub error: String,
}

/// Collection statistics for the status tool.
#[derive(Debug, serde::Serialize)]
pub struct IndexStats {
    pub points_count: Option<u64>,
    pub indexed_vectors_count: Option<u64>,
    pub segments_count: Option<u64>,
    pub status: String,
    pub optimizer_status: Value,
    pub config: Value,
    pub access_tracking_failures: u64,
}

/// Controller over the memory collection. Cheap to clone; all clones share
/// the initialization slot and counters.
#[derive(Clone)]
pub struct VectorStore {
    client: QdrantClient,
    collection: String,
    small_dims: usize,
    large_dims: usize,
    init: Arc<OnceCell<()>>,
    access_failures: Arc<AtomicU64>,
    last_access_warn: Arc<Mutex<Option<Instant>>>,
}

impl VectorStore {
    pub fn new(config: &QdrantConfig, small_dims: usize, large_dims: usize) -> Result<Self> {
        Ok(Self {
            client: QdrantClient::new(config)?,
            collection: config.collection.clone(),
            small_dims,
            large_dims,
            init: Arc::new(OnceCell::new()),
            access_failures: Arc::new(AtomicU64::new(0)),
            last_access_warn: Arc::new(Mutex::new(None)),
        })
    }

    /// Create the collection on first use, or validate an existing one.
    /// Concurrent callers share a single initialization future; a schema
    /// mismatch is fatal and the process must not serve traffic.
    pub async fn ensure_ready(&self) -> Result<()> {
        self.init
            .get_or_try_init(|| self.initialize())
            .await
            .map(|_| ())
    }

    async fn initialize(&self) -> Result<()> {
        let existing = self.client.list_collections().await?;
        if existing.iter().any(|name| name == &self.collection) {
            let info = self
                .client
                .collection_info(&self.collection)
                .await?
                .context("collection listed but not retrievable")?;
            self.validate_schema(&info)?;
            tracing::info!(
                collection = %self.collection,
                points = ?info.points_count,
                "collection schema validated"
            );
        } else {
            self.client
                .create_collection(&self.collection, &self.collection_schema())
                .await?;
            tracing::info!(
                collection = %self.collection,
                dense = self.small_dims,
                dense_large = self.large_dims,
                "collection created"
            );
        }

        self.create_payload_indexes().await?;
        Ok(())
    }

    /// The exact create-time schema: two named cosine vector spaces with
    /// int8 scalar quantization kept in RAM, plus deterministic HNSW and
    /// optimizer settings.
    fn collection_schema(&self) -> Value {
        let quantization = json!({
            "scalar": {"type": "int8", "quantile": 0.99, "always_ram": true}
        });
        json!({
            "vectors": {
                "dense": {
                    "size": self.small_dims,
                    "distance": "Cosine",
                    "quantization_config": quantization,
                },
                "dense_large": {
                    "size": self.large_dims,
                    "distance": "Cosine",
                    "quantization_config": quantization,
                },
            },
            "hnsw_config": {
                "m": 16,
                "ef_construct": 200,
                "full_scan_threshold": 10_000,
            },
            "optimizers_config": {
                "default_segment_number": 2,
                "max_segment_size": 200_000,
                "memmap_threshold": 50_000,
                "indexing_threshold": 20_000,
                "flush_interval_sec": 5,
            },
        })
    }

    /// An existing collection must use named vectors matching the configured
    /// dimensions exactly; embeddings from a different provider setup are
    /// rejected rather than silently mixed.
    fn validate_schema(&self, info: &CollectionInfo) -> Result<()> {
        let vectors = &info.config.params.vectors;
        let mut mismatches: Vec<String> = Vec::new();

        if vectors.get("size").is_some() {
            mismatches.push(
                "collection uses a single unnamed vector; named vectors 'dense' and \
                 'dense_large' are required"
                    .to_string(),
            );
        } else {
            for (name, expected_size) in
                [("dense", self.small_dims), ("dense_large", self.large_dims)]
            {
                match vectors.get(name) {
                    None => mismatches.push(format!("missing named vector '{name}'")),
                    Some(params) => {
                        let size = params.get("size").and_then(|s| s.as_u64());
                        if size != Some(expected_size as u64) {
                            mismatches.push(format!(
                                "vector '{name}' has size {size:?}, expected {expected_size}"
                            ));
                        }
                        let distance = params.get("distance").and_then(|d| d.as_str());
                        if distance != Some("Cosine") {
                            mismatches.push(format!(
                                "vector '{name}' uses distance {distance:?}, expected Cosine"
                            ));
                        }
                    }
                }
            }
        }

        if !mismatches.is_empty() {
            bail!(
                "collection '{}' does not match the configured embedding setup:\n  - {}\n\
                 Delete the collection or point MNEMO_COLLECTION at a different name.",
                self.collection,
                mismatches.join("\n  - ")
            );
        }
        Ok(())
    }

    async fn create_payload_indexes(&self) -> Result<()> {
        let keyword_fields = [
            ("workspace", "keyword"),
            ("memory_type", "keyword"),
            ("tags", "keyword"),
        ];
        for (field, kind) in keyword_fields {
            self.client
                .create_field_index(&self.collection, field, &json!(kind))
                .await?;
        }
        self.client
            .create_field_index(&self.collection, "confidence", &json!("float"))
            .await?;
        self.client
            .create_field_index(&self.collection, "access_count", &json!("integer"))
            .await?;
        for field in ["created_at", "updated_at", "last_accessed_at"] {
            self.client
                .create_field_index(&self.collection, field, &json!("datetime"))
                .await?;
        }
        self.client
            .create_field_index(
                &self.collection,
                "content",
                &json!({
                    "type": "text",
                    "tokenizer": "word",
                    "lowercase": true,
                    "min_token_len": 2,
                    "max_token_len": 20,
                }),
            )
            .await?;
        tracing::debug!(collection = %self.collection, "payload indexes ready");
        Ok(())
    }

    /// Store one point, synthesizing payload defaults. Waits for the write to
    /// be acknowledged. Returns the point id.
    pub async fn upsert(&self, point: UpsertPoint) -> Result<String> {
        self.ensure_ready().await?;
        let prepared = self.prepare_point(point)?;
        let id = prepared.id.clone();
        self.client
            .upsert_points(&self.collection, &[prepared], true)
            .await?;
        Ok(id)
    }

    /// Store many points in batches of 500. A failed batch marks every point
    /// in it as failed and processing continues with the next batch.
    pub async fn batch_upsert(&self, points: Vec<UpsertPoint>) -> Result<BatchOutcome> {
        self.ensure_ready().await?;
        let total = points.len();
        let mut outcome = BatchOutcome {
            total_processed: total,
            ..Default::default()
        };

        let mut prepared: Vec<(usize, PointStruct)> = Vec::with_capacity(total);
        for (index, point) in points.into_iter().enumerate() {
            match self.prepare_point(point) {
                Ok(p) => prepared.push((index, p)),
                Err(e) => outcome.failed.push(FailedPoint {
                    index,
                    id: String::new(),
                    error: e.to_string(),
                }),
            }
        }

        for batch in prepared.chunks(UPSERT_BATCH_SIZE) {
            let structs: Vec<PointStruct> = batch.iter().map(|(_, p)| p.clone()).collect();
            match self
                .client
                .upsert_points(&self.collection, &structs, true)
                .await
            {
                Ok(()) => {
                    outcome
                        .successful_ids
                        .extend(batch.iter().map(|(_, p)| p.id.clone()));
                }
                Err(e) => {
                    let error = format!("{e:#}");
                    for (index, point) in batch {
                        outcome.failed.push(FailedPoint {
                            index: *index,
                            id: point.id.clone(),
                            error: error.clone(),
                        });
                    }
                }
            }
            let done = outcome.successful_ids.len() + outcome.failed.len();
            tracing::info!(
                batch_size = batch.len(),
                progress = format!("{done}/{total}"),
                success_rate = format!(
                    "{:.1}%",
                    100.0 * outcome.successful_ids.len() as f64 / done.max(1) as f64
                ),
                "batch upsert progress"
            );
        }

        Ok(outcome)
    }

    fn prepare_point(&self, point: UpsertPoint) -> Result<PointStruct> {
        anyhow::ensure!(
            is_valid_vector(&point.dense_small, self.small_dims),
            "dense vector must have {} finite components",
            self.small_dims
        );
        anyhow::ensure!(
            is_valid_vector(&point.dense_large, self.large_dims),
            "dense_large vector must have {} finite components",
            self.large_dims
        );

        let id = point
            .id
            .unwrap_or_else(|| uuid::Uuid::now_v7().to_string());
        let now = Utc::now().to_rfc3339();

        let mut payload = point.payload;
        payload.insert("content".into(), Value::String(point.content));
        payload
            .entry("created_at".to_string())
            .or_insert_with(|| Value::String(now.clone()));
        payload.insert("updated_at".into(), Value::String(now));
        payload
            .entry("memory_type".to_string())
            .or_insert_with(|| Value::String("long-term".into()));
        payload
            .entry("confidence".to_string())
            .or_insert_with(|| json!(0.7));
        payload
            .entry("access_count".to_string())
            .or_insert_with(|| json!(0));

        let mut vector = Map::new();
        vector.insert("dense".into(), json!(point.dense_small));
        vector.insert("dense_large".into(), json!(point.dense_large));

        Ok(PointStruct {
            id,
            vector,
            payload,
        })
    }

    /// Dense similarity search against one of the named spaces.
    ///
    /// `indexed_only` keeps very recent writes out of results until background
    /// indexing catches up. Returned ids are access-tracked asynchronously.
    pub async fn search(&self, request: SearchRequest) -> Result<Vec<SearchHit>> {
        self.ensure_ready().await?;
        let filter = build_filter(&request.filter, Utc::now());
        let hits = self
            .dense_search(&request, &filter, request.limit, request.offset)
            .await?;
        self.spawn_access_tracking(hits.iter().map(|h| h.id.clone()).collect());
        Ok(hits)
    }

    async fn dense_search(
        &self,
        request: &SearchRequest,
        filter: &Value,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<SearchHit>> {
        let (space, vector) = match &request.large_vector {
            Some(large) => ("dense_large", large),
            None => ("dense", &request.vector),
        };
        let mut body = json!({
            "vector": {"name": space, "vector": vector},
            "filter": filter,
            "limit": limit,
            "offset": offset,
            "with_payload": true,
            "params": {
                "hnsw_ef": request.hnsw_ef.unwrap_or(DEFAULT_HNSW_EF),
                "indexed_only": true,
            },
        });
        if let Some(threshold) = request.score_threshold {
            body["score_threshold"] = json!(threshold);
        }

        let scored = self.client.search_points(&self.collection, &body).await?;
        Ok(scored
            .into_iter()
            .map(|point| SearchHit {
                id: point.id,
                score: point.score,
                payload: point.payload.unwrap_or_default(),
            })
            .collect())
    }

    /// Hybrid search: dense results and full-text matches fused by Reciprocal
    /// Rank Fusion with `k = 60`. Dense payloads win on collision.
    pub async fn hybrid_search(
        &self,
        request: SearchRequest,
        query_text: &str,
    ) -> Result<Vec<SearchHit>> {
        self.ensure_ready().await?;
        let now = Utc::now();
        let fetch_limit = request.limit * HYBRID_FETCH_MULTIPLIER;

        let filter = build_filter(&request.filter, now);
        let dense = self
            .dense_search(&request, &filter, fetch_limit, 0)
            .await?;

        let text_filter = build_text_filter(&request.filter, query_text, now);
        let scroll_body = json!({
            "filter": text_filter,
            "limit": fetch_limit,
            "with_payload": true,
            "with_vector": false,
        });
        let text_matches = self
            .client
            .scroll_points(&self.collection, &scroll_body)
            .await?;

        let fused = rrf_fuse(&dense, &text_matches);
        let page: Vec<SearchHit> = fused
            .into_iter()
            .skip(request.offset)
            .take(request.limit)
            .collect();

        self.spawn_access_tracking(page.iter().map(|h| h.id.clone()).collect());
        Ok(page)
    }

    /// Retrieve one point by id. Reported with score 1.0.
    pub async fn get(&self, id: &str) -> Result<Option<SearchHit>> {
        self.ensure_ready().await?;
        let points = self
            .client
            .retrieve_points(&self.collection, &[id.to_string()])
            .await?;
        let hit = points.into_iter().next().map(|point| SearchHit {
            id: point.id,
            score: 1.0,
            payload: point.payload.unwrap_or_default(),
        });
        if hit.is_some() {
            self.spawn_access_tracking(vec![id.to_string()]);
        }
        Ok(hit)
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.ensure_ready().await?;
        self.client
            .delete_points(&self.collection, &[id.to_string()], true)
            .await
    }

    pub async fn delete_batch(&self, ids: &[String]) -> Result<()> {
        self.ensure_ready().await?;
        self.client.delete_points(&self.collection, ids, true).await
    }

    /// Approximate count of points matching the filter.
    pub async fn count(&self, filters: &SearchFilters) -> Result<u64> {
        self.ensure_ready().await?;
        let filter = build_filter(filters, Utc::now());
        self.client
            .count_points(&self.collection, &filter, false)
            .await
    }

    /// Scroll-list points matching the filter, without vectors.
    pub async fn list(
        &self,
        filters: &SearchFilters,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<SearchHit>> {
        self.ensure_ready().await?;
        let filter = build_filter(filters, Utc::now());
        let body = json!({
            "filter": filter,
            "limit": limit + offset,
            "with_payload": true,
            "with_vector": false,
        });
        let points = self.client.scroll_points(&self.collection, &body).await?;
        Ok(points
            .into_iter()
            .skip(offset)
            .map(|point| SearchHit {
                id: point.id,
                score: 1.0,
                payload: point.payload.unwrap_or_default(),
            })
            .collect())
    }

    /// Merge fields into a point's payload. `updated_at` is always refreshed.
    pub async fn update_payload(&self, id: &str, mut fields: Map<String, Value>) -> Result<()> {
        self.ensure_ready().await?;
        fields.insert(
            "updated_at".into(),
            Value::String(Utc::now().to_rfc3339()),
        );
        self.client
            .set_payload(&self.collection, &[id.to_string()], &fields, true)
            .await
    }

    /// Collection statistics plus the access-tracking failure counter.
    pub async fn stats(&self) -> Result<IndexStats> {
        self.ensure_ready().await?;
        let info = self
            .client
            .collection_info(&self.collection)
            .await?
            .context("collection missing")?;
        Ok(IndexStats {
            points_count: info.points_count,
            indexed_vectors_count: info.indexed_vectors_count,
            segments_count: info.segments_count,
            status: info.status,
            optimizer_status: info.optimizer_status,
            config: json!({
                "params": {"vectors": info.config.params.vectors},
            }),
            access_tracking_failures: self.access_failures.load(Ordering::Relaxed),
        })
    }

    /// Fire-and-forget access tracking for returned ids.
    ///
    /// Read-modify-write without atomicity: concurrent queries may undercount,
    /// which is acceptable for analytics. Failures never reach the caller;
    /// they bump a counter and emit a rate-limited warning.
    fn spawn_access_tracking(&self, ids: Vec<String>) {
        if ids.is_empty() {
            return;
        }
        let store = self.clone();
        tokio::spawn(async move {
            if let Err(err) = store.track_access(&ids).await {
                store.access_failures.fetch_add(1, Ordering::Relaxed);
                store.warn_access_failure(&err);
            }
        });
    }

    async fn track_access(&self, ids: &[String]) -> Result<()> {
        let points = self.client.retrieve_points(&self.collection, ids).await?;
        let now = Utc::now().to_rfc3339();
        for point in points {
            let current = point
                .payload
                .as_ref()
                .and_then(|p| p.get("access_count"))
                .and_then(|v| v.as_u64())
                .unwrap_or(0);
            let mut payload = Map::new();
            payload.insert("access_count".into(), json!(current + 1));
            payload.insert("last_accessed_at".into(), Value::String(now.clone()));
            self.client
                .set_payload(&self.collection, &[point.id], &payload, false)
                .await?;
        }
        Ok(())
    }

    fn warn_access_failure(&self, err: &anyhow::Error) {
        let mut last = self
            .last_access_warn
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        let due = last
            .map(|at| at.elapsed() >= ACCESS_WARN_INTERVAL)
            .unwrap_or(true);
        if due {
            *last = Some(Instant::now());
            tracing::warn!(
                failures = self.access_failures.load(Ordering::Relaxed),
                error = %err,
                "access tracking failed"
            );
        }
    }
}

/// Reciprocal Rank Fusion over the dense and text result lists.
///
/// Each id accumulates `1/(k + r)` per list it appears in, with rank `r`
/// starting at 1. Payloads come from whichever list surfaced the id first,
/// dense winning on collision. Output is sorted by fused score descending
/// (id ascending on exact ties, for determinism).
fn rrf_fuse(dense: &[SearchHit], text: &[RetrievedPoint]) -> Vec<SearchHit> {
    let mut scores: HashMap<String, f64> = HashMap::new();
    let mut payloads: HashMap<String, Map<String, Value>> = HashMap::new();

    for (rank, hit) in dense.iter().enumerate() {
        *scores.entry(hit.id.clone()).or_insert(0.0) += 1.0 / (RRF_K + (rank + 1) as f64);
        payloads
            .entry(hit.id.clone())
            .or_insert_with(|| hit.payload.clone());
    }
    for (rank, point) in text.iter().enumerate() {
        *scores.entry(point.id.clone()).or_insert(0.0) += 1.0 / (RRF_K + (rank + 1) as f64);
        payloads
            .entry(point.id.clone())
            .or_insert_with(|| point.payload.clone().unwrap_or_default());
    }

    let mut fused: Vec<SearchHit> = scores
        .into_iter()
        .map(|(id, score)| {
            let payload = payloads.remove(&id).unwrap_or_default();
            SearchHit { id, score, payload }
        })
        .collect();
    fused.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    fused
}
