//! Text-to-vector embedding engine.
//!
//! The engine produces a pair of dense vectors per text — a small vector for
//! the `dense` space and a large one for `dense_large` — through a provider
//! abstraction. The remote provider calls the OpenAI embeddings API (both
//! spaces concurrently); the local provider runs an ONNX model on CPU and
//! reuses one vector for both slots. Every lookup goes through a bounded LRU
//! cache, and token/cost usage is accumulated for the status tool.

pub mod cache;
pub mod local;
pub mod remote;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::{Arc, Mutex};

use crate::chunk::{chunk_text, ChunkWindow};
use crate::config::{MnemoConfig, ProviderKind};
use cache::{cache_key, EmbeddingCache};

/// Which of the two named vector spaces a call targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorSpace {
    Small,
    Large,
}

/// One provider call's result: the vector plus its usage accounting.
#[derive(Debug, Clone)]
pub struct EmbedOutput {
    pub vector: Vec<f32>,
    pub tokens: u64,
    pub cost_usd: f64,
}

/// A small/large vector pair for one text.
#[derive(Debug, Clone)]
pub struct DualEmbedding {
    pub small: Vec<f32>,
    pub large: Vec<f32>,
}

/// One chunk of a long document with its small vector. The caller generates
/// the large vector per chunk on demand.
#[derive(Debug, Clone)]
pub struct EmbeddedChunk {
    pub index: usize,
    pub total: usize,
    pub text: String,
    pub small: Vec<f32>,
}

/// Backend that turns text into a vector for a given space.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Model identifier for `space`, used in cache keys and logs.
    fn model_id(&self, space: VectorSpace) -> &str;
    /// Output dimension for `space`.
    fn dims(&self, space: VectorSpace) -> usize;
    /// Whether the provider produces genuinely distinct small/large vectors.
    fn dual_native(&self) -> bool;
    async fn embed(&self, text: &str, space: VectorSpace) -> Result<EmbedOutput>;
}

/// Cumulative usage counters, exposed through `memory-status`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EmbeddingStats {
    pub total_requests: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub total_tokens: u64,
    pub estimated_cost_usd: f64,
    pub cache_hit_rate: f64,
}

#[derive(Debug, Default)]
struct UsageCounters {
    total_requests: u64,
    cache_hits: u64,
    cache_misses: u64,
    total_tokens: u64,
    estimated_cost_usd: f64,
}

/// Provider-backed engine with caching and cost accounting. One per process.
pub struct EmbeddingEngine {
    provider: Arc<dyn EmbeddingProvider>,
    cache: Mutex<EmbeddingCache>,
    usage: Mutex<UsageCounters>,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl EmbeddingEngine {
    /// Build the engine for whichever provider the config selects.
    pub fn from_config(config: &MnemoConfig) -> Result<Self> {
        let provider: Arc<dyn EmbeddingProvider> = match config.provider_kind() {
            ProviderKind::Remote => Arc::new(remote::RemoteProvider::new(&config.embedding)?),
            ProviderKind::Local => Arc::new(local::LocalProvider::new(
                &config.embedding,
                config.resolved_model_cache_dir(),
            )),
        };
        Ok(Self::new(
            provider,
            config.embedding.cache_capacity,
            config.chunking.chunk_size,
            config.chunking.chunk_overlap,
        ))
    }

    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        cache_capacity: usize,
        chunk_size: usize,
        chunk_overlap: usize,
    ) -> Self {
        Self {
            provider,
            cache: Mutex::new(EmbeddingCache::new(cache_capacity)),
            usage: Mutex::new(UsageCounters::default()),
            chunk_size,
            chunk_overlap,
        }
    }

    pub fn small_dims(&self) -> usize {
        self.provider.dims(VectorSpace::Small)
    }

    pub fn large_dims(&self) -> usize {
        self.provider.dims(VectorSpace::Large)
    }

    /// Produce the small/large pair for one text.
    ///
    /// Remote providers embed both spaces concurrently and the whole call
    /// fails if either side fails. Local providers compute once and reuse the
    /// vector for both slots.
    pub async fn generate(&self, text: &str) -> Result<DualEmbedding> {
        if self.provider.dual_native() {
            let (small, large) = tokio::join!(
                self.embed_cached(text, VectorSpace::Small),
                self.embed_cached(text, VectorSpace::Large),
            );
            Ok(DualEmbedding {
                small: small?,
                large: large?,
            })
        } else {
            let vector = self.embed_cached(text, VectorSpace::Small).await?;
            Ok(DualEmbedding {
                large: vector.clone(),
                small: vector,
            })
        }
    }

    /// Embed one text for one space.
    pub async fn generate_for_space(&self, text: &str, space: VectorSpace) -> Result<Vec<f32>> {
        if space == VectorSpace::Large && !self.provider.dual_native() {
            // Single-vector providers serve the large slot from the small one.
            return self.embed_cached(text, VectorSpace::Small).await;
        }
        self.embed_cached(text, space).await
    }

    /// Split long content into overlapping windows and embed each window's
    /// small vector.
    pub async fn generate_chunked(&self, text: &str) -> Result<Vec<EmbeddedChunk>> {
        let windows = chunk_text(text, self.chunk_size, self.chunk_overlap);
        let mut chunks = Vec::with_capacity(windows.len());
        for ChunkWindow { index, total, text } in windows {
            let small = self.embed_cached(&text, VectorSpace::Small).await?;
            chunks.push(EmbeddedChunk {
                index,
                total,
                text,
                small,
            });
        }
        Ok(chunks)
    }

    /// Current usage counters plus the derived hit rate.
    pub fn stats(&self) -> EmbeddingStats {
        let usage = self.usage.lock().unwrap_or_else(|e| e.into_inner());
        let lookups = usage.cache_hits + usage.cache_misses;
        let cache_hit_rate = if lookups > 0 {
            usage.cache_hits as f64 / lookups as f64
        } else {
            0.0
        };
        EmbeddingStats {
            total_requests: usage.total_requests,
            cache_hits: usage.cache_hits,
            cache_misses: usage.cache_misses,
            total_tokens: usage.total_tokens,
            estimated_cost_usd: usage.estimated_cost_usd,
            cache_hit_rate,
        }
    }

    async fn embed_cached(&self, text: &str, space: VectorSpace) -> Result<Vec<f32>> {
        let key = cache_key(self.provider.model_id(space), self.provider.dims(space), text);

        {
            let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(vector) = cache.get(&key) {
                let mut usage = self.usage.lock().unwrap_or_else(|e| e.into_inner());
                usage.total_requests += 1;
                usage.cache_hits += 1;
                return Ok(vector);
            }
        }

        // Concurrent misses on the same key may both reach the backend; the
        // second insert replaces the first.
        let output = self.provider.embed(text, space).await?;

        {
            let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
            cache.insert(key, output.vector.clone());
        }
        {
            let mut usage = self.usage.lock().unwrap_or_else(|e| e.into_inner());
            usage.total_requests += 1;
            usage.cache_misses += 1;
            usage.total_tokens += output.tokens;
            usage.estimated_cost_usd += output.cost_usd;
        }

        Ok(output.vector)
    }
}

/// A vector is valid iff it has exactly `dims` components, all finite.
pub fn is_valid_vector(vector: &[f32], dims: usize) -> bool {
    vector.len() == dims && vector.iter().all(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Deterministic fake provider for engine tests.
    struct FakeProvider {
        dual: bool,
        calls: AtomicU64,
    }

    impl FakeProvider {
        fn new(dual: bool) -> Self {
            Self {
                dual,
                calls: AtomicU64::new(0),
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for FakeProvider {
        fn model_id(&self, space: VectorSpace) -> &str {
            match space {
                VectorSpace::Small => "fake-small",
                VectorSpace::Large => "fake-large",
            }
        }

        fn dims(&self, space: VectorSpace) -> usize {
            match (self.dual, space) {
                (true, VectorSpace::Large) => 8,
                _ => 4,
            }
        }

        fn dual_native(&self) -> bool {
            self.dual
        }

        async fn embed(&self, text: &str, space: VectorSpace) -> Result<EmbedOutput> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let dims = self.dims(space);
            let seed = text.len() as f32;
            Ok(EmbedOutput {
                vector: (0..dims).map(|i| seed + i as f32).collect(),
                tokens: 7,
                cost_usd: 0.001,
            })
        }
    }

    fn engine(dual: bool, capacity: usize) -> (EmbeddingEngine, Arc<FakeProvider>) {
        let provider = Arc::new(FakeProvider::new(dual));
        let engine = EmbeddingEngine::new(provider.clone(), capacity, 1000, 200);
        (engine, provider)
    }

    #[tokio::test]
    async fn dual_provider_returns_distinct_dims() {
        let (engine, _) = engine(true, 16);
        let pair = engine.generate("hello").await.unwrap();
        assert_eq!(pair.small.len(), 4);
        assert_eq!(pair.large.len(), 8);
        assert!(is_valid_vector(&pair.small, 4));
        assert!(is_valid_vector(&pair.large, 8));
    }

    #[tokio::test]
    async fn single_provider_reuses_vector() {
        let (engine, provider) = engine(false, 16);
        let pair = engine.generate("hello").await.unwrap();
        assert_eq!(pair.small, pair.large);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn repeat_generation_hits_cache() {
        let (engine, provider) = engine(true, 16);
        engine.generate("same text").await.unwrap();
        engine.generate("same text").await.unwrap();
        // Two spaces, each computed once then cached.
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
        let stats = engine.stats();
        assert_eq!(stats.cache_hits, 2);
        assert_eq!(stats.cache_misses, 2);
        assert_eq!(stats.total_requests, 4);
        assert!((stats.cache_hit_rate - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn usage_accumulates_tokens_and_cost() {
        let (engine, _) = engine(true, 16);
        engine.generate("a").await.unwrap();
        let stats = engine.stats();
        assert_eq!(stats.total_tokens, 14);
        assert!((stats.estimated_cost_usd - 0.002).abs() < 1e-9);
    }

    #[tokio::test]
    async fn lru_property_oldest_evicted_newest_kept() {
        // After M+1 distinct keys, the first is a miss again and the last a hit.
        let capacity = 5;
        let (engine, provider) = engine(false, capacity);
        for i in 0..=capacity {
            engine.generate(&format!("key-{i}")).await.unwrap();
        }
        let calls_before = provider.calls.load(Ordering::SeqCst);

        engine.generate(&format!("key-{capacity}")).await.unwrap();
        assert_eq!(provider.calls.load(Ordering::SeqCst), calls_before, "hit");

        engine.generate("key-0").await.unwrap();
        assert_eq!(
            provider.calls.load(Ordering::SeqCst),
            calls_before + 1,
            "miss"
        );
    }

    #[tokio::test]
    async fn chunked_generation_covers_text() {
        let (engine, _) = engine(false, 64);
        let text = "word ".repeat(500);
        let chunks = engine.generate_chunked(&text).await.unwrap();
        assert!(chunks.len() >= 2);
        let total = chunks.len();
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
            assert_eq!(chunk.total, total);
            assert!(is_valid_vector(&chunk.small, 4));
        }
    }

    #[tokio::test]
    async fn short_text_single_chunk() {
        let (engine, _) = engine(false, 64);
        let chunks = engine.generate_chunked("short").await.unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "short");
    }

    #[test]
    fn vector_validation() {
        assert!(is_valid_vector(&[0.0, 1.0, 2.0], 3));
        assert!(!is_valid_vector(&[0.0, 1.0], 3));
        assert!(!is_valid_vector(&[0.0, f32::NAN, 2.0], 3));
        assert!(!is_valid_vector(&[0.0, f32::INFINITY, 2.0], 3));
    }
}
