#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use mnemo::embedding::{EmbedOutput, EmbeddingEngine, EmbeddingProvider, VectorSpace};

/// Deterministic in-process embedding provider: the vector is a function of
/// text length, so tests never touch a network or a model file.
pub struct StubProvider {
    pub dual: bool,
    pub calls: AtomicU64,
}

impl StubProvider {
    pub fn new(dual: bool) -> Self {
        Self {
            dual,
            calls: AtomicU64::new(0),
        }
    }

    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for StubProvider {
    fn model_id(&self, space: VectorSpace) -> &str {
        match space {
            VectorSpace::Small => "stub-small",
            VectorSpace::Large => "stub-large",
        }
    }

    fn dims(&self, space: VectorSpace) -> usize {
        match (self.dual, space) {
            (true, VectorSpace::Large) => 16,
            _ => 8,
        }
    }

    fn dual_native(&self) -> bool {
        self.dual
    }

    async fn embed(&self, text: &str, space: VectorSpace) -> Result<EmbedOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let dims = self.dims(space);
        let seed = (text.len() % 97) as f32;
        Ok(EmbedOutput {
            vector: (0..dims).map(|i| seed + i as f32 * 0.5).collect(),
            tokens: (text.len() / 4) as u64,
            cost_usd: 0.0,
        })
    }
}

/// Engine over a stub provider with a small cache.
pub fn stub_engine(dual: bool, cache_capacity: usize) -> (EmbeddingEngine, Arc<StubProvider>) {
    let provider = Arc::new(StubProvider::new(dual));
    let engine = EmbeddingEngine::new(provider.clone(), cache_capacity, 1000, 200);
    (engine, provider)
}
