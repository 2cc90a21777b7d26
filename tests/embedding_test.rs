//! Embedding engine behavior over a stub provider: caching, dual-vector
//! semantics, chunked generation, and usage accounting.

mod helpers;

use helpers::stub_engine;
use mnemo::embedding::is_valid_vector;

#[tokio::test]
async fn lru_eviction_after_capacity_plus_one_distinct_keys() {
    // Access M+1 distinct keys once each: the first becomes a miss again,
    // the last stays a hit.
    let capacity = 6;
    let (engine, provider) = stub_engine(false, capacity);

    for i in 0..=capacity {
        engine.generate(&format!("distinct key number {i}")).await.unwrap();
    }
    let baseline = provider.call_count();

    engine
        .generate(&format!("distinct key number {capacity}"))
        .await
        .unwrap();
    assert_eq!(provider.call_count(), baseline, "newest key must be a hit");

    engine.generate("distinct key number 0").await.unwrap();
    assert_eq!(
        provider.call_count(),
        baseline + 1,
        "oldest key must have been evicted"
    );
}

#[tokio::test]
async fn dual_provider_produces_both_spaces() {
    let (engine, provider) = stub_engine(true, 32);
    let pair = engine.generate("some knowledge worth keeping").await.unwrap();

    assert!(is_valid_vector(&pair.small, 8));
    assert!(is_valid_vector(&pair.large, 16));
    // One backend call per space.
    assert_eq!(provider.call_count(), 2);
}

#[tokio::test]
async fn single_vector_provider_fills_both_slots_with_one_call() {
    let (engine, provider) = stub_engine(false, 32);
    let pair = engine.generate("local inference text").await.unwrap();

    assert_eq!(pair.small, pair.large);
    assert_eq!(provider.call_count(), 1);
}

#[tokio::test]
async fn small_and_large_cache_entries_do_not_collide() {
    let (engine, provider) = stub_engine(true, 32);
    engine.generate("collision check").await.unwrap();
    engine.generate("collision check").await.unwrap();

    // Second generation is fully cached; each space kept its own entry.
    assert_eq!(provider.call_count(), 2);
    let stats = engine.stats();
    assert_eq!(stats.cache_misses, 2);
    assert_eq!(stats.cache_hits, 2);
}

#[tokio::test]
async fn chunked_generation_has_contiguous_indices_and_shared_total() {
    let (engine, _) = stub_engine(false, 256);
    let text = "sentence about the system under test ".repeat(80);
    assert!(text.chars().count() > 1000);

    let chunks = engine.generate_chunked(&text).await.unwrap();
    assert!(chunks.len() >= 2);

    let total = chunks.len();
    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.index, i);
        assert_eq!(chunk.total, total);
        assert!(!chunk.text.is_empty());
        assert!(is_valid_vector(&chunk.small, 8));
    }
    // The final window ends exactly at the end of the input.
    assert!(text.ends_with(chunks.last().unwrap().text.as_str()));
}

#[tokio::test]
async fn stats_report_hit_rate() {
    let (engine, _) = stub_engine(false, 32);
    engine.generate("alpha").await.unwrap();
    engine.generate("alpha").await.unwrap();
    engine.generate("beta-longer").await.unwrap();

    let stats = engine.stats();
    assert_eq!(stats.total_requests, 3);
    assert_eq!(stats.cache_hits, 1);
    assert_eq!(stats.cache_misses, 2);
    assert!((stats.cache_hit_rate - 1.0 / 3.0).abs() < 1e-9);
}
