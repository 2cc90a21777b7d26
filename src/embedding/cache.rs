//! Bounded LRU cache for embedding vectors.
//!
//! Keys are SHA-256 digests of `(model, dims, text)` so the same text embedded
//! under different models or target dimensions never collides. Hits promote
//! the entry to most-recently-used in O(1); inserts at capacity evict the
//! least-recently-used entry first.

use lru::LruCache;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::time::Instant;

/// A cached vector with per-entry bookkeeping.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub vector: Vec<f32>,
    pub hits: u64,
    pub last_hit: Instant,
}

pub struct EmbeddingCache {
    entries: LruCache<String, CacheEntry>,
}

impl EmbeddingCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("capacity is at least 1");
        Self {
            entries: LruCache::new(capacity),
        }
    }

    /// Look up a key, promoting it to most-recently-used on hit.
    pub fn get(&mut self, key: &str) -> Option<Vec<f32>> {
        let entry = self.entries.get_mut(key)?;
        entry.hits += 1;
        entry.last_hit = Instant::now();
        Some(entry.vector.clone())
    }

    /// Insert a vector, evicting the least-recently-used entry at capacity.
    /// Concurrent misses on one key may insert twice; the second write wins.
    pub fn insert(&mut self, key: String, vector: Vec<f32>) {
        self.entries.push(
            key,
            CacheEntry {
                vector,
                hits: 0,
                last_hit: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Cache key: SHA-256 over model id, target dimension, and the text.
pub fn cache_key(model: &str, dims: usize, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(model.as_bytes());
    hasher.update(b"\x1f");
    hasher.update(dims.to_string().as_bytes());
    hasher.update(b"\x1f");
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_returns_vector_and_counts() {
        let mut cache = EmbeddingCache::new(4);
        let key = cache_key("model", 384, "hello");
        assert!(cache.get(&key).is_none());
        cache.insert(key.clone(), vec![1.0, 2.0]);
        assert_eq!(cache.get(&key), Some(vec![1.0, 2.0]));
        assert_eq!(cache.get(&key), Some(vec![1.0, 2.0]));
    }

    #[test]
    fn keys_differ_by_model_and_dims() {
        let a = cache_key("text-embedding-3-small", 1536, "same text");
        let b = cache_key("text-embedding-3-large", 1536, "same text");
        let c = cache_key("text-embedding-3-small", 512, "same text");
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(b, c);
    }

    #[test]
    fn key_separator_prevents_concatenation_collisions() {
        assert_ne!(cache_key("m", 12, "3text"), cache_key("m", 123, "text"));
        assert_ne!(cache_key("m1", 2, "t"), cache_key("m", 12, "t"));
    }

    #[test]
    fn filling_past_capacity_evicts_oldest() {
        let capacity = 8;
        let mut cache = EmbeddingCache::new(capacity);
        let keys: Vec<String> = (0..=capacity)
            .map(|i| cache_key("m", 4, &format!("text-{i}")))
            .collect();
        for (i, key) in keys.iter().enumerate() {
            cache.insert(key.clone(), vec![i as f32]);
        }
        // First key was least-recently-used and got evicted; last key is hot.
        assert!(cache.get(&keys[0]).is_none());
        assert_eq!(cache.get(&keys[capacity]), Some(vec![capacity as f32]));
        assert_eq!(cache.len(), capacity);
    }

    #[test]
    fn get_promotes_against_eviction() {
        let mut cache = EmbeddingCache::new(2);
        cache.insert("a".into(), vec![1.0]);
        cache.insert("b".into(), vec![2.0]);
        // Touch "a" so "b" becomes LRU
        assert!(cache.get("a").is_some());
        cache.insert("c".into(), vec![3.0]);
        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
    }

    #[test]
    fn double_insert_replaces() {
        let mut cache = EmbeddingCache::new(2);
        cache.insert("k".into(), vec![1.0]);
        cache.insert("k".into(), vec![2.0]);
        assert_eq!(cache.get("k"), Some(vec![2.0]));
        assert_eq!(cache.len(), 1);
    }
}
