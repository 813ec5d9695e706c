//! Bounded query-embedding cache (§8 round-trip property: "Embedding an
//! already-cached query text returns the cached vector without a second
//! client call"). An explicit, invalidatable object rather than a hidden
//! module-level static, per §9's "no hidden module-level mutable state".

use std::collections::HashMap;
use std::sync::Mutex;

use crate::EmbeddingClient;
use common::EngineError;

struct LruState {
    map: HashMap<String, Vec<f32>>,
    order: Vec<String>,
    capacity: usize,
}

impl LruState {
    fn touch(&mut self, key: &str) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            let k = self.order.remove(pos);
            self.order.push(k);
        }
    }

    fn insert(&mut self, key: String, value: Vec<f32>) {
        if self.map.contains_key(&key) {
            self.map.insert(key.clone(), value);
            self.touch(&key);
            return;
        }
        if self.order.len() >= self.capacity {
            if let Some(evicted) = if self.order.is_empty() {
                None
            } else {
                Some(self.order.remove(0))
            } {
                self.map.remove(&evicted);
            }
        }
        self.order.push(key.clone());
        self.map.insert(key, value);
    }
}

/// Wraps any `EmbeddingClient` with an exact-text LRU cache for single-text
/// queries. Batch embedding (ingestion-style calls) bypasses the cache.
pub struct CachedEmbeddingClient<C: EmbeddingClient> {
    inner: C,
    state: Mutex<LruState>,
}

impl<C: EmbeddingClient> CachedEmbeddingClient<C> {
    pub fn new(inner: C, capacity: usize) -> Self {
        Self {
            inner,
            state: Mutex::new(LruState {
                map: HashMap::new(),
                order: Vec::new(),
                capacity: capacity.max(1),
            }),
        }
    }

    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EngineError> {
        if let Some(hit) = {
            let mut guard = self.state.lock().expect("embedding cache lock poisoned");
            if guard.map.contains_key(text) {
                guard.touch(text);
                guard.map.get(text).cloned()
            } else {
                None
            }
        } {
            return Ok(hit);
        }

        let embedding = self.inner.embed_one(text).await?;
        {
            let mut guard = self.state.lock().expect("embedding cache lock poisoned");
            guard.insert(text.to_string(), embedding.clone());
        }
        Ok(embedding)
    }

    /// Explicit invalidation entry point; no query-path caller needs it, but
    /// it exists so the cache is never a hidden, un-invalidatable static.
    pub fn invalidate(&self, text: &str) {
        let mut guard = self.state.lock().expect("embedding cache lock poisoned");
        guard.map.remove(text);
        guard.order.retain(|k| k != text);
    }

    pub fn dimension(&self) -> usize {
        self.inner.dimension()
    }
}

/// Lets a `CachedEmbeddingClient` stand in anywhere a `&dyn EmbeddingClient`
/// is expected (e.g. route orchestrators embedding sub-question or community
/// text that isn't the top-level query). Batch calls bypass the cache, as
/// documented above; only `embed_query` is cache-aware.
#[async_trait::async_trait]
impl<C: EmbeddingClient> EmbeddingClient for CachedEmbeddingClient<C> {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EngineError> {
        self.inner.embed_batch(texts).await
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HashedEmbeddingClient;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingClient {
        inner: HashedEmbeddingClient,
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl EmbeddingClient for CountingClient {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EngineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.embed_batch(texts).await
        }

        fn dimension(&self) -> usize {
            self.inner.dimension()
        }
    }

    #[tokio::test]
    async fn repeated_query_text_hits_cache() {
        let counting = CountingClient {
            inner: HashedEmbeddingClient::new(8),
            calls: AtomicUsize::new(0),
        };
        let cache = CachedEmbeddingClient::new(counting, 8);

        let a = cache.embed_query("what is the invoice total").await.unwrap();
        let b = cache.embed_query("what is the invoice total").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(cache.inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalidate_forces_recompute() {
        let counting = CountingClient {
            inner: HashedEmbeddingClient::new(8),
            calls: AtomicUsize::new(0),
        };
        let cache = CachedEmbeddingClient::new(counting, 8);
        cache.embed_query("hello").await.unwrap();
        cache.invalidate("hello");
        cache.embed_query("hello").await.unwrap();
        assert_eq!(cache.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn capacity_evicts_oldest() {
        let counting = CountingClient {
            inner: HashedEmbeddingClient::new(4),
            calls: AtomicUsize::new(0),
        };
        let cache = CachedEmbeddingClient::new(counting, 2);
        cache.embed_query("a").await.unwrap();
        cache.embed_query("b").await.unwrap();
        cache.embed_query("c").await.unwrap(); // evicts "a"
        cache.embed_query("a").await.unwrap(); // recompute
        assert_eq!(cache.inner.calls.load(Ordering::SeqCst), 4);
    }
}
