//! Bounded-concurrency `GraphStore` decorator (§5: "bounded concurrency,
//! default 16"). Wraps any `GraphStore` and gates every call behind a shared
//! semaphore so a single query's fan-out (or many concurrent queries) can
//! never exceed the configured number of in-flight graph operations.

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use common::model::{Community, Document, Entity, Relationship, TextChunk};
use graph_adapter::{
    AdapterError, BeamHit, Cancellable, ChunkHit, EntityScore, FetchedChunk, GraphStore, MentionHit, PprConfig,
    SeedScores, VectorHit,
};

pub struct BoundedGraphStore<'a> {
    inner: &'a dyn GraphStore,
    permits: Semaphore,
}

impl<'a> BoundedGraphStore<'a> {
    pub fn new(inner: &'a dyn GraphStore, max_concurrency: usize) -> Self {
        Self {
            inner,
            permits: Semaphore::new(max_concurrency.max(1)),
        }
    }

    async fn acquire(&self) -> Result<tokio::sync::SemaphorePermit<'_>, AdapterError> {
        self.permits
            .acquire()
            .await
            .map_err(|e| AdapterError::Fatal(format!("concurrency semaphore closed: {e}")))
    }
}

#[async_trait]
impl<'a> GraphStore for BoundedGraphStore<'a> {
    async fn fetch_chunks(
        &self,
        chunk_ids: &[String],
        cancel: &CancellationToken,
    ) -> Result<Cancellable<Vec<FetchedChunk>>, AdapterError> {
        let _permit = self.acquire().await?;
        self.inner.fetch_chunks(chunk_ids, cancel).await
    }

    async fn vector_search_sentences(
        &self,
        embedding: &[f32],
        k: usize,
        min_score: f32,
        cancel: &CancellationToken,
    ) -> Result<Cancellable<Vec<VectorHit>>, AdapterError> {
        let _permit = self.acquire().await?;
        self.inner.vector_search_sentences(embedding, k, min_score, cancel).await
    }

    async fn vector_search_chunks(
        &self,
        embedding: &[f32],
        k: usize,
        min_score: f32,
        cancel: &CancellationToken,
    ) -> Result<Cancellable<Vec<ChunkHit>>, AdapterError> {
        let _permit = self.acquire().await?;
        self.inner.vector_search_chunks(embedding, k, min_score, cancel).await
    }

    async fn bm25_search_chunks(
        &self,
        query_text: &str,
        k: usize,
        cancel: &CancellationToken,
    ) -> Result<Cancellable<Vec<ChunkHit>>, AdapterError> {
        let _permit = self.acquire().await?;
        self.inner.bm25_search_chunks(query_text, k, cancel).await
    }

    async fn mentions_to_chunks(
        &self,
        entity_names: &[String],
        limit_per_entity: usize,
        cancel: &CancellationToken,
    ) -> Result<Cancellable<Vec<MentionHit>>, AdapterError> {
        let _permit = self.acquire().await?;
        self.inner.mentions_to_chunks(entity_names, limit_per_entity, cancel).await
    }

    async fn expand_relationships(
        &self,
        entity_ids: &[String],
        max_edges: usize,
        cancel: &CancellationToken,
    ) -> Result<Cancellable<Vec<Relationship>>, AdapterError> {
        let _permit = self.acquire().await?;
        self.inner.expand_relationships(entity_ids, max_edges, cancel).await
    }

    async fn ppr_traverse(
        &self,
        seed_scores: &SeedScores,
        config: &PprConfig,
        cancel: &CancellationToken,
    ) -> Result<Cancellable<Vec<EntityScore>>, AdapterError> {
        let _permit = self.acquire().await?;
        self.inner.ppr_traverse(seed_scores, config, cancel).await
    }

    async fn beam_expand(
        &self,
        seed_entity_ids: &[String],
        query_embedding: &[f32],
        hops: usize,
        beam_width: usize,
        cancel: &CancellationToken,
    ) -> Result<Cancellable<Vec<BeamHit>>, AdapterError> {
        let _permit = self.acquire().await?;
        self.inner
            .beam_expand(seed_entity_ids, query_embedding, hops, beam_width, cancel)
            .await
    }

    async fn fetch_communities(&self, cancel: &CancellationToken) -> Result<Cancellable<Vec<Community>>, AdapterError> {
        let _permit = self.acquire().await?;
        self.inner.fetch_communities(cancel).await
    }

    async fn fetch_entity_descriptions(
        &self,
        entity_ids: &[String],
        cancel: &CancellationToken,
    ) -> Result<Cancellable<Vec<(String, String)>>, AdapterError> {
        let _permit = self.acquire().await?;
        self.inner.fetch_entity_descriptions(entity_ids, cancel).await
    }

    async fn vector_search_entities(
        &self,
        embedding: &[f32],
        k: usize,
        cancel: &CancellationToken,
    ) -> Result<Cancellable<Vec<Entity>>, AdapterError> {
        let _permit = self.acquire().await?;
        self.inner.vector_search_entities(embedding, k, cancel).await
    }

    async fn find_entities_by_name(
        &self,
        names: &[String],
        cancel: &CancellationToken,
    ) -> Result<Cancellable<Vec<Entity>>, AdapterError> {
        let _permit = self.acquire().await?;
        self.inner.find_entities_by_name(names, cancel).await
    }

    async fn fetch_entities_by_id(
        &self,
        entity_ids: &[String],
        cancel: &CancellationToken,
    ) -> Result<Cancellable<Vec<Entity>>, AdapterError> {
        let _permit = self.acquire().await?;
        self.inner.fetch_entities_by_id(entity_ids, cancel).await
    }

    async fn list_documents(&self, cancel: &CancellationToken) -> Result<Cancellable<Vec<Document>>, AdapterError> {
        let _permit = self.acquire().await?;
        self.inner.list_documents(cancel).await
    }

    async fn fetch_lead_chunk(
        &self,
        doc_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Cancellable<Option<TextChunk>>, AdapterError> {
        let _permit = self.acquire().await?;
        self.inner.fetch_lead_chunk(doc_id, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingStore {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl GraphStore for CountingStore {
        async fn fetch_chunks(&self, _: &[String], _: &CancellationToken) -> Result<Cancellable<Vec<FetchedChunk>>, AdapterError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Cancellable::Ready(vec![]))
        }
        async fn vector_search_sentences(&self, _: &[f32], _: usize, _: f32, _: &CancellationToken) -> Result<Cancellable<Vec<VectorHit>>, AdapterError> { Ok(Cancellable::Ready(vec![])) }
        async fn vector_search_chunks(&self, _: &[f32], _: usize, _: f32, _: &CancellationToken) -> Result<Cancellable<Vec<ChunkHit>>, AdapterError> { Ok(Cancellable::Ready(vec![])) }
        async fn bm25_search_chunks(&self, _: &str, _: usize, _: &CancellationToken) -> Result<Cancellable<Vec<ChunkHit>>, AdapterError> { Ok(Cancellable::Ready(vec![])) }
        async fn mentions_to_chunks(&self, _: &[String], _: usize, _: &CancellationToken) -> Result<Cancellable<Vec<MentionHit>>, AdapterError> { Ok(Cancellable::Ready(vec![])) }
        async fn expand_relationships(&self, _: &[String], _: usize, _: &CancellationToken) -> Result<Cancellable<Vec<Relationship>>, AdapterError> { Ok(Cancellable::Ready(vec![])) }
        async fn ppr_traverse(&self, _: &SeedScores, _: &PprConfig, _: &CancellationToken) -> Result<Cancellable<Vec<EntityScore>>, AdapterError> { Ok(Cancellable::Ready(vec![])) }
        async fn beam_expand(&self, _: &[String], _: &[f32], _: usize, _: usize, _: &CancellationToken) -> Result<Cancellable<Vec<BeamHit>>, AdapterError> { Ok(Cancellable::Ready(vec![])) }
        async fn fetch_communities(&self, _: &CancellationToken) -> Result<Cancellable<Vec<Community>>, AdapterError> { Ok(Cancellable::Ready(vec![])) }
        async fn fetch_entity_descriptions(&self, _: &[String], _: &CancellationToken) -> Result<Cancellable<Vec<(String, String)>>, AdapterError> { Ok(Cancellable::Ready(vec![])) }
        async fn vector_search_entities(&self, _: &[f32], _: usize, _: &CancellationToken) -> Result<Cancellable<Vec<Entity>>, AdapterError> { Ok(Cancellable::Ready(vec![])) }
        async fn find_entities_by_name(&self, _: &[String], _: &CancellationToken) -> Result<Cancellable<Vec<Entity>>, AdapterError> { Ok(Cancellable::Ready(vec![])) }
        async fn fetch_entities_by_id(&self, _: &[String], _: &CancellationToken) -> Result<Cancellable<Vec<Entity>>, AdapterError> { Ok(Cancellable::Ready(vec![])) }
        async fn list_documents(&self, _: &CancellationToken) -> Result<Cancellable<Vec<Document>>, AdapterError> { Ok(Cancellable::Ready(vec![])) }
        async fn fetch_lead_chunk(&self, _: &str, _: &CancellationToken) -> Result<Cancellable<Option<TextChunk>>, AdapterError> { Ok(Cancellable::Ready(None)) }
    }

    #[tokio::test]
    async fn wraps_without_changing_behavior() {
        let store = CountingStore { calls: AtomicUsize::new(0) };
        let bounded = BoundedGraphStore::new(&store, 4);
        let cancel = CancellationToken::new();
        let result = bounded.fetch_chunks(&[], &cancel).await.unwrap();
        assert!(matches!(result, Cancellable::Ready(_)));
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn semaphore_bounds_concurrent_in_flight_calls() {
        let store = CountingStore { calls: AtomicUsize::new(0) };
        let bounded = BoundedGraphStore::new(&store, 2);
        let cancel = CancellationToken::new();
        let (a, b, c) = tokio::join!(
            bounded.fetch_chunks(&[], &cancel),
            bounded.fetch_chunks(&[], &cancel),
            bounded.fetch_chunks(&[], &cancel),
        );
        assert!(a.is_ok() && b.is_ok() && c.is_ok());
        assert_eq!(store.calls.load(Ordering::SeqCst), 3);
    }
}
