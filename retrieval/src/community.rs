//! Community matcher (§4.4.2): cosine-matches the query against cached
//! community summaries, re-embedding (or excluding) any community whose
//! `embedding_text_hash` no longer matches its `summary` (property 6).

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use common::model::Community;
use embedding_client::EmbeddingClient;
use graph_adapter::{AdapterError, Cancellable, GraphStore};

use crate::util::cosine;

/// Process-scoped, read-mostly community cache with an explicit
/// invalidation entry point (§5 "Caches", §9 "no hidden module-level
/// mutable state").
pub struct CommunityCache {
    inner: RwLock<Option<Vec<Community>>>,
}

impl Default for CommunityCache {
    fn default() -> Self {
        Self::new()
    }
}

impl CommunityCache {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(None),
        }
    }

    pub async fn invalidate(&self) {
        let mut guard = self.inner.write().await;
        *guard = None;
    }

    /// Loads communities once per process, re-embedding (via `embedder`) any
    /// whose `embedding_text_hash` disagrees with the hash of its current
    /// `summary` (stale-embedding guard). Re-embedded communities are not
    /// persisted back to the store here — persistence is the ingestion
    /// subsystem's job; this cache only ensures the in-process copy is never
    /// scored against a stale vector.
    async fn load(
        &self,
        store: &dyn GraphStore,
        embedder: &dyn EmbeddingClient,
        cancel: &CancellationToken,
    ) -> Result<Vec<Community>, AdapterError> {
        {
            let guard = self.inner.read().await;
            if let Some(cached) = guard.as_ref() {
                return Ok(cached.clone());
            }
        }

        let fetched = match store.fetch_communities(cancel).await? {
            Cancellable::Ready(v) => v,
            Cancellable::Cancelled => return Ok(Vec::new()),
        };

        let mut fresh = Vec::with_capacity(fetched.len());
        for mut community in fetched {
            if community.is_stale() {
                warn!(community_id = %community.community_id, "stale community embedding detected, re-embedding");
                match embedder.embed_one(&community.summary).await {
                    Ok(embedding) => {
                        community.summary_embedding = embedding;
                        community.embedding_text_hash = Community::hash_summary(&community.summary);
                    }
                    Err(e) => {
                        warn!(community_id = %community.community_id, error = %e, "re-embedding failed, excluding community");
                        continue;
                    }
                }
            }
            fresh.push(community);
        }

        let mut guard = self.inner.write().await;
        *guard = Some(fresh.clone());
        Ok(fresh)
    }
}

#[derive(Debug, Clone)]
pub struct MatchedCommunity {
    pub community: Community,
    pub score: f32,
}

pub struct CommunityMatcher<'a> {
    store: &'a dyn GraphStore,
    embedder: &'a dyn EmbeddingClient,
    cache: &'a CommunityCache,
}

impl<'a> CommunityMatcher<'a> {
    pub fn new(store: &'a dyn GraphStore, embedder: &'a dyn EmbeddingClient, cache: &'a CommunityCache) -> Self {
        Self { store, embedder, cache }
    }

    pub async fn match_query(
        &self,
        query_embedding: &[f32],
        min_score: f32,
        top_k: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<MatchedCommunity>, AdapterError> {
        let communities = self.cache.load(self.store, self.embedder, cancel).await?;

        let mut matched: Vec<MatchedCommunity> = communities
            .into_iter()
            .map(|community| {
                let score = cosine(query_embedding, &community.summary_embedding);
                MatchedCommunity { community, score }
            })
            .filter(|m| m.score >= min_score)
            .collect();

        matched.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.community.community_id.cmp(&b.community.community_id))
        });
        matched.truncate(top_k);
        Ok(matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedding_client::HashedEmbeddingClient;
    use graph_adapter::{BeamHit, ChunkHit, EntityScore, FetchedChunk, MentionHit, PprConfig, SeedScores, VectorHit};
    use common::model::{Entity, Relationship};

    struct FakeStore {
        communities: Vec<Community>,
    }

    #[async_trait::async_trait]
    impl GraphStore for FakeStore {
        async fn fetch_chunks(&self, _: &[String], _: &CancellationToken) -> Result<Cancellable<Vec<FetchedChunk>>, AdapterError> { Ok(Cancellable::Ready(vec![])) }
        async fn vector_search_sentences(&self, _: &[f32], _: usize, _: f32, _: &CancellationToken) -> Result<Cancellable<Vec<VectorHit>>, AdapterError> { Ok(Cancellable::Ready(vec![])) }
        async fn vector_search_chunks(&self, _: &[f32], _: usize, _: f32, _: &CancellationToken) -> Result<Cancellable<Vec<ChunkHit>>, AdapterError> { Ok(Cancellable::Ready(vec![])) }
        async fn bm25_search_chunks(&self, _: &str, _: usize, _: &CancellationToken) -> Result<Cancellable<Vec<ChunkHit>>, AdapterError> { Ok(Cancellable::Ready(vec![])) }
        async fn mentions_to_chunks(&self, _: &[String], _: usize, _: &CancellationToken) -> Result<Cancellable<Vec<MentionHit>>, AdapterError> { Ok(Cancellable::Ready(vec![])) }
        async fn expand_relationships(&self, _: &[String], _: usize, _: &CancellationToken) -> Result<Cancellable<Vec<Relationship>>, AdapterError> { Ok(Cancellable::Ready(vec![])) }
        async fn ppr_traverse(&self, _: &SeedScores, _: &PprConfig, _: &CancellationToken) -> Result<Cancellable<Vec<EntityScore>>, AdapterError> { Ok(Cancellable::Ready(vec![])) }
        async fn beam_expand(&self, _: &[String], _: &[f32], _: usize, _: usize, _: &CancellationToken) -> Result<Cancellable<Vec<BeamHit>>, AdapterError> { Ok(Cancellable::Ready(vec![])) }
        async fn fetch_communities(&self, _: &CancellationToken) -> Result<Cancellable<Vec<Community>>, AdapterError> { Ok(Cancellable::Ready(self.communities.clone())) }
        async fn fetch_entity_descriptions(&self, _: &[String], _: &CancellationToken) -> Result<Cancellable<Vec<(String, String)>>, AdapterError> { Ok(Cancellable::Ready(vec![])) }
        async fn vector_search_entities(&self, _: &[f32], _: usize, _: &CancellationToken) -> Result<Cancellable<Vec<Entity>>, AdapterError> { Ok(Cancellable::Ready(vec![])) }
        async fn find_entities_by_name(&self, _: &[String], _: &CancellationToken) -> Result<Cancellable<Vec<Entity>>, AdapterError> { Ok(Cancellable::Ready(vec![])) }
        async fn fetch_entities_by_id(&self, _: &[String], _: &CancellationToken) -> Result<Cancellable<Vec<Entity>>, AdapterError> { Ok(Cancellable::Ready(vec![])) }
        async fn list_documents(&self, _: &CancellationToken) -> Result<Cancellable<Vec<common::model::Document>>, AdapterError> { Ok(Cancellable::Ready(vec![])) }
        async fn fetch_lead_chunk(&self, _: &str, _: &CancellationToken) -> Result<Cancellable<Option<common::model::TextChunk>>, AdapterError> { Ok(Cancellable::Ready(None)) }
    }

    fn community(id: &str, embedding: Vec<f32>) -> Community {
        let summary = format!("summary for {id}");
        Community {
            community_id: id.to_string(),
            title: id.to_string(),
            summary: summary.clone(),
            summary_embedding: embedding,
            member_entity_ids: vec!["e1".into(), "e2".into()],
            embedding_text_hash: Community::hash_summary(&summary),
        }
    }

    #[tokio::test]
    async fn stale_community_is_reembedded_not_scored_against_stale_vector() {
        let mut stale = community("c1", vec![1.0, 0.0, 0.0]);
        stale.embedding_text_hash = "deliberately-wrong-hash".to_string();
        let store = FakeStore { communities: vec![stale] };
        let embedder = HashedEmbeddingClient::new(3);
        let cache = CommunityCache::new();
        let matcher = CommunityMatcher::new(&store, &embedder, &cache);
        let cancel = CancellationToken::new();

        let query_embedding = embedder.embed_one("summary for c1").await.unwrap();
        let out = matcher.match_query(&query_embedding, 0.0, 5, &cancel).await.unwrap();
        assert_eq!(out.len(), 1);
        // re-embedded vector should equal a fresh embed of the summary text
        assert_eq!(out[0].community.summary_embedding, query_embedding);
    }

    #[tokio::test]
    async fn min_score_filters_and_cache_serves_second_call() {
        let store = FakeStore {
            communities: vec![community("c1", vec![1.0, 0.0, 0.0]), community("c2", vec![0.0, 1.0, 0.0])],
        };
        let embedder = HashedEmbeddingClient::new(3);
        let cache = CommunityCache::new();
        let matcher = CommunityMatcher::new(&store, &embedder, &cache);
        let cancel = CancellationToken::new();

        let query_embedding = vec![1.0, 0.0, 0.0];
        let first = matcher.match_query(&query_embedding, 0.5, 5, &cancel).await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].community.community_id, "c1");

        let second = matcher.match_query(&query_embedding, 0.5, 5, &cancel).await.unwrap();
        assert_eq!(second.len(), 1);
    }
}
