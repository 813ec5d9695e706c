//! Query dispatcher (§4.8): the process-wide entry point. Embeds the query
//! once, classifies its route unless the caller overrides it, runs the
//! chosen pipeline under a single query-scoped deadline, and hands the
//! distilled evidence to the synthesizer before assembling the response
//! envelope.

pub mod classify;
mod concurrency;

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use common::config::EngineConfig;
use common::model::{EvidenceNode, Query, QueryRequest, QueryResponse, Route};
use common::EngineError;
use embedding_client::cache::CachedEmbeddingClient;
use embedding_client::EmbeddingClient;
use graph_adapter::{AdapterError, GraphStore};
use llm_client::LlmClient;
use retrieval::community::CommunityCache;
use routes::gapfill::{GapFillMatcher, RegexGapFillMatcher};
use routes::RouteOutput;
use synthesis::Synthesizer;

use concurrency::BoundedGraphStore;

/// Bridges `graph-adapter`'s error type into the engine's own taxonomy.
/// A `From` impl isn't possible here under Rust's orphan rule (neither type
/// is owned by this crate), so this is a plain conversion function used at
/// every route-boundary `.map_err` call.
fn adapter_err_to_engine(error: AdapterError) -> EngineError {
    match error {
        AdapterError::Transient(msg) => EngineError::GraphTransient(msg),
        AdapterError::Fatal(msg) => EngineError::GraphUnavailable(msg),
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Process-wide query engine. One instance is built at startup and shared
/// (behind an `Arc`, by the caller) across every request.
pub struct Dispatcher<E: EmbeddingClient> {
    store: Box<dyn GraphStore>,
    embedder: CachedEmbeddingClient<E>,
    llm: Box<dyn LlmClient>,
    community_cache: CommunityCache,
    gap_fill_matcher: Box<dyn GapFillMatcher>,
    config: EngineConfig,
}

impl<E: EmbeddingClient> Dispatcher<E> {
    pub fn new(
        store: Box<dyn GraphStore>,
        embedder: CachedEmbeddingClient<E>,
        llm: Box<dyn LlmClient>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            llm,
            community_cache: CommunityCache::new(),
            gap_fill_matcher: Box::new(RegexGapFillMatcher::new()),
            config,
        }
    }

    /// Canonical entry point (§6): `query(QueryRequest) -> QueryResponse`.
    /// Never returns an `Err` — every failure mode is folded into the
    /// response envelope's `error`/`refused` fields.
    pub async fn query(&self, request: QueryRequest) -> QueryResponse {
        let query = Query {
            query_text: request.query_text,
            group_id: request.group_id,
            query_embedding: Vec::new(),
            route_override: request.route_override,
            deadline_ms: request.deadline_ms.unwrap_or(self.config.default_deadline_ms),
            token_budget: request.token_budget.unwrap_or(self.config.default_token_budget),
            response_type: request.response_type.unwrap_or_default(),
        };

        if let Err(msg) = query.validate() {
            return QueryResponse::failure(format!("validation error: {msg}"), HashMap::new());
        }

        let cancel = CancellationToken::new();
        let deadline = Duration::from_millis(query.deadline_ms);

        tokio::select! {
            biased;
            result = self.process(&query, &cancel) => match result {
                Ok(response) => response,
                Err(error) => Self::error_to_response(error),
            },
            () = tokio::time::sleep(deadline) => {
                cancel.cancel();
                tracing::warn!(group_id = %query.group_id, "query deadline exceeded, cancelling in-flight work");
                QueryResponse::timeout(HashMap::new())
            }
        }
    }

    async fn process(&self, query: &Query, cancel: &CancellationToken) -> Result<QueryResponse, EngineError> {
        let overall_start = Instant::now();
        let mut timings = HashMap::new();

        let embed_start = Instant::now();
        let query_embedding = self.embedder.embed_query(&query.query_text).await?;
        timings.insert("embed_ms".to_string(), elapsed_ms(embed_start));

        let route = query
            .route_override
            .unwrap_or_else(|| classify::classify_route(&query.query_text));

        let bounded_store = BoundedGraphStore::new(self.store.as_ref(), self.config.max_concurrency);

        let retrieve_start = Instant::now();
        let route_output = self
            .dispatch_route(route, &bounded_store, &query.query_text, &query_embedding, query.token_budget, cancel)
            .await
            .map_err(adapter_err_to_engine)?;
        timings.insert("retrieve_ms".to_string(), elapsed_ms(retrieve_start));

        if route_output.context.is_empty() {
            timings.insert("total_ms".to_string(), elapsed_ms(overall_start));
            let mut response = QueryResponse::refusal(timings);
            response.route_taken = Some(route);
            return Ok(response);
        }

        let synth_start = Instant::now();
        let synthesizer = Synthesizer::new(self.llm.as_ref());
        let synthesis_output = synthesizer.synthesize(&query.query_text, &route_output.context).await?;
        timings.insert("synthesize_ms".to_string(), elapsed_ms(synth_start));
        timings.insert("total_ms".to_string(), elapsed_ms(overall_start));

        let evidence_nodes = route_output
            .evidence_nodes
            .into_iter()
            .map(|(entity_id, score)| EvidenceNode { entity_id, score })
            .collect();

        Ok(QueryResponse {
            answer_text: synthesis_output.answer_text,
            citations: synthesis_output.citations,
            route_taken: Some(route),
            refused: synthesis_output.refused,
            evidence_nodes,
            timings,
            error: None,
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn dispatch_route(
        &self,
        route: Route,
        store: &BoundedGraphStore<'_>,
        query_text: &str,
        query_embedding: &[f32],
        token_budget: usize,
        cancel: &CancellationToken,
    ) -> Result<RouteOutput, AdapterError> {
        match route {
            Route::Vector => {
                routes::vector::run(
                    store,
                    query_text,
                    query_embedding,
                    &self.config.retrieval,
                    &self.config.distill,
                    token_budget,
                    cancel,
                )
                .await
            }
            Route::Local => {
                routes::local::run(
                    store,
                    query_text,
                    query_embedding,
                    &self.config.retrieval,
                    &self.config.distill,
                    token_budget,
                    cancel,
                )
                .await
            }
            Route::Global => {
                routes::global::run(
                    store,
                    &self.embedder,
                    &self.community_cache,
                    self.gap_fill_matcher.as_ref(),
                    query_text,
                    query_embedding,
                    &self.config.retrieval,
                    &self.config.distill,
                    token_budget,
                    cancel,
                )
                .await
            }
            Route::Drift => {
                routes::drift::run(
                    store,
                    &self.embedder,
                    self.llm.as_ref(),
                    query_text,
                    query_embedding,
                    &self.config.retrieval,
                    &self.config.distill,
                    token_budget,
                    cancel,
                )
                .await
            }
        }
    }

    /// Readiness probe: confirms the graph store actually answers, not
    /// just that the process is alive. Cheap — lists documents with no
    /// scoring or traversal.
    pub async fn health_check(&self) -> bool {
        let cancel = CancellationToken::new();
        matches!(
            self.store.list_documents(&cancel).await,
            Ok(graph_adapter::Cancellable::Ready(_))
        )
    }

    fn error_to_response(error: EngineError) -> QueryResponse {
        let timings = HashMap::new();
        match error {
            EngineError::Validation(msg) => QueryResponse::failure(format!("validation error: {msg}"), timings),
            EngineError::Timeout => QueryResponse::timeout(timings),
            EngineError::EmbeddingUnavailable(msg) => {
                QueryResponse::failure(format!("embedding unavailable: {msg}"), timings)
            }
            EngineError::LLMUnavailable(msg) => QueryResponse::failure(format!("llm unavailable: {msg}"), timings),
            EngineError::GraphUnavailable(msg) | EngineError::GraphTransient(msg) => {
                QueryResponse::failure(format!("graph store unavailable: {msg}"), timings)
            }
            EngineError::NoEvidence | EngineError::StructuralRefusal(_) => QueryResponse::refusal(timings),
            other => QueryResponse::failure(other.to_string(), timings),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::model::{Community, Document, Entity, Relationship, Section, TextChunk};
    use embedding_client::HashedEmbeddingClient;
    use graph_adapter::{BeamHit, Cancellable, ChunkHit, EntityScore, FetchedChunk, MentionHit, PprConfig, SeedScores, VectorHit};
    use llm_client::StubLlmClient;

    struct FakeStore {
        chunks: Vec<TextChunk>,
        documents: Vec<Document>,
    }

    #[async_trait::async_trait]
    impl GraphStore for FakeStore {
        async fn fetch_chunks(
            &self,
            chunk_ids: &[String],
            _: &CancellationToken,
        ) -> Result<Cancellable<Vec<FetchedChunk>>, AdapterError> {
            let out = chunk_ids
                .iter()
                .map(|id| FetchedChunk {
                    chunk_id: id.clone(),
                    chunk: self.chunks.iter().find(|c| &c.chunk_id == id).cloned(),
                })
                .collect();
            Ok(Cancellable::Ready(out))
        }
        async fn vector_search_sentences(&self, _: &[f32], _: usize, _: f32, _: &CancellationToken) -> Result<Cancellable<Vec<VectorHit>>, AdapterError> { Ok(Cancellable::Ready(vec![])) }
        async fn vector_search_chunks(&self, embedding: &[f32], k: usize, _: f32, _: &CancellationToken) -> Result<Cancellable<Vec<ChunkHit>>, AdapterError> {
            let mut hits: Vec<ChunkHit> = self
                .chunks
                .iter()
                .map(|c| ChunkHit {
                    chunk_id: c.chunk_id.clone(),
                    score: retrieval::util::cosine(embedding, &c.embedding),
                })
                .collect();
            hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
            hits.truncate(k);
            Ok(Cancellable::Ready(hits))
        }
        async fn bm25_search_chunks(&self, query_text: &str, k: usize, _: &CancellationToken) -> Result<Cancellable<Vec<ChunkHit>>, AdapterError> {
            let needle = query_text.to_lowercase();
            let mut hits: Vec<ChunkHit> = self
                .chunks
                .iter()
                .filter(|c| needle.split_whitespace().any(|w| c.text.to_lowercase().contains(w)))
                .map(|c| ChunkHit { chunk_id: c.chunk_id.clone(), score: 1.0 })
                .collect();
            hits.truncate(k);
            Ok(Cancellable::Ready(hits))
        }
        async fn mentions_to_chunks(&self, _: &[String], _: usize, _: &CancellationToken) -> Result<Cancellable<Vec<MentionHit>>, AdapterError> { Ok(Cancellable::Ready(vec![])) }
        async fn expand_relationships(&self, _: &[String], _: usize, _: &CancellationToken) -> Result<Cancellable<Vec<Relationship>>, AdapterError> { Ok(Cancellable::Ready(vec![])) }
        async fn ppr_traverse(&self, _: &SeedScores, _: &PprConfig, _: &CancellationToken) -> Result<Cancellable<Vec<EntityScore>>, AdapterError> { Ok(Cancellable::Ready(vec![])) }
        async fn beam_expand(&self, _: &[String], _: &[f32], _: usize, _: usize, _: &CancellationToken) -> Result<Cancellable<Vec<BeamHit>>, AdapterError> { Ok(Cancellable::Ready(vec![])) }
        async fn fetch_communities(&self, _: &CancellationToken) -> Result<Cancellable<Vec<Community>>, AdapterError> { Ok(Cancellable::Ready(vec![])) }
        async fn fetch_entity_descriptions(&self, _: &[String], _: &CancellationToken) -> Result<Cancellable<Vec<(String, String)>>, AdapterError> { Ok(Cancellable::Ready(vec![])) }
        async fn vector_search_entities(&self, _: &[f32], _: usize, _: &CancellationToken) -> Result<Cancellable<Vec<Entity>>, AdapterError> { Ok(Cancellable::Ready(vec![])) }
        async fn find_entities_by_name(&self, _: &[String], _: &CancellationToken) -> Result<Cancellable<Vec<Entity>>, AdapterError> { Ok(Cancellable::Ready(vec![])) }
        async fn fetch_entities_by_id(&self, _: &[String], _: &CancellationToken) -> Result<Cancellable<Vec<Entity>>, AdapterError> { Ok(Cancellable::Ready(vec![])) }
        async fn list_documents(&self, _: &CancellationToken) -> Result<Cancellable<Vec<Document>>, AdapterError> { Ok(Cancellable::Ready(self.documents.clone())) }
        async fn fetch_lead_chunk(&self, doc_id: &str, _: &CancellationToken) -> Result<Cancellable<Option<TextChunk>>, AdapterError> {
            Ok(Cancellable::Ready(self.chunks.iter().find(|c| c.doc_id == doc_id).cloned()))
        }
    }

    fn chunk(id: &str, doc_id: &str, text: &str, embedding: Vec<f32>) -> TextChunk {
        TextChunk {
            chunk_id: id.to_string(),
            doc_id: doc_id.to_string(),
            section_id: "s1".to_string(),
            text: text.to_string(),
            page: None,
            token_count: text.split_whitespace().count(),
            embedding,
            prev_chunk_id: None,
            next_chunk_id: None,
            mentions: vec![],
        }
    }

    fn build_dispatcher(chunks: Vec<TextChunk>) -> Dispatcher<HashedEmbeddingClient> {
        let documents = vec![Document {
            doc_id: "d1".to_string(),
            title: "Invoice".to_string(),
            section_index: vec![Section { section_id: "s1".to_string(), index: 0, title: "Body".to_string() }],
        }];
        let store: Box<dyn GraphStore> = Box::new(FakeStore { chunks, documents });
        let embedder = CachedEmbeddingClient::new(HashedEmbeddingClient::new(8), 16);
        let llm: Box<dyn LlmClient> = Box::new(StubLlmClient::with_scripted_responses(vec![
            "## Summary\nThe invoice total is $5,170.00 [1].\n\n## Key Points\n- $5,170.00 [1]".to_string(),
        ]));
        Dispatcher::new(store, embedder, llm, EngineConfig {
            openai_api_key: "test".to_string(),
            openai_base_url: "https://example.invalid".to_string(),
            surrealdb_address: "mem://".to_string(),
            surrealdb_username: String::new(),
            surrealdb_password: String::new(),
            surrealdb_namespace: "test".to_string(),
            surrealdb_database: "test".to_string(),
            http_port: 8080,
            default_deadline_ms: 60_000,
            default_token_budget: 32_000,
            max_concurrency: 16,
            embedding_dim: 8,
            embedding_model: "test-embed".to_string(),
            llm_model: "test-llm".to_string(),
            retrieval: Default::default(),
            distill: Default::default(),
        })
    }

    #[tokio::test]
    async fn empty_query_text_fails_validation() {
        let dispatcher = build_dispatcher(vec![]);
        let response = dispatcher
            .query(QueryRequest {
                query_text: "   ".to_string(),
                group_id: "g1".to_string(),
                route_override: None,
                response_type: None,
                deadline_ms: None,
                token_budget: None,
            })
            .await;
        assert!(response.error.is_some());
        assert!(!response.refused);
    }

    #[tokio::test]
    async fn empty_corpus_refuses_rather_than_confabulating() {
        let dispatcher = build_dispatcher(vec![]);
        let response = dispatcher
            .query(QueryRequest {
                query_text: "What is the invoice total amount?".to_string(),
                group_id: "g1".to_string(),
                route_override: Some(Route::Vector),
                response_type: None,
                deadline_ms: None,
                token_budget: None,
            })
            .await;
        assert!(response.refused);
        assert_eq!(response.answer_text, common::model::REFUSAL_SENTENCE);
    }

    #[tokio::test]
    async fn zero_deadline_is_rejected_before_any_io() {
        let dispatcher = build_dispatcher(vec![]);
        let response = dispatcher
            .query(QueryRequest {
                query_text: "What is the invoice total?".to_string(),
                group_id: "g1".to_string(),
                route_override: None,
                response_type: None,
                deadline_ms: Some(0),
                token_budget: None,
            })
            .await;
        assert!(response.error.is_some());
    }

    #[tokio::test]
    async fn single_verbatim_chunk_answers_with_citation() {
        let embedder = HashedEmbeddingClient::new(8);
        let text = "Invoice total: $5,170.00 due upon receipt.";
        let embedding = embedder.embed_one(text).await.unwrap();
        let dispatcher = build_dispatcher(vec![chunk("c1", "d1", text, embedding)]);

        let response = dispatcher
            .query(QueryRequest {
                query_text: "What is the invoice total amount?".to_string(),
                group_id: "g1".to_string(),
                route_override: Some(Route::Vector),
                response_type: None,
                deadline_ms: None,
                token_budget: None,
            })
            .await;

        assert!(!response.refused);
        assert_eq!(response.route_taken, Some(Route::Vector));
        assert!(!response.citations.is_empty());
    }
}
