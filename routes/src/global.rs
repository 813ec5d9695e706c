//! R3 Global: thematic / cross-document synthesis. Community matcher and
//! hybrid retriever run in parallel; community summaries become the
//! preamble, hub entities from matched communities seed a PPR trace whose
//! mentions chunks merge in as capped enrichment, and coverage gap-fill
//! inserts lead chunks of documents missing from the final set (§4.6).

use std::collections::HashMap;

use futures::future;
use tokio_util::sync::CancellationToken;

use common::config::{DistillTuning, RetrievalTuning};
use common::model::{Candidate, CandidateSource};
use graph_adapter::{AdapterError, Cancellable, GraphStore, PprConfig, SeedScores};
use retrieval::community::{CommunityCache, CommunityMatcher};
use retrieval::distill::{distill, CommunitySummary, DistillInput};
use retrieval::hub_entities::HubEntityExtractor;
use retrieval::hybrid::{apply_document_diversity, HybridConfig, HybridRetriever};
use retrieval::mentions::{MentionsConfig, MentionsExpander};
use retrieval::ppr::PprTracer;
use embedding_client::EmbeddingClient;

use crate::gapfill::{covered_doc_ids, GapFillMatcher};
use crate::{candidates_from_ranked, doc_of_map, RouteOutput};

/// Cap on PPR-derived mentions chunks so thematic enrichment can never
/// dominate query-relevant hybrid evidence (§4.6 R3).
pub const ENRICHMENT_CAP: usize = 10;

#[allow(clippy::too_many_arguments)]
pub async fn run(
    store: &dyn GraphStore,
    embedder: &dyn EmbeddingClient,
    community_cache: &CommunityCache,
    gap_fill_matcher: &dyn GapFillMatcher,
    query_text: &str,
    query_embedding: &[f32],
    retrieval_tuning: &RetrievalTuning,
    distill_tuning: &DistillTuning,
    token_budget: usize,
    cancel: &CancellationToken,
) -> Result<RouteOutput, AdapterError> {
    let matcher = CommunityMatcher::new(store, embedder, community_cache);
    let hybrid = HybridRetriever::new(store);
    let hybrid_config = HybridConfig {
        k_vector: retrieval_tuning.hybrid_k_vector,
        k_bm25: retrieval_tuning.hybrid_k_bm25,
        k_out: retrieval_tuning.hybrid_k_out,
        rrf_c: retrieval_tuning.rrf_c,
        max_per_doc: retrieval_tuning.max_per_doc,
        min_docs: retrieval_tuning.min_docs,
        min_score: 0.0,
    };

    let (matched_result, ranked_result) = future::join(
        matcher.match_query(
            query_embedding,
            retrieval_tuning.community_min_score,
            retrieval_tuning.community_top_k,
            cancel,
        ),
        hybrid.retrieve(query_text, query_embedding, &hybrid_config, cancel),
    )
    .await;
    let matched = matched_result?;
    let ranked = ranked_result?;

    let chunk_ids: Vec<String> = ranked.iter().map(|r| r.chunk_id.clone()).collect();
    let fetched = match store.fetch_chunks(&chunk_ids, cancel).await? {
        Cancellable::Ready(v) => v,
        Cancellable::Cancelled => return Ok(RouteOutput::default()),
    };
    let doc_of = doc_of_map(&fetched);
    let diversified = apply_document_diversity(
        &ranked,
        |id| doc_of.get(id).cloned(),
        hybrid_config.max_per_doc,
        hybrid_config.min_docs,
        hybrid_config.k_out,
    );
    let ranked_tuples: Vec<_> = diversified
        .iter()
        .map(|r| (r.chunk_id.clone(), r.rrf_score, r.source))
        .collect();
    let mut candidates = candidates_from_ranked(&ranked_tuples, &fetched);

    // Hub entities from matched communities seed a PPR trace; its mentions
    // chunks are merged in as capped enrichment.
    let mut evidence_nodes = Vec::new();
    if !matched.is_empty() {
        let hub_extractor = HubEntityExtractor::new(store);
        let hub_entities = hub_extractor
            .extract(&matched, query_embedding, retrieval_tuning.hub_top_k_per_community, cancel)
            .await?;

        if !hub_entities.is_empty() {
            let mut seed_scores: SeedScores = HashMap::new();
            let mut name_by_id: HashMap<String, String> = HashMap::new();
            for entity in &hub_entities {
                seed_scores.insert(entity.entity_id.clone(), 1.0);
                name_by_id.insert(entity.entity_id.clone(), entity.name.clone());
            }

            let ppr_config = PprConfig {
                damping: retrieval_tuning.ppr_damping,
                sim_weight: retrieval_tuning.ppr_sim_weight,
                hub_weight: retrieval_tuning.ppr_hub_weight,
                max_neighbors_per_seed: 50,
            };
            let tracer = PprTracer::new(store);
            let entity_scores = tracer.trace(&seed_scores, &ppr_config, cancel).await?;
            evidence_nodes = entity_scores.iter().map(|e| (e.entity_id.clone(), e.score)).collect();

            let unknown_ids: Vec<String> = entity_scores
                .iter()
                .filter(|e| !name_by_id.contains_key(&e.entity_id))
                .map(|e| e.entity_id.clone())
                .collect();
            if !unknown_ids.is_empty() {
                if let Cancellable::Ready(resolved) = store.fetch_entities_by_id(&unknown_ids, cancel).await? {
                    for entity in resolved {
                        name_by_id.insert(entity.entity_id.clone(), entity.name.clone());
                    }
                }
            }

            let mentions_config = MentionsConfig {
                max_chunks_per_entity: retrieval_tuning.mentions_max_chunks_per_entity,
                max_per_section: retrieval_tuning.mentions_max_per_section,
                max_per_doc: retrieval_tuning.mentions_max_per_doc,
            };
            let expander = MentionsExpander::new(store);
            let mut enrichment = expander
                .expand(&entity_scores, |id| name_by_id.get(id).cloned(), &mentions_config, cancel)
                .await?;
            enrichment.truncate(ENRICHMENT_CAP);
            candidates.extend(enrichment);
        }
    }

    // Coverage gap-fill: insert lead chunks of documents missing entirely
    // from the candidate set, when the query asks for per-document coverage.
    if gap_fill_matcher.matches(query_text) {
        if let Cancellable::Ready(documents) = store.list_documents(cancel).await? {
            let covered = covered_doc_ids(&candidates);
            for doc in documents {
                if covered.contains(&doc.doc_id) {
                    continue;
                }
                if let Cancellable::Ready(Some(chunk)) = store.fetch_lead_chunk(&doc.doc_id, cancel).await? {
                    let mut candidate = Candidate::new(
                        chunk.chunk_id.clone(),
                        chunk.doc_id.clone(),
                        chunk.section_id.clone(),
                        chunk.text.clone(),
                        chunk.embedding.clone(),
                        CandidateSource::Community,
                        0.0,
                        candidates.len(),
                    );
                    candidate.entity_anchors = chunk.mentions.clone();
                    candidates.push(candidate);
                }
            }
        }
    }

    let community_summaries: Vec<CommunitySummary> = matched
        .into_iter()
        .map(|m| CommunitySummary {
            title: m.community.title,
            summary: m.community.summary,
        })
        .collect();

    let context = distill(DistillInput {
        candidates,
        query_embedding,
        community_summaries,
        relationships: vec![],
        entity_descriptions: vec![],
        token_budget,
        tuning: distill_tuning,
    });

    Ok(RouteOutput {
        context,
        evidence_nodes,
    })
}
