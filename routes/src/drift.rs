//! R4 Drift: multi-hop queries spanning more than one entity or relation.
//! An LLM decomposes the query into sub-questions; each sub-question runs
//! its own seed + beam + PPR + hybrid fan-out; all candidates merge into one
//! pool and the distiller runs once at the end (§4.6).

use std::collections::{HashMap, HashSet};

use futures::future;
use tokio_util::sync::CancellationToken;

use common::config::{DistillTuning, RetrievalTuning};
use common::model::{Candidate, CandidateSource};
use embedding_client::EmbeddingClient;
use graph_adapter::{AdapterError, Cancellable, GraphStore, PprConfig, SeedScores};
use llm_client::{CompletionRequest, LlmClient};
use retrieval::beam::SemanticBeamWalker;
use retrieval::distill::{distill, DistillInput};
use retrieval::hybrid::{apply_document_diversity, HybridConfig, HybridRetriever};
use retrieval::ppr::PprTracer;
use retrieval::util::cosine;

use crate::local::extract_name_candidates;
use crate::{candidates_from_ranked, doc_of_map, RouteOutput};

/// Upper bound on sub-questions a single query can be decomposed into, so a
/// pathological LLM response can't fan this route out unboundedly.
pub const MAX_SUB_QUESTIONS: usize = 4;

const DECOMPOSE_SYSTEM_PROMPT: &str = "You break a multi-hop question into the minimal set of independent \
sub-questions needed to answer it. Reply with one sub-question per line, nothing else. If the question is \
already single-hop, reply with the question unchanged on a single line.";

/// Calls the LLM once to split `query_text` into up to `MAX_SUB_QUESTIONS`
/// sub-questions. Falls back to `[query_text]` on any decomposition failure
/// or empty response, so drift degrades to a single-hop pass rather than
/// failing the whole route.
async fn decompose(llm: &dyn LlmClient, query_text: &str) -> Vec<String> {
    let request = CompletionRequest {
        system_prompt: DECOMPOSE_SYSTEM_PROMPT,
        user_prompt: query_text,
        max_output_tokens: 256,
        temperature: 0.0,
        stop: None,
    };

    match llm.complete(request).await {
        Ok(response) => {
            let sub_questions: Vec<String> = response
                .text
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(|l| l.trim_start_matches(|c: char| c.is_ascii_digit() || c == '.' || c == ')' || c == ' ').to_string())
                .filter(|l| !l.is_empty())
                .take(MAX_SUB_QUESTIONS)
                .collect();
            if sub_questions.is_empty() {
                vec![query_text.to_string()]
            } else {
                sub_questions
            }
        }
        Err(_) => vec![query_text.to_string()],
    }
}

/// Runs the seed + beam + PPR + hybrid fan-out for a single sub-question,
/// returning the candidates and entity scores it contributed.
#[allow(clippy::too_many_arguments)]
async fn run_sub_question(
    store: &dyn GraphStore,
    embedder: &dyn EmbeddingClient,
    sub_question: &str,
    retrieval_tuning: &RetrievalTuning,
    cancel: &CancellationToken,
) -> Result<(Vec<Candidate>, Vec<(String, f32)>), AdapterError> {
    let sub_embedding = embedder
        .embed_one(sub_question)
        .await
        .map_err(|e| AdapterError::Transient(e.to_string()))?;

    let name_candidates = extract_name_candidates(sub_question);
    let (named, vector_matched) = tokio::try_join!(
        store.find_entities_by_name(&name_candidates, cancel),
        store.vector_search_entities(&sub_embedding, retrieval_tuning.hub_top_k_per_community, cancel),
    )?;
    let named = match named {
        Cancellable::Ready(v) => v,
        Cancellable::Cancelled => return Ok((Vec::new(), Vec::new())),
    };
    let vector_matched = match vector_matched {
        Cancellable::Ready(v) => v,
        Cancellable::Cancelled => return Ok((Vec::new(), Vec::new())),
    };

    let mut seed_scores: SeedScores = HashMap::new();
    for entity in &named {
        seed_scores.insert(entity.entity_id.clone(), 1.0);
    }
    for entity in &vector_matched {
        let score = cosine(&sub_embedding, &entity.embedding);
        seed_scores
            .entry(entity.entity_id.clone())
            .and_modify(|s| *s = s.max(score))
            .or_insert(score);
    }

    let hybrid_config = HybridConfig {
        k_vector: retrieval_tuning.hybrid_k_vector,
        k_bm25: retrieval_tuning.hybrid_k_bm25,
        k_out: retrieval_tuning.hybrid_k_out,
        rrf_c: retrieval_tuning.rrf_c,
        max_per_doc: retrieval_tuning.max_per_doc,
        min_docs: retrieval_tuning.min_docs,
        min_score: 0.0,
    };

    if seed_scores.is_empty() {
        // No entity anchor for this sub-question: fall back to a hybrid pass
        // alone so it still contributes evidence to the merged pool.
        let hybrid = HybridRetriever::new(store);
        let ranked = hybrid
            .retrieve(sub_question, &sub_embedding, &hybrid_config, cancel)
            .await?;
        let chunk_ids: Vec<String> = ranked.iter().map(|r| r.chunk_id.clone()).collect();
        let fetched = match store.fetch_chunks(&chunk_ids, cancel).await? {
            Cancellable::Ready(v) => v,
            Cancellable::Cancelled => return Ok((Vec::new(), Vec::new())),
        };
        let ranked_tuples: Vec<_> = ranked.iter().map(|r| (r.chunk_id.clone(), r.rrf_score, r.source)).collect();
        return Ok((candidates_from_ranked(&ranked_tuples, &fetched), Vec::new()));
    }

    let seed_ids: Vec<String> = seed_scores.keys().cloned().collect();

    let ppr_config = PprConfig {
        damping: retrieval_tuning.ppr_damping,
        sim_weight: retrieval_tuning.ppr_sim_weight,
        hub_weight: retrieval_tuning.ppr_hub_weight,
        max_neighbors_per_seed: 50,
    };
    let tracer = PprTracer::new(store);
    let beam_walker = SemanticBeamWalker::new(store);
    let hybrid = HybridRetriever::new(store);

    let (entity_scores, beam_hits, ranked) = future::join3(
        tracer.trace(&seed_scores, &ppr_config, cancel),
        beam_walker.walk(
            &seed_ids,
            &sub_embedding,
            retrieval_tuning.beam_max_hops,
            retrieval_tuning.beam_width,
            cancel,
        ),
        hybrid.retrieve(sub_question, &sub_embedding, &hybrid_config, cancel),
    )
    .await;
    let entity_scores = entity_scores?;
    let beam_hits = beam_hits?;
    let ranked = ranked?;

    let evidence_nodes: Vec<(String, f32)> = entity_scores.iter().map(|e| (e.entity_id.clone(), e.score)).collect();

    // Beam-walked entities join the hybrid candidate pool as low-confidence
    // path evidence; their chunks surface only through mentions, which this
    // route skips for cost — the path itself is carried for citation
    // provenance via `entity_anchors` on any chunk that already mentions them.
    let beam_entity_ids: HashSet<String> = beam_hits.into_iter().map(|h| h.entity_id).collect();

    let chunk_ids: Vec<String> = ranked.iter().map(|r| r.chunk_id.clone()).collect();
    let fetched = match store.fetch_chunks(&chunk_ids, cancel).await? {
        Cancellable::Ready(v) => v,
        Cancellable::Cancelled => return Ok((Vec::new(), evidence_nodes)),
    };
    let doc_of = doc_of_map(&fetched);
    let diversified = apply_document_diversity(
        &ranked,
        |id| doc_of.get(id).cloned(),
        hybrid_config.max_per_doc,
        hybrid_config.min_docs,
        hybrid_config.k_out,
    );
    let ranked_tuples: Vec<_> = diversified.iter().map(|r| (r.chunk_id.clone(), r.rrf_score, r.source)).collect();
    let mut candidates = candidates_from_ranked(&ranked_tuples, &fetched);
    for candidate in &mut candidates {
        if candidate.entity_anchors.iter().any(|a| beam_entity_ids.contains(a)) {
            candidate.sources.insert(CandidateSource::Ppr);
        }
    }

    Ok((candidates, evidence_nodes))
}

#[allow(clippy::too_many_arguments)]
pub async fn run(
    store: &dyn GraphStore,
    embedder: &dyn EmbeddingClient,
    llm: &dyn LlmClient,
    query_text: &str,
    query_embedding: &[f32],
    retrieval_tuning: &RetrievalTuning,
    distill_tuning: &DistillTuning,
    token_budget: usize,
    cancel: &CancellationToken,
) -> Result<RouteOutput, AdapterError> {
    let sub_questions = decompose(llm, query_text).await;

    let results = future::join_all(
        sub_questions
            .iter()
            .map(|q| run_sub_question(store, embedder, q, retrieval_tuning, cancel)),
    )
    .await;

    let mut candidates = Vec::new();
    let mut evidence_nodes = Vec::new();
    for result in results {
        let (sub_candidates, sub_evidence) = result?;
        candidates.extend(sub_candidates);
        evidence_nodes.extend(sub_evidence);
    }

    let context = distill(DistillInput {
        candidates,
        query_embedding,
        community_summaries: vec![],
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
