//! R1 Vector: precise factual lookup, low latency. Hybrid retriever only,
//! distilled under a tighter token budget than the other routes (§4.6).

use tokio_util::sync::CancellationToken;

use common::config::{DistillTuning, RetrievalTuning};
use graph_adapter::{Cancellable, GraphStore};
use retrieval::distill::{distill, DistillInput};
use retrieval::hybrid::{apply_document_diversity, HybridConfig, HybridRetriever};

use crate::{candidates_from_ranked, doc_of_map, RouteOutput};

/// Route-specific default token budget (§4.6 "R1 Vector ... token_budget=16k").
pub const DEFAULT_TOKEN_BUDGET: usize = 16_000;

pub async fn run(
    store: &dyn GraphStore,
    query_text: &str,
    query_embedding: &[f32],
    retrieval_tuning: &RetrievalTuning,
    distill_tuning: &DistillTuning,
    token_budget: usize,
    cancel: &CancellationToken,
) -> Result<RouteOutput, graph_adapter::AdapterError> {
    let hybrid = HybridRetriever::new(store);
    let config = HybridConfig {
        k_vector: retrieval_tuning.hybrid_k_vector,
        k_bm25: retrieval_tuning.hybrid_k_bm25,
        k_out: retrieval_tuning.hybrid_k_out,
        rrf_c: retrieval_tuning.rrf_c,
        max_per_doc: retrieval_tuning.max_per_doc,
        min_docs: retrieval_tuning.min_docs,
        min_score: 0.0,
    };
    let ranked = hybrid.retrieve(query_text, query_embedding, &config, cancel).await?;

    let chunk_ids: Vec<String> = ranked.iter().map(|r| r.chunk_id.clone()).collect();
    let fetched = match store.fetch_chunks(&chunk_ids, cancel).await? {
        Cancellable::Ready(v) => v,
        Cancellable::Cancelled => return Ok(RouteOutput::default()),
    };

    let doc_of = doc_of_map(&fetched);
    let diversified = apply_document_diversity(
        &ranked,
        |id| doc_of.get(id).cloned(),
        config.max_per_doc,
        config.min_docs,
        config.k_out,
    );

    let ranked_tuples: Vec<_> = diversified
        .iter()
        .map(|r| (r.chunk_id.clone(), r.rrf_score, r.source))
        .collect();
    let candidates = candidates_from_ranked(&ranked_tuples, &fetched);

    let budget = token_budget.min(DEFAULT_TOKEN_BUDGET);
    let context = distill(DistillInput {
        candidates,
        query_embedding,
        community_summaries: vec![],
        relationships: vec![],
        entity_descriptions: vec![],
        token_budget: budget,
        tuning: distill_tuning,
    });

    Ok(RouteOutput {
        context,
        evidence_nodes: vec![],
    })
}
