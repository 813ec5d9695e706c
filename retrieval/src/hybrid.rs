//! Hybrid sentence/chunk retriever (§4.4.1): BM25 + vector fused via
//! Reciprocal Rank Fusion, then document-diversified.

use std::collections::HashMap;

use tokio::try_join;
use tokio_util::sync::CancellationToken;

use common::model::CandidateSource;
use graph_adapter::{AdapterError, GraphStore};

#[derive(Debug, Clone)]
pub struct HybridConfig {
    pub k_vector: usize,
    pub k_bm25: usize,
    pub k_out: usize,
    pub rrf_c: f32,
    pub max_per_doc: usize,
    pub min_docs: usize,
    pub min_score: f32,
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            k_vector: 30,
            k_bm25: 30,
            k_out: 20,
            rrf_c: 60.0,
            max_per_doc: 2,
            min_docs: 3,
            min_score: 0.0,
        }
    }
}

pub struct HybridRetriever<'a> {
    store: &'a dyn GraphStore,
}

impl<'a> HybridRetriever<'a> {
    pub fn new(store: &'a dyn GraphStore) -> Self {
        Self { store }
    }

    /// Runs vector and BM25 search concurrently, fuses by RRF, applies
    /// document diversity, and returns the top `k_out` candidates. Chunk
    /// text/doc_id/embedding are filled in by the caller via `fetch_chunks`
    /// once the candidate set is finalized (kept thin here so the retriever
    /// stays a pure ranking step over chunk ids).
    pub async fn retrieve(
        &self,
        query_text: &str,
        query_embedding: &[f32],
        config: &HybridConfig,
        cancel: &CancellationToken,
    ) -> Result<Vec<RankedChunk>, AdapterError> {
        let (vector_res, bm25_res) = try_join!(
            self.store
                .vector_search_chunks(query_embedding, config.k_vector, config.min_score, cancel),
            self.store.bm25_search_chunks(query_text, config.k_bm25, cancel),
        )?;

        let vector_hits = match vector_res {
            graph_adapter::Cancellable::Ready(v) => v,
            graph_adapter::Cancellable::Cancelled => return Ok(Vec::new()),
        };
        let bm25_hits = match bm25_res {
            graph_adapter::Cancellable::Ready(v) => v,
            graph_adapter::Cancellable::Cancelled => return Ok(Vec::new()),
        };

        let vector_ranks: HashMap<&str, usize> = vector_hits
            .iter()
            .enumerate()
            .map(|(i, h)| (h.chunk_id.as_str(), i))
            .collect();
        let bm25_ranks: HashMap<&str, usize> = bm25_hits
            .iter()
            .enumerate()
            .map(|(i, h)| (h.chunk_id.as_str(), i))
            .collect();

        let mut all_ids: Vec<String> = Vec::new();
        let mut seen = std::collections::HashSet::new();
        for h in vector_hits.iter().chain(bm25_hits.iter()) {
            if seen.insert(h.chunk_id.clone()) {
                all_ids.push(h.chunk_id.clone());
            }
        }

        let mut fused: Vec<RankedChunk> = all_ids
            .into_iter()
            .map(|chunk_id| {
                let r_v = vector_ranks.get(chunk_id.as_str()).copied();
                let r_b = bm25_ranks.get(chunk_id.as_str()).copied();
                let rrf_score = r_v.map_or(0.0, |r| 1.0 / (config.rrf_c + r as f32 + 1.0))
                    + r_b.map_or(0.0, |r| 1.0 / (config.rrf_c + r as f32 + 1.0));
                // whichever ranked it higher (lower rank index) wins the source tag
                let source = match (r_v, r_b) {
                    (Some(v), Some(b)) if v <= b => CandidateSource::Vector,
                    (Some(_), Some(_)) => CandidateSource::Bm25,
                    (Some(_), None) => CandidateSource::Vector,
                    (None, Some(_)) => CandidateSource::Bm25,
                    (None, None) => CandidateSource::Vector,
                };
                RankedChunk {
                    chunk_id,
                    rrf_score,
                    source,
                }
            })
            .collect();

        fused.sort_by(|a, b| {
            b.rrf_score
                .partial_cmp(&a.rrf_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.chunk_id.cmp(&b.chunk_id))
        });

        Ok(fused)
    }
}

#[derive(Debug, Clone)]
pub struct RankedChunk {
    pub chunk_id: String,
    pub rrf_score: f32,
    pub source: CandidateSource,
}

/// Document diversity pass: caps per-doc representation while guaranteeing a
/// minimum number of distinct documents when the fused set is large enough
/// to provide them, relaxing the cap only when the minimum can't otherwise
/// be met (§4.4.1).
pub fn apply_document_diversity(
    fused: &[RankedChunk],
    doc_of: impl Fn(&str) -> Option<String>,
    max_per_doc: usize,
    min_docs: usize,
    k_out: usize,
) -> Vec<RankedChunk> {
    let distinct_docs: std::collections::HashSet<String> =
        fused.iter().filter_map(|c| doc_of(&c.chunk_id)).collect();
    let achievable_min_docs = min_docs.min(distinct_docs.len());

    let mut per_doc_count: HashMap<String, usize> = HashMap::new();
    let mut kept_docs: std::collections::HashSet<String> = std::collections::HashSet::new();
    let mut out = Vec::new();
    let mut deferred = Vec::new();

    for chunk in fused {
        let Some(doc_id) = doc_of(&chunk.chunk_id) else {
            out.push(chunk.clone());
            continue;
        };
        let count = per_doc_count.entry(doc_id.clone()).or_insert(0);
        if *count < max_per_doc {
            *count += 1;
            kept_docs.insert(doc_id);
            out.push(chunk.clone());
        } else {
            deferred.push((doc_id, chunk.clone()));
        }
        if out.len() >= k_out && kept_docs.len() >= achievable_min_docs {
            break;
        }
    }

    // Relax the cap if we still haven't hit k_out or the minimum document
    // count, by admitting deferred candidates in fused order.
    if out.len() < k_out {
        for (doc_id, chunk) in deferred {
            if out.len() >= k_out {
                break;
            }
            kept_docs.insert(doc_id);
            out.push(chunk);
        }
    }

    out.truncate(k_out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &str, score: f32) -> RankedChunk {
        RankedChunk {
            chunk_id: id.to_string(),
            rrf_score: score,
            source: CandidateSource::Vector,
        }
    }

    #[test]
    fn diversity_caps_per_doc_and_guarantees_min_docs() {
        let fused = vec![
            chunk("a1", 0.9),
            chunk("a2", 0.8),
            chunk("a3", 0.7),
            chunk("b1", 0.6),
            chunk("c1", 0.5),
        ];
        let doc_of = |id: &str| -> Option<String> {
            Some(match id {
                "a1" | "a2" | "a3" => "docA",
                "b1" => "docB",
                "c1" => "docC",
                _ => "docX",
            }.to_string())
        };
        let out = apply_document_diversity(&fused, doc_of, 2, 3, 5);
        let docs: std::collections::HashSet<String> =
            out.iter().map(|c| doc_of(&c.chunk_id).unwrap()).collect();
        assert!(docs.len() >= 3, "expected >= 3 distinct docs, got {docs:?}");
        let doc_a_count = out.iter().filter(|c| c.chunk_id.starts_with('a')).count();
        assert!(doc_a_count <= 2);
    }

    #[test]
    fn diversity_relaxes_when_not_enough_distinct_docs_exist() {
        let fused = vec![chunk("a1", 0.9), chunk("a2", 0.8), chunk("a3", 0.7)];
        let doc_of = |_: &str| -> Option<String> { Some("docA".to_string()) };
        let out = apply_document_diversity(&fused, doc_of, 2, 3, 3);
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn rrf_fusion_favors_items_ranked_high_in_both_lists() {
        let mut fused = vec![
            RankedChunk { chunk_id: "only_vector".into(), rrf_score: 1.0 / 61.0, source: CandidateSource::Vector },
            RankedChunk { chunk_id: "both".into(), rrf_score: 2.0 / 61.0, source: CandidateSource::Vector },
        ];
        fused.sort_by(|a, b| b.rrf_score.partial_cmp(&a.rrf_score).unwrap());
        assert_eq!(fused[0].chunk_id, "both");
    }
}
