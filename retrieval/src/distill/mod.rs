//! Context distiller (§4.5): dedup, noise-filter, unified re-rank, and
//! token-budget truncation over a pool of candidates from one or more
//! retrievers, producing a single owned `DistilledContext`.
//!
//! Executed strictly in the order the spec lists: steps never reorder or
//! skip each other. Given identical inputs and configuration the output
//! candidate order is byte-identical (§4.5 Determinism, §8 property 4).

pub mod rerank;

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use common::config::DistillTuning;
use common::model::{Candidate, DistilledContext, Relationship};
use common::tokens::estimate_tokens;

use crate::util::{cosine, min_max_normalize};

/// One matched community's contribution to the thematic preamble.
#[derive(Debug, Clone)]
pub struct CommunitySummary {
    pub title: String,
    pub summary: String,
}

pub struct DistillInput<'a> {
    pub candidates: Vec<Candidate>,
    pub query_embedding: &'a [f32],
    pub community_summaries: Vec<CommunitySummary>,
    pub relationships: Vec<Relationship>,
    pub entity_descriptions: Vec<(String, String)>,
    pub token_budget: usize,
    pub tuning: &'a DistillTuning,
}

fn hash_text(text: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    hasher.finish()
}

/// Step 1: canonicalize + hash, keep first occurrence, union sources of
/// later duplicates into the kept candidate.
fn exact_dedup(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut order: Vec<u64> = Vec::new();
    let mut by_hash: HashMap<u64, Candidate> = HashMap::new();
    for candidate in candidates {
        let key = hash_text(&candidate.canonical_text());
        if let Some(existing) = by_hash.get_mut(&key) {
            existing.sources.extend(candidate.sources.iter().copied());
        } else {
            order.push(key);
            by_hash.insert(key, candidate);
        }
    }
    order.into_iter().filter_map(|k| by_hash.remove(&k)).collect()
}

/// Step 2: drop form labels, bare headings, and anything too short to carry
/// information.
fn noise_filter(candidates: Vec<Candidate>, tuning: &DistillTuning) -> Vec<Candidate> {
    candidates
        .into_iter()
        .filter(|c| {
            let text = c.canonical_text();
            let len = text.chars().count();
            if len < tuning.noise_min_len {
                return false;
            }
            if len < tuning.noise_label_max_len && text.ends_with(':') {
                return false;
            }
            if len < tuning.noise_heading_max_len
                && !text.contains(['.', '!', '?', ',', ';'])
            {
                return false;
            }
            true
        })
        .collect()
}

/// Step 3: when two surviving candidates refer to the same chunk, keep the
/// higher `base_score` one and union their source sets.
fn cross_source_dedup(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut order: Vec<String> = Vec::new();
    let mut by_chunk: HashMap<String, Candidate> = HashMap::new();
    for candidate in candidates {
        match by_chunk.get_mut(&candidate.chunk_id) {
            Some(existing) => {
                let sources = candidate.sources.clone();
                if candidate.base_score > existing.base_score {
                    let merged_sources: std::collections::BTreeSet<_> =
                        existing.sources.union(&sources).copied().collect();
                    *existing = candidate;
                    existing.sources = merged_sources;
                } else {
                    existing.sources.extend(sources);
                }
            }
            None => {
                order.push(candidate.chunk_id.clone());
                by_chunk.insert(candidate.chunk_id.clone(), candidate);
            }
        }
    }
    order.into_iter().filter_map(|id| by_chunk.remove(&id)).collect()
}

/// Step 4: unified re-rank combining cosine similarity to the query with a
/// min-max-normalized base score, ties broken by ascending `chunk_id`.
fn unified_rerank(mut candidates: Vec<Candidate>, query_embedding: &[f32], tuning: &DistillTuning) -> Vec<Candidate> {
    let base_scores: Vec<f32> = candidates.iter().map(|c| c.base_score).collect();
    let normalized = min_max_normalize(&base_scores);

    let mut scored: Vec<(Candidate, f32)> = candidates
        .drain(..)
        .zip(normalized)
        .map(|(c, base_norm)| {
            let rerank_score = cosine(query_embedding, &c.embedding);
            let final_score = tuning.rerank_weight * rerank_score + tuning.base_score_weight * base_norm;
            (c, final_score)
        })
        .collect();

    scored.sort_by(|(a, a_score), (b, b_score)| {
        b_score
            .partial_cmp(a_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });

    scored.into_iter().map(|(c, _)| c).collect()
}

/// Step 5: accumulate in final order until the next candidate would exceed
/// the remaining budget. Never splits a chunk; overflowing candidates are
/// dropped entirely.
fn truncate_to_budget(candidates: Vec<Candidate>, budget_remaining: &mut usize) -> Vec<Candidate> {
    let mut out = Vec::new();
    for candidate in candidates {
        let cost = estimate_tokens(&candidate.text);
        if cost > *budget_remaining {
            continue;
        }
        *budget_remaining -= cost;
        out.push(candidate);
    }
    out
}

/// Runs the full 7-step pipeline. `NoEvidence` detection (§7) is the
/// caller's responsibility: an empty, preamble-less result is the signal.
pub fn distill(input: DistillInput<'_>) -> DistilledContext {
    let deduped = exact_dedup(input.candidates);
    let filtered = noise_filter(deduped, input.tuning);
    let cross_deduped = cross_source_dedup(filtered);
    let reranked = unified_rerank(cross_deduped, input.query_embedding, input.tuning);

    let mut budget_remaining = input.token_budget;

    // Step 6: community preamble, budgeted separately and counted against
    // the total before candidate truncation consumes the rest.
    let community_preamble = if input.community_summaries.is_empty() {
        None
    } else {
        let mut preamble_budget = input.tuning.community_preamble_budget.min(budget_remaining);
        let mut sections = Vec::new();
        for summary in &input.community_summaries {
            let block = format!("### {}\n{}", summary.title, summary.summary);
            let cost = estimate_tokens(&block);
            if cost > preamble_budget {
                continue;
            }
            preamble_budget -= cost;
            sections.push(block);
        }
        if sections.is_empty() {
            None
        } else {
            let text = format!("## Thematic Overview\n{}", sections.join("\n\n"));
            let spent = input.tuning.community_preamble_budget.min(budget_remaining) - preamble_budget;
            budget_remaining -= spent;
            Some(text)
        }
    };

    let candidates = truncate_to_budget(reranked, &mut budget_remaining);

    // Step 7: side channels, each budgeted within what's left.
    let mut relationships = Vec::new();
    for rel in input.relationships.into_iter().take(input.tuning.max_relationships) {
        let cost = estimate_tokens(&format!("{} {} {}", rel.src, rel.predicate, rel.dst));
        if cost > budget_remaining {
            break;
        }
        budget_remaining -= cost;
        relationships.push(rel);
    }

    let mut entity_descriptions = Vec::new();
    for (id, desc) in input
        .entity_descriptions
        .into_iter()
        .take(input.tuning.max_entity_descriptions)
    {
        let cost = estimate_tokens(&desc);
        if cost > budget_remaining {
            break;
        }
        budget_remaining -= cost;
        entity_descriptions.push((id, desc));
    }

    let total_tokens = input.token_budget - budget_remaining;

    DistilledContext {
        candidates,
        total_tokens,
        community_preamble,
        entity_descriptions,
        relationships,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::model::CandidateSource;

    fn candidate(id: &str, text: &str, embedding: Vec<f32>, base_score: f32) -> Candidate {
        Candidate::new(id, "doc1", "sec1", text, embedding, CandidateSource::Vector, base_score, 0)
    }

    fn tuning() -> DistillTuning {
        DistillTuning::default()
    }

    #[test]
    fn exact_duplicates_collapse_to_one_with_unioned_sources() {
        let a = candidate("c1", "The invoice total is five thousand dollars.", vec![1.0, 0.0], 1.0);
        let mut b = candidate("c2", "The invoice total is five thousand dollars.", vec![1.0, 0.0], 0.5);
        b.sources.clear();
        b.sources.insert(CandidateSource::Bm25);
        let out = exact_dedup(vec![a, b]);
        assert_eq!(out.len(), 1);
        assert!(out[0].sources.contains(&CandidateSource::Vector));
        assert!(out[0].sources.contains(&CandidateSource::Bm25));
    }

    #[test]
    fn noise_filter_drops_short_labels_and_bare_headings() {
        let tuning = tuning();
        let candidates = vec![
            candidate("c1", "Name:", vec![1.0], 1.0),
            candidate("c2", "SECTION FOUR OVERVIEW", vec![1.0], 1.0),
            candidate("c3", "The tenant shall pay rent on the first of each month.", vec![1.0], 1.0),
        ];
        let out = noise_filter(candidates, &tuning);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].chunk_id, "c3");
    }

    #[test]
    fn cross_source_dedup_keeps_higher_base_score() {
        let mut low = candidate("c1", "low score variant text that is long enough.", vec![1.0], 0.2);
        low.doc_id = "d1".into();
        let mut high = low.clone();
        high.base_score = 0.9;
        high.sources.clear();
        high.sources.insert(CandidateSource::Bm25);
        let out = cross_source_dedup(vec![low, high]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].base_score, 0.9);
        assert!(out[0].sources.contains(&CandidateSource::Vector));
        assert!(out[0].sources.contains(&CandidateSource::Bm25));
    }

    #[test]
    fn no_two_candidates_share_canonicalized_text_after_full_pipeline() {
        let input = DistillInput {
            candidates: vec![
                candidate("c1", "Invoice total: $5,170.00 due upon receipt.", vec![1.0, 0.0], 1.0),
                candidate("c2", "Invoice total:   $5,170.00   due upon receipt.", vec![0.9, 0.1], 0.8),
            ],
            query_embedding: &[1.0, 0.0],
            community_summaries: vec![],
            relationships: vec![],
            entity_descriptions: vec![],
            token_budget: 1000,
            tuning: &tuning(),
        };
        let out = distill(input);
        assert_eq!(out.candidates.len(), 1);
    }

    #[test]
    fn total_tokens_never_exceeds_budget() {
        let long_text = "This clause describes termination rights in detail. ".repeat(50);
        let input = DistillInput {
            candidates: vec![candidate("c1", &long_text, vec![1.0], 1.0)],
            query_embedding: &[1.0],
            community_summaries: vec![],
            relationships: vec![],
            entity_descriptions: vec![],
            token_budget: 10,
            tuning: &tuning(),
        };
        let out = distill(input);
        assert!(out.total_tokens <= 10);
        assert!(out.candidates.is_empty());
    }

    #[test]
    fn rerank_sorts_by_blended_score_ties_by_chunk_id() {
        let candidates = vec![
            candidate("z", "A clause about payment terms and due dates in full.", vec![1.0, 0.0], 1.0),
            candidate("a", "A clause about payment terms and due dates in full.", vec![1.0, 0.0], 1.0),
        ];
        let out = unified_rerank(candidates, &[1.0, 0.0], &tuning());
        assert_eq!(out[0].chunk_id, "a");
    }
}
