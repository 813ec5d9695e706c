//! R2 Local: entity-anchored queries ("who is X"). Seed entities via name
//! match plus vector match on entity embeddings, trace the five-path PPR
//! walk, expand mentions with PPR-weighted scores, distill (§4.6).

use std::collections::HashMap;

use tokio::try_join;
use tokio_util::sync::CancellationToken;

use common::config::{DistillTuning, RetrievalTuning};
use graph_adapter::{AdapterError, Cancellable, EntityScore, GraphStore, PprConfig, SeedScores};
use retrieval::distill::{distill, DistillInput};
use retrieval::mentions::{MentionsConfig, MentionsExpander};
use retrieval::ppr::PprTracer;
use retrieval::util::cosine;

use crate::RouteOutput;

/// Extracts capitalized-word runs from the query text as naive proper-noun
/// candidates for the name-match half of seed identification.
pub fn extract_name_candidates(query_text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for word in query_text.split_whitespace() {
        let trimmed = word.trim_matches(|c: char| !c.is_alphanumeric());
        if trimmed.chars().next().is_some_and(char::is_uppercase) {
            current.push(trimmed);
        } else if !current.is_empty() {
            out.push(current.join(" "));
            current.clear();
        }
    }
    if !current.is_empty() {
        out.push(current.join(" "));
    }
    out
}

pub async fn run(
    store: &dyn GraphStore,
    query_text: &str,
    query_embedding: &[f32],
    retrieval_tuning: &RetrievalTuning,
    distill_tuning: &DistillTuning,
    token_budget: usize,
    cancel: &CancellationToken,
) -> Result<RouteOutput, AdapterError> {
    let name_candidates = extract_name_candidates(query_text);

    let (named, vector_matched) = try_join!(
        store.find_entities_by_name(&name_candidates, cancel),
        store.vector_search_entities(query_embedding, retrieval_tuning.hub_top_k_per_community, cancel),
    )?;

    let named = match named {
        Cancellable::Ready(v) => v,
        Cancellable::Cancelled => return Ok(RouteOutput::default()),
    };
    let vector_matched = match vector_matched {
        Cancellable::Ready(v) => v,
        Cancellable::Cancelled => return Ok(RouteOutput::default()),
    };

    let mut seed_scores: SeedScores = HashMap::new();
    let mut name_by_id: HashMap<String, String> = HashMap::new();
    for entity in &named {
        seed_scores.insert(entity.entity_id.clone(), 1.0);
        name_by_id.insert(entity.entity_id.clone(), entity.name.clone());
    }
    for entity in &vector_matched {
        let score = cosine(query_embedding, &entity.embedding);
        seed_scores
            .entry(entity.entity_id.clone())
            .and_modify(|s| *s = s.max(score))
            .or_insert(score);
        name_by_id.insert(entity.entity_id.clone(), entity.name.clone());
    }

    if seed_scores.is_empty() {
        return Ok(RouteOutput::default());
    }

    let ppr_config = PprConfig {
        damping: retrieval_tuning.ppr_damping,
        sim_weight: retrieval_tuning.ppr_sim_weight,
        hub_weight: retrieval_tuning.ppr_hub_weight,
        max_neighbors_per_seed: 50,
    };
    let tracer = PprTracer::new(store);
    let entity_scores = tracer.trace(&seed_scores, &ppr_config, cancel).await?;

    let evidence_nodes: Vec<(String, f32)> = entity_scores
        .iter()
        .map(|e| (e.entity_id.clone(), e.score))
        .collect();

    // Resolve names for any PPR-expanded entity ids we don't already know.
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
    let candidates = expander
        .expand(&entity_scores, |id| name_by_id.get(id).cloned(), &mentions_config, cancel)
        .await?;

    let top_entity_ids: Vec<String> = entity_scores_top(&entity_scores, 20);
    let entity_descriptions = match store.fetch_entity_descriptions(&top_entity_ids, cancel).await? {
        Cancellable::Ready(v) => v,
        Cancellable::Cancelled => vec![],
    };
    let relationships = match store
        .expand_relationships(&top_entity_ids, distill_tuning.max_relationships, cancel)
        .await?
    {
        Cancellable::Ready(v) => v,
        Cancellable::Cancelled => vec![],
    };

    let context = distill(DistillInput {
        candidates,
        query_embedding,
        community_summaries: vec![],
        relationships,
        entity_descriptions,
        token_budget,
        tuning: distill_tuning,
    });

    Ok(RouteOutput {
        context,
        evidence_nodes,
    })
}

fn entity_scores_top(scores: &[EntityScore], n: usize) -> Vec<String> {
    scores.iter().take(n).map(|e| e.entity_id.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_consecutive_capitalized_runs() {
        let out = extract_name_candidates("Trace the relationship between Acme Corp and Globex Inc");
        assert!(out.contains(&"Acme Corp".to_string()));
        assert!(out.contains(&"Globex Inc".to_string()));
    }

    #[test]
    fn no_capitalized_words_yields_empty() {
        assert!(extract_name_candidates("what is the invoice total").is_empty());
    }
}
