//! Hub-entity extractor (§4.4.3): selects the entities per matched
//! community closest to the query embedding, tie-broken by degree,
//! deduplicated across communities, with artifact filtering.

use std::collections::HashSet;

use tokio_util::sync::CancellationToken;

use common::model::Entity;
use graph_adapter::{AdapterError, Cancellable, GraphStore};

use crate::community::MatchedCommunity;
use crate::util::cosine;

pub struct HubEntityExtractor<'a> {
    store: &'a dyn GraphStore,
}

impl<'a> HubEntityExtractor<'a> {
    pub fn new(store: &'a dyn GraphStore) -> Self {
        Self { store }
    }

    pub async fn extract(
        &self,
        matched_communities: &[MatchedCommunity],
        query_embedding: &[f32],
        top_k_per_community: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<Entity>, AdapterError> {
        let mut out: Vec<Entity> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for matched in matched_communities {
            if matched.community.member_entity_ids.is_empty() {
                continue;
            }
            let members = match self
                .store
                .vector_search_entities(query_embedding, matched.community.member_entity_ids.len(), cancel)
                .await?
            {
                Cancellable::Ready(v) => v,
                Cancellable::Cancelled => return Ok(out),
            };

            let member_set: HashSet<&str> = matched
                .community
                .member_entity_ids
                .iter()
                .map(String::as_str)
                .collect();

            let mut candidates: Vec<(Entity, f32)> = members
                .into_iter()
                .filter(|e| member_set.contains(e.entity_id.as_str()))
                .filter(|e| !Entity::looks_like_artifact(&e.name))
                .map(|e| {
                    let score = cosine(query_embedding, &e.embedding);
                    (e, score)
                })
                .collect();

            candidates.sort_by(|a, b| {
                b.1.partial_cmp(&a.1)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| b.0.degree.cmp(&a.0.degree))
                    .then_with(|| a.0.entity_id.cmp(&b.0.entity_id))
            });

            for (entity, _) in candidates.into_iter().take(top_k_per_community) {
                if seen.insert(entity.entity_id.clone()) {
                    out.push(entity);
                }
            }
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_names_are_filtered_before_ranking() {
        assert!(Entity::looks_like_artifact("chunk_abc123"));
        assert!(Entity::looks_like_artifact("-"));
        assert!(Entity::looks_like_artifact("X"));
        assert!(!Entity::looks_like_artifact("Acme Corp"));
    }
}
