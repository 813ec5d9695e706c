//! Mentions expander (§4.4.5): fetches chunks mentioning a set of entities,
//! scores each chunk by the best-scoring source entity's PPR score, and
//! diversifies at section and document granularity.

use std::collections::HashMap;

use tokio_util::sync::CancellationToken;

use common::model::{Candidate, CandidateSource, TextChunk};
use graph_adapter::{AdapterError, Cancellable, EntityScore, GraphStore};

#[derive(Debug, Clone)]
pub struct MentionsConfig {
    pub max_chunks_per_entity: usize,
    pub max_per_section: usize,
    pub max_per_doc: usize,
}

impl Default for MentionsConfig {
    fn default() -> Self {
        Self {
            max_chunks_per_entity: 3,
            max_per_section: 3,
            max_per_doc: 6,
        }
    }
}

pub struct MentionsExpander<'a> {
    store: &'a dyn GraphStore,
}

impl<'a> MentionsExpander<'a> {
    pub fn new(store: &'a dyn GraphStore) -> Self {
        Self { store }
    }

    pub async fn expand(
        &self,
        entity_scores: &[EntityScore],
        entity_name_of: impl Fn(&str) -> Option<String>,
        config: &MentionsConfig,
        cancel: &CancellationToken,
    ) -> Result<Vec<Candidate>, AdapterError> {
        if entity_scores.is_empty() {
            return Ok(Vec::new());
        }

        let score_by_entity: HashMap<&str, f32> = entity_scores
            .iter()
            .map(|e| (e.entity_id.as_str(), e.score))
            .collect();

        let names: Vec<String> = entity_scores
            .iter()
            .filter_map(|e| entity_name_of(&e.entity_id))
            .collect();
        let name_to_entity: HashMap<String, &str> = entity_scores
            .iter()
            .filter_map(|e| entity_name_of(&e.entity_id).map(|n| (n, e.entity_id.as_str())))
            .collect();

        let hits = match self
            .store
            .mentions_to_chunks(&names, config.max_chunks_per_entity, cancel)
            .await?
        {
            Cancellable::Ready(v) => v,
            Cancellable::Cancelled => return Ok(Vec::new()),
        };

        // best-scoring source entity per chunk
        let mut best_per_chunk: HashMap<String, f32> = HashMap::new();
        for hit in &hits {
            let entity_id = name_to_entity.get(&hit.entity_name).copied().unwrap_or("");
            let score = score_by_entity.get(entity_id).copied().unwrap_or(0.0);
            best_per_chunk
                .entry(hit.chunk_id.clone())
                .and_modify(|s| {
                    if score > *s {
                        *s = score;
                    }
                })
                .or_insert(score);
        }

        let chunk_ids: Vec<String> = best_per_chunk.keys().cloned().collect();
        let fetched = match self.store.fetch_chunks(&chunk_ids, cancel).await? {
            Cancellable::Ready(v) => v,
            Cancellable::Cancelled => return Ok(Vec::new()),
        };

        let mut chunks: Vec<(TextChunk, f32)> = fetched
            .into_iter()
            .filter_map(|f| f.chunk.map(|c| (c.clone(), best_per_chunk.get(&f.chunk_id).copied().unwrap_or(0.0))))
            .collect();

        chunks.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.chunk_id.cmp(&b.0.chunk_id))
        });

        let mut per_section: HashMap<String, usize> = HashMap::new();
        let mut per_doc: HashMap<String, usize> = HashMap::new();
        let mut out = Vec::new();

        for (rank, (chunk, score)) in chunks.into_iter().enumerate() {
            let section_count = per_section.entry(chunk.section_id.clone()).or_insert(0);
            let doc_count = per_doc.entry(chunk.doc_id.clone()).or_insert(0);
            if *section_count >= config.max_per_section || *doc_count >= config.max_per_doc {
                continue;
            }
            *section_count += 1;
            *doc_count += 1;

            let mut candidate = Candidate::new(
                chunk.chunk_id.clone(),
                chunk.doc_id.clone(),
                chunk.section_id.clone(),
                chunk.text.clone(),
                chunk.embedding.clone(),
                CandidateSource::Mentions,
                score,
                rank,
            );
            candidate.entity_anchors = chunk.mentions.clone();
            out.push(candidate);
        }

        Ok(out)
    }
}
