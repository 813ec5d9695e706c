//! Route orchestrators (§4.6): R1 Vector, R2 Local, R3 Global, R4 Drift.
//! Each composes the candidate retrievers and the distiller differently;
//! independent retrievers inside one route run concurrently under the
//! query's deadline, then the distiller runs once, sequentially.

pub mod drift;
pub mod gapfill;
pub mod global;
pub mod local;
pub mod vector;

use std::collections::HashMap;

use common::model::{Candidate, CandidateSource, DistilledContext, TextChunk};
use graph_adapter::FetchedChunk;

/// What a route orchestrator hands back to the dispatcher: the distilled
/// evidence plus the top-K entity scores for the response envelope's
/// `evidence_nodes` (§6).
#[derive(Debug, Clone, Default)]
pub struct RouteOutput {
    pub context: DistilledContext,
    pub evidence_nodes: Vec<(String, f32)>,
}

/// Builds full `Candidate`s from a ranked chunk-id list plus the fetched
/// chunk rows, dropping ids the store reported missing (§4.1
/// `fetch_chunks` contract: missing ids are a flag, never an error, but an
/// evidence candidate with no text cannot be scored or cited).
pub(crate) fn candidates_from_ranked(
    ranked: &[(String, f32, CandidateSource)],
    fetched: &[FetchedChunk],
) -> Vec<Candidate> {
    let by_id: HashMap<&str, &TextChunk> = fetched
        .iter()
        .filter_map(|f| f.chunk.as_ref().map(|c| (f.chunk_id.as_str(), c)))
        .collect();

    ranked
        .iter()
        .enumerate()
        .filter_map(|(rank, (chunk_id, score, source))| {
            let chunk = by_id.get(chunk_id.as_str())?;
            let mut candidate = Candidate::new(
                chunk.chunk_id.clone(),
                chunk.doc_id.clone(),
                chunk.section_id.clone(),
                chunk.text.clone(),
                chunk.embedding.clone(),
                *source,
                *score,
                rank,
            );
            candidate.entity_anchors = chunk.mentions.clone();
            Some(candidate)
        })
        .collect()
}

/// `doc_id` lookup used by the hybrid retriever's document-diversity pass,
/// backed by the same fetched-chunk rows.
pub(crate) fn doc_of_map(fetched: &[FetchedChunk]) -> HashMap<String, String> {
    fetched
        .iter()
        .filter_map(|f| f.chunk.as_ref().map(|c| (f.chunk_id.clone(), c.doc_id.clone())))
        .collect()
}
