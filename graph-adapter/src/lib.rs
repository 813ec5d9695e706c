pub mod ppr;
pub mod schema;
pub mod surreal;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use common::model::{Community, Document, Entity, Relationship, TextChunk};

pub use surreal::SurrealGraphStore;

/// Failure mode for a `GraphStore` operation (§4.1). `Transient` is
/// retriable once with a fixed delay; `Fatal` surfaces immediately.
#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("transient graph store error: {0}")]
    Transient(String),
    #[error("graph store error: {0}")]
    Fatal(String),
}

impl AdapterError {
    pub fn is_transient(&self) -> bool {
        matches!(self, AdapterError::Transient(_))
    }
}

/// Wraps the outcome of a cancellable operation. Cancellation never
/// surfaces as an error — callers must check the sentinel before using a
/// result (§4.1, §5).
#[derive(Debug)]
pub enum Cancellable<T> {
    Ready(T),
    Cancelled,
}

impl<T> Cancellable<T> {
    pub fn into_ready(self) -> Option<T> {
        match self {
            Cancellable::Ready(v) => Some(v),
            Cancellable::Cancelled => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchedChunk {
    pub chunk_id: String,
    pub chunk: Option<TextChunk>,
}

#[derive(Debug, Clone, Copy)]
pub struct ScoredId {
    pub id_index: usize,
}

#[derive(Debug, Clone)]
pub struct VectorHit {
    pub id: String,
    pub chunk_id: String,
    pub score: f32,
}

#[derive(Debug, Clone)]
pub struct ChunkHit {
    pub chunk_id: String,
    pub score: f32,
}

#[derive(Debug, Clone)]
pub struct MentionHit {
    pub entity_name: String,
    pub chunk_id: String,
}

#[derive(Debug, Clone)]
pub struct EntityScore {
    pub entity_id: String,
    pub score: f32,
}

#[derive(Debug, Clone)]
pub struct BeamHit {
    pub entity_id: String,
    pub path: Vec<String>,
}

/// Seed weights for the personalized PageRank walk (§4.4.4).
pub type SeedScores = std::collections::HashMap<String, f32>;

#[derive(Debug, Clone)]
pub struct PprConfig {
    pub damping: f32,
    pub sim_weight: f32,
    pub hub_weight: f32,
    pub max_neighbors_per_seed: usize,
}

/// Narrow, typed operation surface over the knowledge graph (§4.1). No
/// query logic or scoring lives here beyond what the contract requires
/// (PPR combination, BM25/vector ranking) — route orchestration and
/// candidate fusion are the caller's job.
#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn fetch_chunks(
        &self,
        chunk_ids: &[String],
        cancel: &CancellationToken,
    ) -> Result<Cancellable<Vec<FetchedChunk>>, AdapterError>;

    async fn vector_search_sentences(
        &self,
        embedding: &[f32],
        k: usize,
        min_score: f32,
        cancel: &CancellationToken,
    ) -> Result<Cancellable<Vec<VectorHit>>, AdapterError>;

    async fn vector_search_chunks(
        &self,
        embedding: &[f32],
        k: usize,
        min_score: f32,
        cancel: &CancellationToken,
    ) -> Result<Cancellable<Vec<ChunkHit>>, AdapterError>;

    async fn bm25_search_chunks(
        &self,
        query_text: &str,
        k: usize,
        cancel: &CancellationToken,
    ) -> Result<Cancellable<Vec<ChunkHit>>, AdapterError>;

    async fn mentions_to_chunks(
        &self,
        entity_names: &[String],
        limit_per_entity: usize,
        cancel: &CancellationToken,
    ) -> Result<Cancellable<Vec<MentionHit>>, AdapterError>;

    async fn expand_relationships(
        &self,
        entity_ids: &[String],
        max_edges: usize,
        cancel: &CancellationToken,
    ) -> Result<Cancellable<Vec<Relationship>>, AdapterError>;

    async fn ppr_traverse(
        &self,
        seed_scores: &SeedScores,
        config: &PprConfig,
        cancel: &CancellationToken,
    ) -> Result<Cancellable<Vec<EntityScore>>, AdapterError>;

    async fn beam_expand(
        &self,
        seed_entity_ids: &[String],
        query_embedding: &[f32],
        hops: usize,
        beam_width: usize,
        cancel: &CancellationToken,
    ) -> Result<Cancellable<Vec<BeamHit>>, AdapterError>;

    async fn fetch_communities(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Cancellable<Vec<Community>>, AdapterError>;

    async fn fetch_entity_descriptions(
        &self,
        entity_ids: &[String],
        cancel: &CancellationToken,
    ) -> Result<Cancellable<Vec<(String, String)>>, AdapterError>;

    async fn vector_search_entities(
        &self,
        embedding: &[f32],
        k: usize,
        cancel: &CancellationToken,
    ) -> Result<Cancellable<Vec<Entity>>, AdapterError>;

    async fn find_entities_by_name(
        &self,
        names: &[String],
        cancel: &CancellationToken,
    ) -> Result<Cancellable<Vec<Entity>>, AdapterError>;

    /// Resolves entity ids (e.g. from a PPR trace's expanded neighbors,
    /// which carry no name) back to full records. Not one of §4.1's listed
    /// operations verbatim, but required to bridge `ppr_traverse`'s
    /// id-keyed output into `mentions_to_chunks`'s name-keyed input.
    async fn fetch_entities_by_id(
        &self,
        entity_ids: &[String],
        cancel: &CancellationToken,
    ) -> Result<Cancellable<Vec<Entity>>, AdapterError>;

    /// Lists the corpus's documents, used only by R3's coverage gap-fill
    /// (§4.6) to detect documents absent from the candidate set. Not one of
    /// §4.1's listed operations verbatim, but required by that behavior.
    async fn list_documents(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Cancellable<Vec<Document>>, AdapterError>;

    /// The first chunk of a document (lowest section index, no
    /// `prev_chunk_id`), inserted for documents the gap-fill pass finds
    /// missing from the final candidate set.
    async fn fetch_lead_chunk(
        &self,
        doc_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Cancellable<Option<TextChunk>>, AdapterError>;
}
