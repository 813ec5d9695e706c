//! Semantic beam walker (§4.4.6), used by Route 4 (Drift). Thin wrapper over
//! the graph store's `beam_expand`, which already performs the top-K-per-hop
//! trim; this module just shapes the result for route consumption and keeps
//! the path for citation provenance.

use tokio_util::sync::CancellationToken;

use graph_adapter::{AdapterError, BeamHit, Cancellable, GraphStore};

pub struct SemanticBeamWalker<'a> {
    store: &'a dyn GraphStore,
}

impl<'a> SemanticBeamWalker<'a> {
    pub fn new(store: &'a dyn GraphStore) -> Self {
        Self { store }
    }

    pub async fn walk(
        &self,
        seed_entity_ids: &[String],
        query_embedding: &[f32],
        hops: usize,
        beam_width: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<BeamHit>, AdapterError> {
        match self
            .store
            .beam_expand(seed_entity_ids, query_embedding, hops, beam_width, cancel)
            .await?
        {
            Cancellable::Ready(hits) => Ok(hits),
            Cancellable::Cancelled => Ok(Vec::new()),
        }
    }
}
