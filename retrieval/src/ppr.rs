//! Personalized PageRank tracer (§4.4.4): thin wrapper over the graph
//! store's five-path walk. The scores it returns must flow through to the
//! distiller — never discarded — per the spec's explicit note.

use tokio_util::sync::CancellationToken;

use graph_adapter::{AdapterError, Cancellable, EntityScore, GraphStore, PprConfig, SeedScores};

pub struct PprTracer<'a> {
    store: &'a dyn GraphStore,
}

impl<'a> PprTracer<'a> {
    pub fn new(store: &'a dyn GraphStore) -> Self {
        Self { store }
    }

    pub async fn trace(
        &self,
        seed_scores: &SeedScores,
        config: &PprConfig,
        cancel: &CancellationToken,
    ) -> Result<Vec<EntityScore>, AdapterError> {
        match self.store.ppr_traverse(seed_scores, config, cancel).await? {
            Cancellable::Ready(scores) => Ok(scores),
            Cancellable::Cancelled => Ok(Vec::new()),
        }
    }
}
