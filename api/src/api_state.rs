use std::sync::Arc;

use dispatcher::Dispatcher;
use embedding_client::EmbeddingClient;

/// Process-wide state shared across every request: one `Dispatcher`
/// instance wrapping the graph store, embedding client, and LLM client.
/// Constructed once at startup (`query-engine`'s process wiring) and
/// cloned cheaply (the `Dispatcher` itself is behind an `Arc`) per request.
/// Generic over the embedding client so the production `OpenAiEmbeddingClient`
/// and test-only `HashedEmbeddingClient` share this same router plumbing.
pub struct ApiState<E: EmbeddingClient> {
    pub dispatcher: Arc<Dispatcher<E>>,
}

impl<E: EmbeddingClient> Clone for ApiState<E> {
    fn clone(&self) -> Self {
        Self {
            dispatcher: self.dispatcher.clone(),
        }
    }
}

impl<E: EmbeddingClient> ApiState<E> {
    pub fn new(dispatcher: Arc<Dispatcher<E>>) -> Self {
        Self { dispatcher }
    }
}
