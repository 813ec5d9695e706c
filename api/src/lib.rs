//! Thin Axum wrapper around the query engine (§6 External Interfaces):
//! `POST /api/v1/query`, plus `/live`/`/ready` probes for process
//! supervisors. No auth or tenancy layer — both are explicit Non-goals
//! (§1) left to an external collaborator.

pub mod api_state;
pub mod error;
mod routes;

use api_state::ApiState;
use axum::{
    extract::FromRef,
    routing::{get, post},
    Router,
};
use embedding_client::EmbeddingClient;

use routes::{liveness::live, query::query, readiness::ready};

/// Router for the query engine's API, version 1.
pub fn api_routes_v1<E, S>(_app_state: &ApiState<E>) -> Router<S>
where
    E: EmbeddingClient + 'static,
    S: Clone + Send + Sync + 'static,
    ApiState<E>: FromRef<S>,
{
    Router::new()
        .route("/ready", get(ready::<E>))
        .route("/live", get(live))
        .route("/query", post(query::<E>))
}
