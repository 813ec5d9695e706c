use axum::{extract::State, response::IntoResponse, Json};
use common::model::{QueryRequest, QueryResponse};
use embedding_client::EmbeddingClient;

use crate::api_state::ApiState;

/// The canonical query entry point (§6): `query(QueryRequest) ->
/// QueryResponse`. Every failure mode — validation, timeout, unavailable
/// dependency, refusal — is folded into the response envelope rather than
/// an HTTP error status, matching the single-operation contract the
/// dispatcher exposes.
pub async fn query<E: EmbeddingClient + 'static>(
    State(state): State<ApiState<E>>,
    Json(request): Json<QueryRequest>,
) -> impl IntoResponse {
    let response: QueryResponse = state.dispatcher.query(request).await;
    Json(response)
}
