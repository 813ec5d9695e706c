use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use embedding_client::EmbeddingClient;
use serde_json::json;

use crate::api_state::ApiState;

/// Readiness probe: returns 200 if the graph store answers, else 503.
pub async fn ready<E: EmbeddingClient + 'static>(State(state): State<ApiState<E>>) -> impl IntoResponse {
    if state.dispatcher.health_check().await {
        (
            StatusCode::OK,
            Json(json!({"status": "ok", "checks": {"graph_store": "ok"}})),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"status": "error", "checks": {"graph_store": "fail"}})),
        )
    }
}
