use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// HTTP-layer error taxonomy, distinct from `common::EngineError` (§7):
/// the engine's error kinds are folded into the `QueryResponse` envelope
/// by the dispatcher, so this type only covers malformed requests the
/// handler rejects before ever reaching `Dispatcher::query`.
#[derive(Error, Debug, Serialize, Clone)]
pub enum ApiError {
    #[error("validation error: {0}")]
    ValidationError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::ValidationError(message) => (StatusCode::BAD_REQUEST, message),
        };
        (
            status,
            Json(ErrorResponse {
                error: message,
                status: "error".to_string(),
            }),
        )
            .into_response()
    }
}

#[derive(Serialize, Debug)]
struct ErrorResponse {
    error: String,
    status: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_maps_to_bad_request() {
        let error = ApiError::ValidationError("query_text must be non-empty".to_string());
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
