use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::error;
use uuid::Uuid;

/// Unified error type for API responses.
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Internal(String),
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(msg) => write!(f, "not_found: {msg}"),
            Self::BadRequest(msg) => write!(f, "bad_request: {msg}"),
            Self::Internal(msg) => write!(f, "internal_error: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::NotFound(msg) => {
                let body = json!({ "error": msg });
                (StatusCode::NOT_FOUND, axum::Json(body)).into_response()
            }
            Self::BadRequest(msg) => {
                let body = json!({ "error": msg });
                (StatusCode::BAD_REQUEST, axum::Json(body)).into_response()
            }
            Self::Internal(msg) => {
                // Internal details stay in the log, keyed by correlation id.
                let correlation_id = Uuid::new_v4();
                error!("ApiError [{}]: {}", correlation_id, msg);
                let body = json!({
                    "error": "internal error",
                    "correlation_id": correlation_id.to_string(),
                });
                (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(body)).into_response()
            }
        }
    }
}
