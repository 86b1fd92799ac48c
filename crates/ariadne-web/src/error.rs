//! Error taxonomy for the HTTP surface

use ariadne_core::validate::ValidationIssue;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Everything an endpoint can answer with besides success
#[derive(Debug, Error)]
pub enum ApiError {
    /// One or more events failed validation; nothing was stored
    #[error("validation failed ({} issue(s))", .0.len())]
    Validation(Vec<ValidationIssue>),

    /// Request body over the ingest size gate
    #[error("payload too large")]
    PayloadTooLarge,

    /// Unparseable `since` query parameter on /events
    #[error("invalid since parameter")]
    InvalidSince,

    /// Anything unexpected; the request may be partially applied
    #[error("internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Single-issue validation failure
    pub fn validation(path: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::Validation(vec![ValidationIssue::new(path, message)])
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Validation(details) => (
                StatusCode::BAD_REQUEST,
                json!({"error": "Validation failed", "details": details}),
            ),
            ApiError::PayloadTooLarge => (
                StatusCode::PAYLOAD_TOO_LARGE,
                json!({"error": "Payload too large"}),
            ),
            ApiError::InvalidSince => (
                StatusCode::BAD_REQUEST,
                json!({"error": "Invalid since parameter"}),
            ),
            ApiError::Internal(message) => {
                error!("Internal error serving request: {}", message);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({"error": "Internal server error", "message": message}),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}
