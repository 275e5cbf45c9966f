// src/error.rs

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

/// Service-wide error taxonomy. The first four are caller-visible and map
/// straight to 4xx responses; the rest are recorded per-entity and surface
/// as 5xx only when a request path hits them directly.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("payment required before uploading files")]
    PaymentRequired,

    #[error("{0} not found")]
    NotFound(&'static str),

    /// Transport-level failure talking to the payment gateway. Distinct from
    /// `GatewayRejected` so callers can decide to retry only this one.
    #[error("payment gateway unreachable: {0}")]
    GatewayUnreachable(String),

    /// The gateway answered but declined the request; raw payload attached.
    #[error("payment gateway rejected the request")]
    GatewayRejected(serde_json::Value),

    /// Word-count extraction failed for a specific file. Absorbed into the
    /// upload's terminal `failed` status, never returned to the uploader.
    #[error("processing failed: {0}")]
    Processing(String),

    /// A status write on the failure path itself failed. Loud on purpose so
    /// a supervisor can alert instead of the error being swallowed.
    #[error("persistence failure: {0}")]
    Persistence(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::PaymentRequired => StatusCode::PAYMENT_REQUIRED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::GatewayUnreachable(_) => StatusCode::BAD_GATEWAY,
            ApiError::GatewayRejected(_) => StatusCode::BAD_REQUEST,
            ApiError::Processing(_)
            | ApiError::Persistence(_)
            | ApiError::Database(_)
            | ApiError::Storage(_)
            | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            ApiError::GatewayRejected(payload) => json!({
                "error": self.to_string(),
                "gateway_response": payload,
            }),
            // Internal details stay out of responses; logs carry them.
            ApiError::Database(_) | ApiError::Internal(_) | ApiError::Storage(_) => {
                json!({"error": "internal server error"})
            }
            other => json!({"error": other.to_string()}),
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}
