// src/api/webhooks.rs
//
// Gateway-initiated payment callbacks. The gateway POSTs to whichever of the
// three redirect URLs applies, with a JSON or form-encoded body; the outcome
// is decided by the payload's status fields, not by which route was hit, so
// all three feed the same state machine. No signature verification exists
// upstream: the unguessable transaction identifier is the only authorization
// token the callback carries.

use actix_web::{post, web, HttpRequest, HttpResponse};
// Aliased so the `utoipa::path` macro does not try to infer an OpenAPI
// request body schema from the raw `Bytes` extractor (the inference is
// name-based and `Bytes` lacks `ToSchema`).
use actix_web::web::Bytes as RawBody;
use serde_json::json;

use crate::error::ApiError;
use crate::{payment, AppState};

async fn handle_gateway_callback(
    req: &HttpRequest,
    body: RawBody,
    state: &AppState,
) -> Result<HttpResponse, ApiError> {
    let content_type = req
        .headers()
        .get(actix_web::http::header::CONTENT_TYPE)
        .and_then(|h| h.to_str().ok());

    let payload = payment::parse_callback_body(&body, content_type)?;
    let outcome = payment::handle_callback(&state.pool, payload).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "transaction_id": outcome.transaction.transaction_id,
        "status": outcome.status,
    })))
}

#[utoipa::path(
    post,
    path = "/payments/callback/success",
    tag = "webhooks",
    responses(
        (status = 200, description = "Callback processed"),
        (status = 400, description = "Malformed callback body"),
        (status = 404, description = "Unknown transaction identifier")
    )
)]
#[post("/payments/callback/success")]
pub async fn payment_success(
    req: HttpRequest,
    body: RawBody,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    handle_gateway_callback(&req, body, &state).await
}

#[utoipa::path(
    post,
    path = "/payments/callback/fail",
    tag = "webhooks",
    responses(
        (status = 200, description = "Callback processed"),
        (status = 404, description = "Unknown transaction identifier")
    )
)]
#[post("/payments/callback/fail")]
pub async fn payment_fail(
    req: HttpRequest,
    body: RawBody,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    handle_gateway_callback(&req, body, &state).await
}

#[utoipa::path(
    post,
    path = "/payments/callback/cancel",
    tag = "webhooks",
    responses(
        (status = 200, description = "Callback processed"),
        (status = 404, description = "Unknown transaction identifier")
    )
)]
#[post("/payments/callback/cancel")]
pub async fn payment_cancel(
    req: HttpRequest,
    body: RawBody,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    handle_gateway_callback(&req, body, &state).await
}
