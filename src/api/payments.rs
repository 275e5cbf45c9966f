// src/api/payments.rs

use actix_web::web::ReqData;
use actix_web::{get, post, web, HttpResponse};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::{db, payment, AppState};

#[derive(Debug, Deserialize, ToSchema)]
pub struct InitiatePaymentRequest {
    /// Flat fee when omitted.
    #[schema(value_type = Option<String>)]
    pub amount: Option<Decimal>,
}

#[utoipa::path(
    post,
    path = "/api/payments/initiate",
    tag = "payments",
    request_body = InitiatePaymentRequest,
    responses(
        (status = 200, description = "Payment initiated or already completed"),
        (status = 400, description = "Gateway rejected the request"),
        (status = 502, description = "Gateway unreachable")
    )
)]
#[post("/payments/initiate")]
pub async fn initiate_payment(
    state: web::Data<AppState>,
    user_id: ReqData<i32>,
    payload: web::Json<InitiatePaymentRequest>,
) -> Result<HttpResponse, ApiError> {
    let user_id = *user_id;

    // Already paid: nothing to initiate, the gate is open.
    if db::has_completed_transaction(&state.pool, user_id).await? {
        return Ok(HttpResponse::Ok().json(json!({
            "message": "You have already made a successful payment",
            "can_upload": true,
        })));
    }

    let amount = payload.amount.unwrap_or_else(payment::default_amount);
    let initiated = payment::initiate_payment(&state.pool, &state.gateway, user_id, amount).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "payment_url": initiated.payment_url,
        "transaction_id": initiated.transaction_id,
        "message": "Payment initiated successfully",
    })))
}

#[utoipa::path(
    get,
    path = "/api/payments/transactions",
    tag = "payments",
    responses((status = 200, description = "Caller's transactions"))
)]
#[get("/payments/transactions")]
pub async fn list_transactions(
    state: web::Data<AppState>,
    user_id: ReqData<i32>,
) -> Result<HttpResponse, ApiError> {
    let transactions = db::list_user_transactions(&state.pool, *user_id).await?;

    Ok(HttpResponse::Ok().json(json!({
        "count": transactions.len(),
        "transactions": transactions,
    })))
}

#[utoipa::path(
    get,
    path = "/api/payments/check-status",
    tag = "payments",
    responses((status = 200, description = "Whether the caller may upload"))
)]
#[get("/payments/check-status")]
pub async fn check_payment_status(
    state: web::Data<AppState>,
    user_id: ReqData<i32>,
) -> Result<HttpResponse, ApiError> {
    let can_upload = db::has_completed_transaction(&state.pool, *user_id).await?;

    Ok(HttpResponse::Ok().json(json!({
        "can_upload": can_upload,
        "message": if can_upload {
            "You can upload files"
        } else {
            "Payment required to upload files"
        },
    })))
}
