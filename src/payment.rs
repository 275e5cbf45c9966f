// src/payment.rs
//
// Payment orchestration and the transaction state machine. Initiation
// persists a pending row before touching the network so a crash or timeout
// mid-call still leaves an auditable record; callbacks drive the single
// pending -> {completed, failed, cancelled} transition.

use rust_decimal::Decimal;
use serde_json::{json, Map, Value};
use sqlx::PgPool;

use crate::db;
use crate::error::ApiError;
use crate::gateway::{generate_transaction_id, AamarPayClient, CustomerInfo, GatewayError};
use crate::models::{actions, Transaction, TransactionStatus};

pub const DEFAULT_AMOUNT_CENTS: i64 = 10000; // 100.00 BDT flat fee

pub fn default_amount() -> Decimal {
    Decimal::new(DEFAULT_AMOUNT_CENTS, 2)
}

#[derive(Debug)]
pub struct InitiatedPayment {
    pub transaction_id: String,
    pub payment_url: String,
}

/// Initiate a payment for the user: create the pending transaction, call the
/// gateway, and record whatever came back. No automatic retries; a retried
/// initiation is a new transaction with a new identifier.
pub async fn initiate_payment(
    pool: &PgPool,
    client: &AamarPayClient,
    user_id: i32,
    amount: Decimal,
) -> Result<InitiatedPayment, ApiError> {
    if amount <= Decimal::ZERO {
        return Err(ApiError::Validation(
            "amount must be greater than 0".to_string(),
        ));
    }

    let contact = db::get_user_contact(pool, user_id)
        .await?
        .ok_or(ApiError::NotFound("user"))?;

    let customer = CustomerInfo {
        name: contact.username.unwrap_or_else(|| contact.email.clone()),
        email: contact.email,
    };

    let transaction_id = generate_transaction_id();

    // Pending row first. A network failure after this point still leaves an
    // auditable transaction.
    db::insert_pending_transaction(pool, user_id, &transaction_id, amount).await?;

    log::info!("initiating payment user_id={user_id} transaction_id={transaction_id}");

    match client
        .initiate(&transaction_id, amount, user_id, &customer)
        .await
    {
        Ok(accepted) => {
            db::merge_gateway_response(pool, &transaction_id, &accepted.raw_response).await?;
            Ok(InitiatedPayment {
                transaction_id,
                payment_url: accepted.payment_url,
            })
        }
        Err(GatewayError::Rejected(body)) => {
            db::apply_transaction_status(
                pool,
                &transaction_id,
                TransactionStatus::Failed,
                None,
                &body,
            )
            .await?;
            log::warn!("gateway rejected payment transaction_id={transaction_id}");
            Err(ApiError::GatewayRejected(body))
        }
        Err(GatewayError::Unreachable(message)) => {
            db::apply_transaction_status(
                pool,
                &transaction_id,
                TransactionStatus::Failed,
                None,
                &json!({"error": message}),
            )
            .await?;
            log::error!("gateway unreachable transaction_id={transaction_id}: {message}");
            Err(ApiError::GatewayUnreachable(message))
        }
    }
}

/// Parse a callback body that may be JSON or form-encoded. The gateway does
/// not send a consistent content type, so the declared type picks the parser
/// and JSON is the fallback.
pub fn parse_callback_body(body: &[u8], content_type: Option<&str>) -> Result<Value, ApiError> {
    let is_form = content_type
        .map(|ct| ct.contains("x-www-form-urlencoded"))
        .unwrap_or(false);

    if is_form {
        let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(body)
            .map_err(|e| ApiError::Validation(format!("invalid form callback body: {e}")))?;
        let mut map = Map::new();
        for (key, value) in pairs {
            map.insert(key, Value::String(value));
        }
        Ok(Value::Object(map))
    } else {
        serde_json::from_slice(body)
            .map_err(|e| ApiError::Validation(format!("invalid JSON callback body: {e}")))
    }
}

/// The exact upstream status mapping. Everything not recognized as success or
/// hard failure falls into `cancelled` — a deliberate catch-all bucket, not
/// an omission.
pub fn resolve_callback_status(
    status_code: Option<&str>,
    pay_status: Option<&str>,
) -> TransactionStatus {
    match (status_code, pay_status) {
        (Some("2"), Some("Successful")) => TransactionStatus::Completed,
        (Some("7"), _) => TransactionStatus::Failed,
        _ => TransactionStatus::Cancelled,
    }
}

#[derive(Debug)]
pub struct CallbackOutcome {
    pub transaction: Transaction,
    pub status: TransactionStatus,
}

/// Apply a gateway callback. The identifier is the only authorization token
/// the callback carries; an unknown identifier is a reported `NotFound`,
/// never a silently created row. Duplicate callbacks are processed again and
/// the last write wins on the derived status.
pub async fn handle_callback(pool: &PgPool, payload: Value) -> Result<CallbackOutcome, ApiError> {
    let transaction_id = payload
        .get("mer_txnid")
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::Validation("missing mer_txnid in callback".to_string()))?
        .to_string();

    let transaction = db::find_transaction(pool, &transaction_id)
        .await?
        .ok_or(ApiError::NotFound("transaction"))?;

    let status_code = payload.get("status_code").and_then(Value::as_str);
    let pay_status = payload.get("pay_status").and_then(Value::as_str);
    let gateway_txn_id = payload.get("pg_txnid").and_then(Value::as_str);

    let status = resolve_callback_status(status_code, pay_status);

    db::apply_transaction_status(pool, &transaction_id, status, gateway_txn_id, &payload).await?;

    log::info!(
        "payment callback transaction_id={transaction_id} status={}",
        status.as_str()
    );

    if status == TransactionStatus::Completed {
        db::insert_activity(
            pool,
            transaction.user_id,
            actions::PAYMENT_COMPLETED,
            json!({
                "transaction_id": transaction_id,
                "amount": transaction.amount.to_string(),
                "pg_txnid": gateway_txn_id,
            }),
        )
        .await?;
    }

    Ok(CallbackOutcome {
        transaction,
        status,
    })
}
