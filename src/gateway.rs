// src/gateway.rs
//
// Client for the aamarPay hosted-checkout API. One POST per initiation; the
// gateway answers with a `result` flag and, on acceptance, a hosted
// `payment_url` the customer is redirected to.

use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::config::GatewayConfig;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Transport failure: timeout, connection refused, non-JSON body.
    /// Callers may retry with a fresh transaction; the gateway honors no
    /// idempotency key, so a retried initiation is a new transaction.
    #[error("gateway unreachable: {0}")]
    Unreachable(String),

    /// The gateway answered but declined; raw response attached for audit.
    #[error("gateway rejected the request")]
    Rejected(Value),
}

/// Customer display fields embedded in the outbound request. The gateway
/// requires them; we send fixed placeholders where the account has no data,
/// same as the upstream integration.
#[derive(Debug, Clone)]
pub struct CustomerInfo {
    pub name: String,
    pub email: String,
}

/// A positive gateway answer: where to send the customer, plus the raw body.
#[derive(Debug)]
pub struct AcceptedPayment {
    pub payment_url: String,
    /// Raw accepted response, persisted for audit.
    pub raw_response: Value,
}

#[derive(Clone)]
pub struct AamarPayClient {
    http: reqwest::Client,
    config: GatewayConfig,
}

/// `TXN_<second-resolution timestamp>_<8 random hex chars>`. Collisions are
/// practically negligible at expected traffic; the column is still UNIQUE.
pub fn generate_transaction_id() -> String {
    let timestamp = Utc::now().format("%Y%m%d%H%M%S");
    let unique = Uuid::new_v4().simple().to_string();
    format!("TXN_{}_{}", timestamp, &unique[..8])
}

impl AamarPayClient {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    /// Build the documented request body. `opt_a` carries the owning user id
    /// as passthrough metadata for correlation on return.
    fn build_payload(
        &self,
        transaction_id: &str,
        amount: Decimal,
        user_id: i32,
        customer: &CustomerInfo,
    ) -> Value {
        json!({
            "store_id": self.config.store_id,
            "signature_key": self.config.signature_key,
            "tran_id": transaction_id,
            "amount": amount.to_string(),
            "currency": "BDT",
            "desc": "File Upload Payment",
            "cus_name": customer.name,
            "cus_email": customer.email,
            "cus_phone": "+8801700000000",
            "success_url": self.config.success_url,
            "fail_url": self.config.fail_url,
            "cancel_url": self.config.cancel_url,
            "type": "json",
            "cus_add1": "Dhaka",
            "cus_city": "Dhaka",
            "cus_state": "Dhaka",
            "cus_country": "Bangladesh",
            "opt_a": user_id.to_string(),
        })
    }

    pub async fn initiate(
        &self,
        transaction_id: &str,
        amount: Decimal,
        user_id: i32,
        customer: &CustomerInfo,
    ) -> Result<AcceptedPayment, GatewayError> {
        let payload = self.build_payload(transaction_id, amount, user_id, customer);

        let resp = self
            .http
            .post(&self.config.endpoint_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| GatewayError::Unreachable(e.to_string()))?;

        let body: Value = resp
            .json()
            .await
            .map_err(|e| GatewayError::Unreachable(format!("non-JSON gateway response: {e}")))?;

        if body.get("result").and_then(Value::as_str) == Some("true") {
            let payment_url = body
                .get("payment_url")
                .and_then(Value::as_str)
                .map(str::to_string);
            match payment_url {
                Some(url) => Ok(AcceptedPayment {
                    payment_url: url,
                    raw_response: body,
                }),
                // Accepted without a URL is a malformed answer; treat it as a
                // rejection so the transaction is marked failed with the body.
                None => Err(GatewayError::Rejected(body)),
            }
        } else {
            Err(GatewayError::Rejected(body))
        }
    }
}
