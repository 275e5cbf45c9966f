// src/models.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

/// Transaction lifecycle: starts `pending`, moves exactly once to a terminal
/// state when the gateway callback arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(TransactionStatus::Pending),
            "completed" => Some(TransactionStatus::Completed),
            "failed" => Some(TransactionStatus::Failed),
            "cancelled" => Some(TransactionStatus::Cancelled),
            _ => None,
        }
    }
}

/// Upload lifecycle: `processing` at intake, one-way to `completed` or
/// `failed` when the worker finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Processing,
    Completed,
    Failed,
}

impl UploadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadStatus::Processing => "processing",
            UploadStatus::Completed => "completed",
            UploadStatus::Failed => "failed",
        }
    }

    pub fn from_str(raw: &str) -> Option<Self> {
        match raw {
            "processing" => Some(UploadStatus::Processing),
            "completed" => Some(UploadStatus::Completed),
            "failed" => Some(UploadStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Transaction {
    pub id: i32,
    pub user_id: i32,
    /// Caller-generated identifier, `TXN_<timestamp>_<random8>`. Immutable.
    pub transaction_id: String,
    #[schema(value_type = String)]
    pub amount: Decimal,
    pub currency: String,
    pub status: TransactionStatus,
    /// Correlation id assigned by the gateway; null until a callback arrives.
    pub gateway_txn_id: Option<String>,
    /// Raw gateway payloads, merged across calls for audit. Never replaced.
    pub gateway_response: serde_json::Value,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Upload {
    pub id: i32,
    pub user_id: i32,
    #[serde(skip_serializing)]
    pub storage_key: String,
    pub filename: String,
    pub file_size: i64,
    pub file_type: String,
    pub status: UploadStatus,
    /// Meaningful only when status is `completed`; 0 otherwise.
    pub word_count: i32,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ActivityLogEntry {
    pub id: i32,
    pub user_id: i32,
    pub action: String,
    pub metadata: serde_json::Value,
    pub created_at: Option<DateTime<Utc>>,
}

// Activity action tags. Append-only audit trail; nothing downstream depends
// on these for correctness.
pub mod actions {
    pub const FILE_UPLOADED: &str = "file_uploaded";
    pub const FILE_DELETED: &str = "file_deleted";
    pub const FILE_PROCESSED: &str = "file_processed";
    pub const FILE_PROCESSING_FAILED: &str = "file_processing_failed";
    pub const PAYMENT_COMPLETED: &str = "payment_completed";
}
