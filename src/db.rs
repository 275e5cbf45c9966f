// src/db.rs
//
// All persistence is runtime sqlx queries over single-row, auto-committed
// writes. Gateway payloads are merged into the stored jsonb, never replaced,
// so every callback augments the audit trail.

use rust_decimal::Decimal;
use sqlx::{PgPool, Row};

use crate::models::{
    ActivityLogEntry, Transaction, TransactionStatus, Upload, UploadStatus,
};

fn transaction_from_row(r: sqlx::postgres::PgRow) -> Transaction {
    let status: String = r.get("status");
    Transaction {
        id: r.get("id"),
        user_id: r.get("user_id"),
        transaction_id: r.get("transaction_id"),
        amount: r.get("amount"),
        currency: r.get::<String, _>("currency").trim_end().to_string(),
        status: TransactionStatus::from_str(&status).unwrap_or(TransactionStatus::Pending),
        gateway_txn_id: r.get("gateway_txn_id"),
        gateway_response: r.get("gateway_response"),
        created_at: r.get("created_at"),
    }
}

fn upload_from_row(r: sqlx::postgres::PgRow) -> Upload {
    let status: String = r.get("status");
    Upload {
        id: r.get("id"),
        user_id: r.get("user_id"),
        storage_key: r.get("storage_key"),
        filename: r.get("filename"),
        file_size: r.get("file_size"),
        file_type: r.get("file_type"),
        status: UploadStatus::from_str(&status).unwrap_or(UploadStatus::Processing),
        word_count: r.get("word_count"),
        created_at: r.get("created_at"),
    }
}

const TRANSACTION_COLUMNS: &str = "id, user_id, transaction_id, amount, currency, status, \
     gateway_txn_id, gateway_response, created_at";

const UPLOAD_COLUMNS: &str = "id, user_id, storage_key, filename, file_size, file_type, \
     status, word_count, created_at";

// --- transactions ---

pub async fn insert_pending_transaction(
    pool: &PgPool,
    user_id: i32,
    transaction_id: &str,
    amount: Decimal,
) -> Result<i32, sqlx::Error> {
    let row = sqlx::query(
        r#"INSERT INTO transactions (user_id, transaction_id, amount, status)
           VALUES ($1, $2, $3, 'pending')
           RETURNING id"#,
    )
    .bind(user_id)
    .bind(transaction_id)
    .bind(amount)
    .fetch_one(pool)
    .await?;

    Ok(row.get("id"))
}

pub async fn find_transaction(
    pool: &PgPool,
    transaction_id: &str,
) -> Result<Option<Transaction>, sqlx::Error> {
    let row = sqlx::query(&format!(
        "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE transaction_id = $1"
    ))
    .bind(transaction_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(transaction_from_row))
}

/// Merge a gateway payload into the stored response without touching status.
pub async fn merge_gateway_response(
    pool: &PgPool,
    transaction_id: &str,
    payload: &serde_json::Value,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"UPDATE transactions
           SET gateway_response = gateway_response || $1::jsonb
           WHERE transaction_id = $2"#,
    )
    .bind(payload)
    .bind(transaction_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Set a status and merge a payload in one write. Used both by initiation
/// (marking a rejected/unreachable attempt failed) and by callback handling.
pub async fn apply_transaction_status(
    pool: &PgPool,
    transaction_id: &str,
    status: TransactionStatus,
    gateway_txn_id: Option<&str>,
    payload: &serde_json::Value,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"UPDATE transactions
           SET status = $1,
               gateway_txn_id = COALESCE($2, gateway_txn_id),
               gateway_response = gateway_response || $3::jsonb
           WHERE transaction_id = $4"#,
    )
    .bind(status.as_str())
    .bind(gateway_txn_id)
    .bind(payload)
    .bind(transaction_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// The authorization gate fact: "may upload" means at least one completed
/// transaction, not "most recent is completed".
pub async fn has_completed_transaction(pool: &PgPool, user_id: i32) -> Result<bool, sqlx::Error> {
    let row = sqlx::query(
        r#"SELECT EXISTS (
               SELECT 1 FROM transactions WHERE user_id = $1 AND status = 'completed'
           ) AS has_payment"#,
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(row.get("has_payment"))
}

pub async fn list_user_transactions(
    pool: &PgPool,
    user_id: i32,
) -> Result<Vec<Transaction>, sqlx::Error> {
    let rows = sqlx::query(&format!(
        "SELECT {TRANSACTION_COLUMNS} FROM transactions
         WHERE user_id = $1 ORDER BY created_at DESC"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(transaction_from_row).collect())
}

/// Display fields for the gateway request.
pub struct UserContact {
    pub username: Option<String>,
    pub email: String,
}

pub async fn get_user_contact(
    pool: &PgPool,
    user_id: i32,
) -> Result<Option<UserContact>, sqlx::Error> {
    let row = sqlx::query("SELECT username, email FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|r| UserContact {
        username: r.get("username"),
        email: r.get("email"),
    }))
}

// --- uploads ---

pub async fn insert_upload(
    pool: &PgPool,
    user_id: i32,
    storage_key: &str,
    filename: &str,
    file_size: i64,
    file_type: &str,
) -> Result<Upload, sqlx::Error> {
    let row = sqlx::query(&format!(
        "INSERT INTO uploads (user_id, storage_key, filename, file_size, file_type, status)
         VALUES ($1, $2, $3, $4, $5, 'processing')
         RETURNING {UPLOAD_COLUMNS}"
    ))
    .bind(user_id)
    .bind(storage_key)
    .bind(filename)
    .bind(file_size)
    .bind(file_type)
    .fetch_one(pool)
    .await?;

    Ok(upload_from_row(row))
}

pub async fn get_upload(pool: &PgPool, upload_id: i32) -> Result<Option<Upload>, sqlx::Error> {
    let row = sqlx::query(&format!(
        "SELECT {UPLOAD_COLUMNS} FROM uploads WHERE id = $1"
    ))
    .bind(upload_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(upload_from_row))
}

pub async fn get_user_upload(
    pool: &PgPool,
    user_id: i32,
    upload_id: i32,
) -> Result<Option<Upload>, sqlx::Error> {
    let row = sqlx::query(&format!(
        "SELECT {UPLOAD_COLUMNS} FROM uploads WHERE id = $1 AND user_id = $2"
    ))
    .bind(upload_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(upload_from_row))
}

/// Terminal writes are guarded on `status = 'processing'` so a redelivered
/// job cannot double-update an already-terminal row. Returns whether the
/// write landed.
pub async fn mark_upload_completed(
    pool: &PgPool,
    upload_id: i32,
    word_count: i32,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"UPDATE uploads
           SET status = 'completed', word_count = $1
           WHERE id = $2 AND status = 'processing'"#,
    )
    .bind(word_count)
    .bind(upload_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn mark_upload_failed(pool: &PgPool, upload_id: i32) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"UPDATE uploads
           SET status = 'failed'
           WHERE id = $1 AND status = 'processing'"#,
    )
    .bind(upload_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn delete_upload(pool: &PgPool, upload_id: i32) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM uploads WHERE id = $1")
        .bind(upload_id)
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn list_user_uploads(pool: &PgPool, user_id: i32) -> Result<Vec<Upload>, sqlx::Error> {
    let rows = sqlx::query(&format!(
        "SELECT {UPLOAD_COLUMNS} FROM uploads
         WHERE user_id = $1 ORDER BY created_at DESC"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(upload_from_row).collect())
}

/// Uploads stuck in `processing` older than the given age, for the sweeper.
/// Fresh rows are excluded so the sweep does not race a job that was just
/// enqueued through the normal path.
pub async fn list_stuck_uploads(
    pool: &PgPool,
    older_than_secs: i64,
    limit: i64,
) -> Result<Vec<i32>, sqlx::Error> {
    let rows = sqlx::query(
        r#"SELECT id FROM uploads
           WHERE status = 'processing'
             AND created_at < NOW() - ($1 * INTERVAL '1 second')
           ORDER BY created_at ASC
           LIMIT $2"#,
    )
    .bind(older_than_secs)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|r| r.get("id")).collect())
}

// --- activity log ---

pub async fn insert_activity(
    pool: &PgPool,
    user_id: i32,
    action: &str,
    metadata: serde_json::Value,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"INSERT INTO activity_log (user_id, action, metadata)
           VALUES ($1, $2, $3)"#,
    )
    .bind(user_id)
    .bind(action)
    .bind(metadata)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn list_user_activities(
    pool: &PgPool,
    user_id: i32,
    limit: i64,
) -> Result<Vec<ActivityLogEntry>, sqlx::Error> {
    let rows = sqlx::query(
        r#"SELECT id, user_id, action, metadata, created_at
           FROM activity_log
           WHERE user_id = $1
           ORDER BY created_at DESC
           LIMIT $2"#,
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| ActivityLogEntry {
            id: r.get("id"),
            user_id: r.get("user_id"),
            action: r.get("action"),
            metadata: r.get("metadata"),
            created_at: r.get("created_at"),
        })
        .collect())
}

pub async fn count_user_activities(pool: &PgPool, user_id: i32) -> Result<i64, sqlx::Error> {
    let row = sqlx::query("SELECT COUNT(*) AS total FROM activity_log WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await?;

    Ok(row.get("total"))
}
