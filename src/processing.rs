// src/processing.rs
//
// The worker side of the pipeline: load the upload, fetch its bytes, run the
// counter, write the terminal status. Terminal writes are guarded on
// `status = 'processing'`, so the whole function is idempotent under
// at-least-once redelivery.

use serde_json::json;
use sqlx::PgPool;

use crate::counter;
use crate::db;
use crate::error::ApiError;
use crate::models::{actions, Upload, UploadStatus};
use crate::storage::Storage;

#[derive(Debug, PartialEq, Eq)]
pub enum ProcessOutcome {
    Completed { word_count: u32 },
    Failed,
    /// Row gone, already terminal, or another worker won the race.
    Skipped,
}

pub async fn process_upload(
    pool: &PgPool,
    storage: &Storage,
    upload_id: i32,
) -> Result<ProcessOutcome, ApiError> {
    let upload = match db::get_upload(pool, upload_id).await? {
        Some(u) => u,
        None => {
            log::warn!("upload {upload_id} not found, dropping job");
            return Ok(ProcessOutcome::Skipped);
        }
    };

    if upload.status != UploadStatus::Processing {
        return Ok(ProcessOutcome::Skipped);
    }

    let counted = match storage.get(&upload.storage_key).await {
        Ok(bytes) => counter::count_words(&bytes, &upload.file_type)
            .map_err(|e| ApiError::Processing(e.to_string())),
        Err(e) => Err(e),
    };

    match counted {
        Ok(word_count) => {
            let landed = db::mark_upload_completed(pool, upload_id, word_count as i32).await?;
            if !landed {
                // Another delivery finished first.
                return Ok(ProcessOutcome::Skipped);
            }

            append_activity(
                pool,
                &upload,
                actions::FILE_PROCESSED,
                json!({
                    "filename": upload.filename,
                    "word_count": word_count,
                    "file_size": upload.file_size,
                }),
            )
            .await;

            log::info!("upload {upload_id} processed, word_count={word_count}");
            Ok(ProcessOutcome::Completed { word_count })
        }
        Err(processing_error) => {
            let error_text = processing_error.to_string();
            log::error!("processing upload {upload_id} failed: {error_text}");

            // Two-phase failure update: if even marking the row failed
            // throws, that is a distinct persistence failure the caller must
            // see, not a swallowed exception.
            let landed = db::mark_upload_failed(pool, upload_id)
                .await
                .map_err(|e| {
                    ApiError::Persistence(format!(
                        "could not mark upload {upload_id} failed: {e}"
                    ))
                })?;
            if !landed {
                return Ok(ProcessOutcome::Skipped);
            }

            append_activity(
                pool,
                &upload,
                actions::FILE_PROCESSING_FAILED,
                json!({
                    "filename": upload.filename,
                    "error": error_text,
                }),
            )
            .await;

            Ok(ProcessOutcome::Failed)
        }
    }
}

/// The activity log is an audit trail with no correctness consumer; a failed
/// append is logged, never allowed to wedge a job whose status already
/// landed.
async fn append_activity(
    pool: &PgPool,
    upload: &Upload,
    action: &str,
    metadata: serde_json::Value,
) {
    if let Err(e) = db::insert_activity(pool, upload.user_id, action, metadata).await {
        log::error!("activity append failed for upload {}: {e}", upload.id);
    }
}
