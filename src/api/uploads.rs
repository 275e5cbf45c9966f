// src/api/uploads.rs
//
// Upload intake and the endpoints around it. Intake preconditions run in
// order — payment, extension, size — each with its own error, and the size
// and type recorded on the row come from the actual bytes received, not from
// anything the client declared.

use actix_multipart::Multipart;
use actix_web::web::ReqData;
use actix_web::{delete, get, post, web, HttpResponse};
use futures_util::StreamExt;
use serde_json::json;
use utoipa::ToSchema;

use crate::counter::{FileKind, ALLOWED_EXTENSIONS, MAX_FILE_SIZE};
use crate::error::ApiError;
use crate::models::{actions, UploadStatus};
use crate::storage::Storage;
use crate::{db, AppState};

#[derive(Debug, serde::Serialize, ToSchema)]
pub struct UploadAccepted {
    pub message: String,
    pub file_id: i32,
    pub filename: String,
}

/// Extension allow-list on its own so the streaming reader can check it as
/// soon as the filename is known, before any of the body is buffered.
pub fn validate_extension(filename: &str) -> Result<String, ApiError> {
    FileKind::extension_of(filename)
        .filter(|ext| FileKind::from_extension(ext).is_some())
        .ok_or_else(|| {
            ApiError::Validation(format!(
                "only {} files are allowed",
                ALLOWED_EXTENSIONS.join(" and ")
            ))
        })
}

/// Pure validation of the declared filename and actual size, extension
/// first. Returns the canonical extension to record on the row.
pub fn validate_upload(filename: &str, size: usize) -> Result<String, ApiError> {
    let extension = validate_extension(filename)?;

    if size > MAX_FILE_SIZE {
        return Err(ApiError::Validation(
            "file size cannot exceed 10MB".to_string(),
        ));
    }

    Ok(extension)
}

fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '.' || *c == '_' || *c == '-')
        .collect()
}

async fn read_file_field(payload: &mut Multipart) -> Result<(Vec<u8>, String), ApiError> {
    let mut file_bytes: Vec<u8> = Vec::new();
    let mut filename = String::new();

    while let Some(item) = payload.next().await {
        let mut field =
            item.map_err(|e| ApiError::Validation(format!("invalid multipart body: {e}")))?;

        if let Some(name) = field.content_disposition().get_filename() {
            filename = sanitize_filename(name);
            // Extension comes before size: a disallowed type is reported as
            // such even when the body is also oversized.
            validate_extension(&filename)?;
        }

        while let Some(chunk) = field.next().await {
            let data =
                chunk.map_err(|e| ApiError::Validation(format!("broken upload stream: {e}")))?;
            file_bytes.extend_from_slice(&data);
            // Bail out early instead of buffering an oversized body.
            if file_bytes.len() > MAX_FILE_SIZE {
                return Err(ApiError::Validation(
                    "file size cannot exceed 10MB".to_string(),
                ));
            }
        }
    }

    if file_bytes.is_empty() && filename.is_empty() {
        return Err(ApiError::Validation("no file uploaded".to_string()));
    }

    Ok((file_bytes, filename))
}

#[utoipa::path(
    post,
    path = "/api/uploads",
    tag = "uploads",
    responses(
        (status = 201, description = "File accepted, processing started", body = UploadAccepted),
        (status = 400, description = "Unsupported type or oversized file"),
        (status = 402, description = "No completed payment on record")
    )
)]
#[post("/uploads")]
pub async fn upload_file(
    mut payload: Multipart,
    state: web::Data<AppState>,
    user_id: ReqData<i32>,
) -> Result<HttpResponse, ApiError> {
    let user_id = *user_id;

    // Gate first: no completed transaction, no intake.
    if !db::has_completed_transaction(&state.pool, user_id).await? {
        return Err(ApiError::PaymentRequired);
    }

    let (file_bytes, filename) = read_file_field(&mut payload).await?;
    let extension = validate_upload(&filename, file_bytes.len())?;
    let file_size = file_bytes.len() as i64;

    let storage_key = Storage::make_key(user_id, &extension);
    state.storage.put(&storage_key, file_bytes).await?;

    let upload = db::insert_upload(
        &state.pool,
        user_id,
        &storage_key,
        &filename,
        file_size,
        &extension,
    )
    .await?;

    db::insert_activity(
        &state.pool,
        user_id,
        actions::FILE_UPLOADED,
        json!({
            "filename": upload.filename,
            "file_size": upload.file_size,
            "file_type": upload.file_type,
        }),
    )
    .await?;

    // The response does not wait on processing. A failed publish is logged
    // and left to the sweeper, which re-enqueues anything still processing.
    if let Some(queue) = &state.queue {
        if let Err(e) = queue.enqueue(upload.id).await {
            log::error!("enqueue failed for upload {}: {e}", upload.id);
        }
    } else {
        log::warn!(
            "no queue configured; upload {} stays processing until a broker is available",
            upload.id
        );
    }

    Ok(HttpResponse::Created().json(UploadAccepted {
        message: "File uploaded successfully. Processing word count...".to_string(),
        file_id: upload.id,
        filename: upload.filename,
    }))
}

#[utoipa::path(
    delete,
    path = "/api/uploads/{file_id}",
    tag = "uploads",
    responses(
        (status = 200, description = "File and backing object deleted"),
        (status = 404, description = "Not found or not owned by the caller")
    )
)]
#[delete("/uploads/{file_id}")]
pub async fn delete_file(
    path: web::Path<i32>,
    state: web::Data<AppState>,
    user_id: ReqData<i32>,
) -> Result<HttpResponse, ApiError> {
    let file_id = path.into_inner();
    let user_id = *user_id;

    let upload = db::get_user_upload(&state.pool, user_id, file_id)
        .await?
        .ok_or(ApiError::NotFound("file"))?;

    // Audit entry goes in before the row disappears.
    db::insert_activity(
        &state.pool,
        user_id,
        actions::FILE_DELETED,
        json!({
            "filename": upload.filename,
            "file_size": upload.file_size,
            "file_type": upload.file_type,
            "word_count": upload.word_count,
        }),
    )
    .await?;

    // Backing object first; if this fails the row stays and the delete can
    // be retried, which leaves no orphaned blob either way.
    state.storage.delete(&upload.storage_key).await?;
    db::delete_upload(&state.pool, file_id).await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": format!("File \"{}\" deleted successfully", upload.filename),
    })))
}

#[utoipa::path(
    get,
    path = "/api/uploads",
    tag = "uploads",
    responses((status = 200, description = "Caller's uploads with status counts"))
)]
#[get("/uploads")]
pub async fn list_files(
    state: web::Data<AppState>,
    user_id: ReqData<i32>,
) -> Result<HttpResponse, ApiError> {
    let files = db::list_user_uploads(&state.pool, *user_id).await?;

    let completed = files
        .iter()
        .filter(|f| f.status == UploadStatus::Completed)
        .count();
    let processing = files
        .iter()
        .filter(|f| f.status == UploadStatus::Processing)
        .count();
    let failed = files
        .iter()
        .filter(|f| f.status == UploadStatus::Failed)
        .count();

    Ok(HttpResponse::Ok().json(json!({
        "total_files": files.len(),
        "completed_files": completed,
        "processing_files": processing,
        "failed_files": failed,
        "files": files,
    })))
}

#[utoipa::path(
    get,
    path = "/api/activities",
    tag = "uploads",
    responses((status = 200, description = "Caller's recent activity entries"))
)]
#[get("/activities")]
pub async fn list_activities(
    state: web::Data<AppState>,
    user_id: ReqData<i32>,
) -> Result<HttpResponse, ApiError> {
    let activities = db::list_user_activities(&state.pool, *user_id, 20).await?;
    let total = db::count_user_activities(&state.pool, *user_id).await?;

    Ok(HttpResponse::Ok().json(json!({
        "total_activities": total,
        "activities": activities,
    })))
}
