//! HTTP handlers for file upload, download, listing, and deletion.
//! Streams file bodies to avoid buffering in memory and delegates storage
//! concerns to `FileService`.

use std::io;

use axum::{
    Extension, Json,
    body::Body,
    extract::{Multipart, Path, State},
    http::{HeaderValue, StatusCode, header},
    response::Response,
};
use futures::StreamExt;
use serde_json::{Value, json};
use tokio_util::io::ReaderStream;

use crate::auth::Principal;
use crate::errors::AppError;
use crate::models::file::FileSummary;
use crate::state::AppState;

/// `GET /buckets/{bucket_id}/files` — list the bucket's files.
pub async fn list_files(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(bucket_id): Path<String>,
) -> Result<Json<Vec<FileSummary>>, AppError> {
    let files = state
        .files
        .list_files(&principal.username, &bucket_id)
        .await?;
    Ok(Json(files))
}

/// `POST /buckets/{bucket_id}/files` — multipart upload of the `file` field,
/// answering `{"file_id": ...}`.
pub async fn upload_file(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(bucket_id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<Value>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| AppError::new(StatusCode::BAD_REQUEST, "invalid multipart body"))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let stream = field.map(|chunk| chunk.map_err(|err| io::Error::new(io::ErrorKind::Other, err)));
        let file_id = state
            .files
            .upload_file(&principal.username, &bucket_id, &file_name, stream)
            .await?;
        return Ok(Json(json!({ "file_id": file_id })));
    }
    Err(AppError::new(StatusCode::BAD_REQUEST, "no file provided"))
}

/// `GET /buckets/{bucket_id}/files/{file_id}` — download as an attachment
/// named after the uploaded file.
pub async fn get_file(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path((bucket_id, file_id)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let (record, file) = state
        .files
        .get_file(&principal.username, &bucket_id, &file_id)
        .await?;

    let stream = ReaderStream::new(file);
    let mut response = Response::new(Body::from_stream(stream));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    let safe_name = record.file_name.replace(['"', '\r', '\n'], "_");
    let disposition = format!("attachment; filename=\"{}\"", safe_name);
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&disposition)
            .unwrap_or_else(|_| HeaderValue::from_static("attachment")),
    );

    Ok(response)
}

/// `DELETE /buckets/{bucket_id}/files/{file_id}`
pub async fn delete_file(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path((bucket_id, file_id)): Path<(String, String)>,
) -> Result<Json<Value>, AppError> {
    state
        .files
        .delete_file(&principal.username, &bucket_id, &file_id)
        .await?;
    Ok(Json(json!({ "success": true })))
}
