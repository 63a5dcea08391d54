//! HTTP handlers for bucket lifecycle operations.

use axum::{
    Extension, Json,
    extract::{Path, State},
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::auth::Principal;
use crate::errors::AppError;
use crate::models::bucket::BucketSummary;
use crate::state::AppState;

/// Request body for `POST /buckets`.
#[derive(Debug, Deserialize)]
pub struct CreateBucketReq {
    pub bucket_name: Option<String>,
}

/// `GET /buckets` — every bucket visible to the caller.
pub async fn list_buckets(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Vec<BucketSummary>>, AppError> {
    let buckets = state.buckets.list_buckets(&principal.username).await?;
    Ok(Json(buckets))
}

/// `POST /buckets` — create a bucket, answering `{"bucket_id": ...}`.
pub async fn create_bucket(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<CreateBucketReq>,
) -> Result<Json<Value>, AppError> {
    let name = payload.bucket_name.unwrap_or_default();
    let bucket_id = state
        .buckets
        .create_bucket(&principal.username, &name)
        .await?;
    Ok(Json(json!({ "bucket_id": bucket_id })))
}

/// `DELETE /buckets/{bucket_id}` — remove a bucket and all of its files.
pub async fn delete_bucket(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(bucket_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    state
        .buckets
        .delete_bucket(&principal.username, &bucket_id)
        .await?;
    Ok(Json(json!({ "success": true })))
}
