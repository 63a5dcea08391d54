//! HTTP handlers for permission grants and system administrators.

use axum::{
    Extension, Json,
    extract::{Path, State},
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::auth::Principal;
use crate::errors::AppError;
use crate::state::AppState;

/// Request body for `POST /buckets/{bucket_id}/permissions`.
#[derive(Debug, Deserialize)]
pub struct SetPermissionReq {
    pub user: Option<String>,
    /// `admin`, `write`, `read`, or `remove`.
    pub permission: Option<String>,
}

/// Request body for the `/system/admins` endpoints.
#[derive(Debug, Deserialize)]
pub struct SystemAdminReq {
    pub admin: Option<String>,
}

/// `POST /buckets/{bucket_id}/permissions` — set or remove a user's grant on
/// the bucket. Only bucket admins may call this.
pub async fn set_permission(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(bucket_id): Path<String>,
    Json(payload): Json<SetPermissionReq>,
) -> Result<Json<Value>, AppError> {
    let user = payload.user.unwrap_or_default();
    let permission = payload.permission.unwrap_or_default();
    state
        .admin
        .set_permission(&principal.username, &bucket_id, &user, &permission)
        .await?;
    Ok(Json(json!({ "success": true })))
}

/// `POST /system/admins` — grant system administrator.
pub async fn create_system_admin(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<SystemAdminReq>,
) -> Result<Json<Value>, AppError> {
    let admin = payload.admin.unwrap_or_default();
    state
        .admin
        .add_system_admin(&principal.username, &admin)
        .await?;
    Ok(Json(json!({ "success": true })))
}

/// `DELETE /system/admins` — revoke system administrator.
pub async fn delete_system_admin(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<SystemAdminReq>,
) -> Result<Json<Value>, AppError> {
    let admin = payload.admin.unwrap_or_default();
    state
        .admin
        .delete_system_admin(&principal.username, &admin)
        .await?;
    Ok(Json(json!({ "success": true })))
}
