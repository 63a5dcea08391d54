//! Defines routes for all bucket, file, and permission operations.
//!
//! ## Structure
//! - **Bucket-level endpoints**
//!   - `GET    /buckets` — list buckets visible to the caller
//!   - `POST   /buckets` — create bucket
//!   - `DELETE /buckets/{bucket_id}` — delete bucket
//!
//! - **File-level endpoints**
//!   - `GET    /buckets/{bucket_id}/files` — list files
//!   - `POST   /buckets/{bucket_id}/files` — upload (multipart field `file`)
//!   - `GET    /buckets/{bucket_id}/files/{file_id}` — download
//!   - `DELETE /buckets/{bucket_id}/files/{file_id}` — delete file
//!
//! - **Permission endpoints**
//!   - `POST   /buckets/{bucket_id}/permissions` — set or remove a grant
//!   - `POST   /system/admins` — grant system administrator
//!   - `DELETE /system/admins` — revoke system administrator
//!
//! Every route above requires a bearer identity; the health endpoints are
//! mounted outside the authentication layer. The service is consumed by
//! browser frontends served from localhost, so CORS admits localhost
//! origins on any port, with credentials.

use crate::{
    auth::require_identity,
    handlers::{
        admin_handlers::{create_system_admin, delete_system_admin, set_permission},
        bucket_handlers::{create_bucket, delete_bucket, list_buckets},
        file_handlers::{delete_file, get_file, list_files, upload_file},
        health_handlers::{healthz, readyz},
    },
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{delete, get, post},
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build and return the router for the whole API.
///
/// The router carries shared state (`AppState`) to all handlers.
pub fn routes(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(vec![Method::GET, Method::POST, Method::DELETE])
        .allow_headers(vec![header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_origin(AllowOrigin::predicate(|origin, _| is_localhost_origin(origin)))
        .allow_credentials(true);

    // Multipart framing adds overhead on top of the payload, so the body
    // limit sits one MiB above the upload ceiling; the service's own size
    // check is the one that decides.
    let upload_body_limit = (state.max_file_size_mb as usize)
        .saturating_mul(1024 * 1024)
        .saturating_add(1024 * 1024);

    let protected = Router::new()
        .route("/buckets", get(list_buckets).post(create_bucket))
        .route("/buckets/{bucket_id}", delete(delete_bucket))
        .route(
            "/buckets/{bucket_id}/files",
            get(list_files).post(upload_file),
        )
        .route(
            "/buckets/{bucket_id}/files/{file_id}",
            get(get_file).delete(delete_file),
        )
        .route("/buckets/{bucket_id}/permissions", post(set_permission))
        .route(
            "/system/admins",
            post(create_system_admin).delete(delete_system_admin),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_identity,
        ))
        .layer(DefaultBodyLimit::max(upload_body_limit));

    Router::new()
        // health endpoints (mounted at root, no authentication)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .merge(protected)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// `http://localhost` or `http://127.0.0.1`, any port.
fn is_localhost_origin(origin: &HeaderValue) -> bool {
    let Ok(origin) = origin.to_str() else {
        return false;
    };
    for base in ["http://localhost", "http://127.0.0.1"] {
        if let Some(rest) = origin.strip_prefix(base) {
            return rest.is_empty() || (rest.starts_with(':') && rest[1..].parse::<u16>().is_ok());
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn localhost_origins_are_admitted() {
        for origin in [
            "http://localhost",
            "http://localhost:3000",
            "http://localhost:65535",
            "http://127.0.0.1:8080",
        ] {
            assert!(
                is_localhost_origin(&HeaderValue::from_static(origin)),
                "expected admit for {origin}"
            );
        }
    }

    #[test]
    fn foreign_origins_are_rejected() {
        for origin in [
            "https://localhost:3000",
            "http://localhost.evil.example",
            "http://evil.example",
            "http://localhost:notaport",
            "http://localhost:3000/path",
        ] {
            assert!(
                !is_localhost_origin(&HeaderValue::from_static(origin)),
                "expected reject for {origin}"
            );
        }
    }
}
