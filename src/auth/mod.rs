//! Request identity.
//!
//! The deployment fronts this service with an identity-aware gateway that
//! verifies token signatures; what arrives here is a trusted bearer token
//! whose payload names the caller. [`require_identity`] turns that into a
//! [`Principal`] request extension, rejecting requests it cannot attribute.

pub mod claims;

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use thiserror::Error;
use tracing::debug;

use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("token is not a decodable JWT")]
    Malformed,
    #[error("token payload has no usable `{claim}` claim")]
    MissingClaim { claim: String },
}

/// Maps a bearer credential to the username it belongs to.
pub trait IdentityProvider: Send + Sync + 'static {
    fn identify(&self, bearer_token: &str) -> Result<String, IdentityError>;
}

pub type SharedIdentityProvider = Arc<dyn IdentityProvider>;

/// The authenticated caller of the current request.
#[derive(Clone, Debug)]
pub struct Principal {
    pub username: String,
}

/// Middleware that authenticates every request on the protected routes.
///
/// Reads `Authorization: Bearer <token>`, resolves the caller through the
/// configured [`IdentityProvider`], and stores a [`Principal`] in request
/// extensions. Failures answer 401 without detailing what was wrong with
/// the credential.
pub async fn require_identity(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    let Some(header) = header else {
        return Err(AppError::unauthenticated("authorization header is required"));
    };
    let Some(token) = header.strip_prefix("Bearer ") else {
        return Err(AppError::unauthenticated(
            "authorization header must carry a bearer token",
        ));
    };

    let username = state.identity.identify(token).map_err(|err| {
        debug!(error = %err, "rejected request credentials");
        AppError::unauthenticated("invalid credentials")
    })?;

    request.extensions_mut().insert(Principal { username });
    Ok(next.run(request).await)
}
