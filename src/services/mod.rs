//! Domain services over the metadata store.
//!
//! Each service owns one slice of the API surface: bucket lifecycle, file
//! content, and permission administration. They share the error taxonomy
//! below, the [`MetadataStore`] for document access, and the marker-file
//! [`LockManager`](crate::store::LockManager) for write mutual exclusion.

pub mod admin_service;
pub mod bucket_service;
pub mod file_service;
pub mod permissions;

use std::future::Future;
use std::io;
use std::path::Path;

use thiserror::Error;

use crate::store::{LockError, LockManager, MetadataStore, StoreError};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("you do not have permission to {0}")]
    Forbidden(&'static str),
    #[error("{0} does not exist")]
    NotFound(&'static str),
    #[error("{0}")]
    Validation(String),
    #[error("file is too large, the limit is {limit_mb} MB")]
    SizeLimitExceeded { limit_mb: u64 },
    #[error("the storage metadata is busy with another change, please retry")]
    LockBusy { resource: String },
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl From<LockError> for ServiceError {
    fn from(err: LockError) -> Self {
        match err {
            LockError::Timeout { resource, .. } => ServiceError::LockBusy { resource },
            LockError::Io(err) => ServiceError::Internal(err.into()),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        ServiceError::Internal(err.into())
    }
}

impl From<io::Error> for ServiceError {
    fn from(err: io::Error) -> Self {
        ServiceError::Internal(err.into())
    }
}

/// Identifiers arriving in the URL are used to build disk paths; reject
/// separators and parent traversal outright.
pub(crate) fn ensure_id_safe(id: &str) -> ServiceResult<()> {
    if id.is_empty() || id.contains('/') || id.contains('\\') || id.contains("..") {
        return Err(ServiceError::Validation("invalid identifier".into()));
    }
    Ok(())
}

/// Rejects operations on bucket ids absent from the bucket registry.
pub(crate) async fn require_bucket(
    store: &MetadataStore,
    bucket_id: &str,
) -> ServiceResult<()> {
    if store.load_buckets().await?.contains(bucket_id) {
        Ok(())
    } else {
        Err(ServiceError::NotFound("bucket"))
    }
}

/// Runs `op` while holding the lock on `document`.
///
/// `op` is a not-yet-polled future, so its work starts only once the lock is
/// held. On success the marker is removed explicitly; on failure the guard's
/// drop removes it while the operation's error propagates.
pub(crate) async fn with_lock<T, Fut>(
    locks: &LockManager,
    document: &Path,
    owner: &str,
    op: Fut,
) -> ServiceResult<T>
where
    Fut: Future<Output = ServiceResult<T>>,
{
    let guard = locks.acquire(document, owner).await?;
    match op.await {
        Ok(value) => {
            guard.release().await?;
            Ok(value)
        }
        Err(err) => Err(err),
    }
}
