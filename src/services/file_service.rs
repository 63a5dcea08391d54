//! File content operations within a bucket.
//!
//! Payloads are streamed to disk under a temporary name and only renamed to
//! their final id once complete, so readers never observe partial files. The
//! file index, not the directory listing, decides which files exist.

use std::io;

use bytes::Bytes;
use chrono::Utc;
use futures::{Stream, StreamExt, pin_mut};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::file::{FileRecord, FileSummary};
use crate::models::permission::Scope;
use crate::store::{LockManager, MetadataStore};

use super::permissions::{Access, PermissionResolver};
use super::{ServiceError, ServiceResult, ensure_id_safe, require_bucket, with_lock};

const BYTES_PER_MB: u64 = 1024 * 1024;

#[derive(Clone)]
pub struct FileService {
    store: MetadataStore,
    locks: LockManager,
    permissions: PermissionResolver,

    /// Upload ceiling in whole megabytes; a payload of exactly this size is
    /// accepted, one byte over is rejected.
    max_file_size_mb: u64,
}

impl FileService {
    pub fn new(
        store: MetadataStore,
        locks: LockManager,
        permissions: PermissionResolver,
        max_file_size_mb: u64,
    ) -> Self {
        Self {
            store,
            locks,
            permissions,
            max_file_size_mb,
        }
    }

    pub async fn list_files(&self, user: &str, bucket_id: &str) -> ServiceResult<Vec<FileSummary>> {
        ensure_id_safe(bucket_id)?;
        require_bucket(&self.store, bucket_id).await?;
        self.permissions
            .require(
                user,
                &Scope::bucket(bucket_id),
                Access::Read,
                "get the list of files in this bucket",
            )
            .await?;

        let index = self.store.load_file_index(bucket_id).await?;
        Ok(index
            .files
            .iter()
            .map(|(file_id, record)| FileSummary::from_record(file_id.clone(), record))
            .collect())
    }

    /// Streams an upload into the bucket and records it in the file index.
    /// Returns the generated file id.
    pub async fn upload_file<S>(
        &self,
        user: &str,
        bucket_id: &str,
        file_name: &str,
        stream: S,
    ) -> ServiceResult<String>
    where
        S: Stream<Item = io::Result<Bytes>> + Send,
    {
        ensure_id_safe(bucket_id)?;
        require_bucket(&self.store, bucket_id).await?;
        self.permissions
            .require(
                user,
                &Scope::bucket(bucket_id),
                Access::Write,
                "upload a file to this bucket",
            )
            .await?;
        if file_name.trim().is_empty() {
            return Err(ServiceError::Validation("file name is required".into()));
        }

        let layout = self.store.layout().clone();
        let ceiling_bytes = self.max_file_size_mb.saturating_mul(BYTES_PER_MB);
        let tmp_path = layout
            .bucket_dir(bucket_id)
            .join(format!(".upload-{}", Uuid::new_v4()));
        let mut file = File::create(&tmp_path).await?;

        let mut written: u64 = 0;
        pin_mut!(stream);
        while let Some(chunk_res) = stream.next().await {
            let chunk = match chunk_res {
                Ok(chunk) => chunk,
                Err(err) => {
                    let _ = fs::remove_file(&tmp_path).await;
                    return Err(err.into());
                }
            };
            written += chunk.len() as u64;
            if written > ceiling_bytes {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(ServiceError::SizeLimitExceeded {
                    limit_mb: self.max_file_size_mb,
                });
            }
            if let Err(err) = file.write_all(&chunk).await {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(err.into());
            }
        }
        if let Err(err) = file.flush().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(err.into());
        }
        if let Err(err) = file.sync_all().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(err.into());
        }

        // Pick the final id only once the payload is fully on disk.
        let mut file_id = Uuid::new_v4().to_string();
        loop {
            match fs::try_exists(layout.file_path(bucket_id, &file_id)).await {
                Ok(false) => break,
                Ok(true) => file_id = Uuid::new_v4().to_string(),
                Err(err) => {
                    let _ = fs::remove_file(&tmp_path).await;
                    return Err(err.into());
                }
            }
        }
        let final_path = layout.file_path(bucket_id, &file_id);
        if let Err(err) = fs::rename(&tmp_path, &final_path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(err.into());
        }

        let record = FileRecord {
            file_name: file_name.to_string(),
            file_size_mb: written as f64 / BYTES_PER_MB as f64,
            created_by: user.to_string(),
            created_at: Utc::now(),
        };
        let indexed = with_lock(
            &self.locks,
            &layout.file_index_document(bucket_id),
            user,
            async {
                let mut index = self.store.load_file_index(bucket_id).await?;
                index.files.insert(file_id.clone(), record);
                self.store.save_file_index(bucket_id, &index).await?;
                Ok(())
            },
        )
        .await;
        if let Err(err) = indexed {
            // Without an index entry the payload is unreachable; remove it.
            let _ = fs::remove_file(&final_path).await;
            return Err(err);
        }

        debug!(bucket_id, file_id, size_bytes = written, uploaded_by = user, "stored file");
        Ok(file_id)
    }

    /// Opens a stored file for download: its index record plus a handle at
    /// the start of the payload.
    pub async fn get_file(
        &self,
        user: &str,
        bucket_id: &str,
        file_id: &str,
    ) -> ServiceResult<(FileRecord, File)> {
        ensure_id_safe(bucket_id)?;
        ensure_id_safe(file_id)?;
        require_bucket(&self.store, bucket_id).await?;
        self.permissions
            .require(user, &Scope::bucket(bucket_id), Access::Read, "get this file")
            .await?;

        let index = self.store.load_file_index(bucket_id).await?;
        let Some(record) = index.files.get(file_id) else {
            return Err(ServiceError::NotFound("file"));
        };

        let path = self.store.layout().file_path(bucket_id, file_id);
        let file = File::open(&path).await.map_err(|err| {
            if err.kind() == io::ErrorKind::NotFound {
                warn!(bucket_id, file_id, "file is indexed but its payload is missing");
                ServiceError::NotFound("file")
            } else {
                ServiceError::from(err)
            }
        })?;
        Ok((record.clone(), file))
    }

    /// Drops the file from the index, then removes its payload. Once the
    /// index entry is gone the file no longer exists to readers, so a failed
    /// payload unlink only leaks bytes and is logged rather than surfaced.
    pub async fn delete_file(
        &self,
        user: &str,
        bucket_id: &str,
        file_id: &str,
    ) -> ServiceResult<()> {
        ensure_id_safe(bucket_id)?;
        ensure_id_safe(file_id)?;
        require_bucket(&self.store, bucket_id).await?;
        self.permissions
            .require(
                user,
                &Scope::bucket(bucket_id),
                Access::Write,
                "delete a file from this bucket",
            )
            .await?;

        let layout = self.store.layout().clone();
        with_lock(
            &self.locks,
            &layout.file_index_document(bucket_id),
            user,
            async {
                let mut index = self.store.load_file_index(bucket_id).await?;
                if index.files.remove(file_id).is_none() {
                    return Err(ServiceError::NotFound("file"));
                }
                self.store.save_file_index(bucket_id, &index).await?;
                Ok(())
            },
        )
        .await?;

        match fs::remove_file(layout.file_path(bucket_id, file_id)).await {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => {
                warn!(bucket_id, file_id, error = %err, "could not remove file payload")
            }
        }

        debug!(bucket_id, file_id, deleted_by = user, "deleted file");
        Ok(())
    }
}
