//! Represents a file stored in a bucket.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A file's entry in its bucket's file index.
///
/// The index maps `file_id → FileRecord`; the id is also the stored file's
/// on-disk name inside the bucket directory. The record stores display
/// metadata, not the content bytes.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FileRecord {
    /// Display name supplied at upload time (the client's original filename).
    pub file_name: String,

    /// Size of the stored payload in megabytes.
    #[serde(rename = "file_size")]
    pub file_size_mb: f64,

    /// Username of the uploading principal.
    pub created_by: String,

    /// When this file was uploaded.
    #[serde(with = "crate::models::flex_time")]
    pub created_at: DateTime<Utc>,
}

/// One row of the file-list response.
#[derive(Serialize, Clone, Debug)]
pub struct FileSummary {
    /// Generated file identifier, equal to the stored file's on-disk name.
    pub file_id: String,

    /// Display name recorded at upload time.
    pub file_name: String,

    /// Size in megabytes.
    pub file_size: f64,

    /// Username of the uploading principal.
    pub created_by: String,

    /// Upload timestamp.
    #[serde(with = "crate::models::flex_time")]
    pub created_at: DateTime<Utc>,
}

impl FileSummary {
    /// Join an index record with its id into a list row.
    pub fn from_record(file_id: impl Into<String>, record: &FileRecord) -> Self {
        Self {
            file_id: file_id.into(),
            file_name: record.file_name.clone(),
            file_size: record.file_size_mb,
            created_by: record.created_by.clone(),
            created_at: record.created_at,
        }
    }
}
