//! Represents a logical bucket — a top-level container for stored files.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A bucket's entry in the global bucket registry.
///
/// The registry maps `bucket_id → BucketRecord`; the id itself doubles as the
/// name of the bucket's storage directory, so it lives in the map key rather
/// than in the record.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct BucketRecord {
    /// Human-chosen display name (not required to be unique).
    pub name: String,

    /// Username of the principal that created the bucket.
    pub created_by: String,

    /// When this bucket was created.
    #[serde(with = "crate::models::flex_time")]
    pub created_at: DateTime<Utc>,
}

/// One row of the bucket-list response.
#[derive(Serialize, Clone, Debug)]
pub struct BucketSummary {
    /// Generated bucket identifier, equal to the storage directory name.
    pub bucket_id: String,

    /// Display name recorded at creation time.
    pub bucket_name: String,

    /// Username of the creating principal.
    pub created_by: String,

    /// Creation timestamp.
    #[serde(with = "crate::models::flex_time")]
    pub created_at: DateTime<Utc>,
}

impl BucketSummary {
    /// Join a registry record with its id into a list row.
    pub fn from_record(bucket_id: impl Into<String>, record: &BucketRecord) -> Self {
        Self {
            bucket_id: bucket_id.into(),
            bucket_name: record.name.clone(),
            created_by: record.created_by.clone(),
            created_at: record.created_at,
        }
    }
}
