//! Filesystem-resident metadata store.
//!
//! All metadata lives in three JSON document kinds under the storage root:
//! one global bucket registry, one global permission registry, and one file
//! index per bucket directory. Document file names are fixed, well-known
//! values so multiple server instances (and the deployments this layout was
//! inherited from) address the same files. Mutual exclusion between writers
//! is provided by [`lock::LockManager`]; [`documents::MetadataStore`] does the
//! typed load/save work.

pub mod documents;
pub mod lock;

pub use documents::{BucketRegistry, FileIndex, MetadataStore, PermissionRegistry, StoreError};
pub use lock::{LockError, LockGuard, LockManager};

use std::path::{Path, PathBuf};

/// Global bucket registry document, at the storage root.
pub const BUCKETS_DOCUMENT: &str = "FILESERVER_BUCKETS.fsconfig";

/// Global permission registry document, at the storage root.
pub const PERMISSIONS_DOCUMENT: &str = "FILESERVER_PERMISSIONS.fsconfig";

/// Per-bucket file index document, inside each bucket directory.
pub const FILE_INDEX_DOCUMENT: &str = "FILESERVER_BUCKET_CONFIG.fsconfig";

/// Computes the physical paths of every document, bucket directory, and
/// stored file beneath one storage root.
///
/// Path construction only; nothing here checks existence.
#[derive(Clone, Debug)]
pub struct StorageLayout {
    root: PathBuf,
}

impl StorageLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn buckets_document(&self) -> PathBuf {
        self.root.join(BUCKETS_DOCUMENT)
    }

    pub fn permissions_document(&self) -> PathBuf {
        self.root.join(PERMISSIONS_DOCUMENT)
    }

    /// A bucket's storage directory; the directory name is the bucket id.
    pub fn bucket_dir(&self, bucket_id: &str) -> PathBuf {
        self.root.join(bucket_id)
    }

    pub fn file_index_document(&self, bucket_id: &str) -> PathBuf {
        self.bucket_dir(bucket_id).join(FILE_INDEX_DOCUMENT)
    }

    /// A stored file's payload path; the file name is the file id.
    pub fn file_path(&self, bucket_id: &str, file_id: &str) -> PathBuf {
        self.bucket_dir(bucket_id).join(file_id)
    }
}
