//! Shared fixtures for the service-level integration tests.

#![allow(dead_code)]

use std::io;
use std::time::Duration;

use bucket_store::services::admin_service::AdminService;
use bucket_store::services::bucket_service::BucketService;
use bucket_store::services::file_service::FileService;
use bucket_store::services::permissions::PermissionResolver;
use bucket_store::store::{LockManager, MetadataStore, StorageLayout};
use bytes::Bytes;
use futures::Stream;
use tempfile::TempDir;

/// Bootstrap admin seeded into every test registry.
pub const ROOT_ADMIN: &str = "root@corp.example";

/// A full service stack over a throwaway storage root.
pub struct Harness {
    pub buckets: BucketService,
    pub files: FileService,
    pub admin: AdminService,
    pub store: MetadataStore,
    pub locks: LockManager,
    // Dropping this removes the storage root.
    _root: TempDir,
}

impl Harness {
    /// Defaults: 10 MB upload ceiling, 2 s lock timeout, 30 s lease.
    pub async fn new() -> Self {
        Self::with_settings(10, Duration::from_secs(2), Duration::from_secs(30)).await
    }

    pub async fn with_settings(
        max_file_size_mb: u64,
        lock_timeout: Duration,
        lock_lease: Duration,
    ) -> Self {
        let root = TempDir::new().unwrap();
        let store = MetadataStore::new(StorageLayout::new(root.path()));
        store.ensure_initialized(ROOT_ADMIN).await.unwrap();

        let locks = LockManager::new(lock_timeout, lock_lease);
        let permissions = PermissionResolver::new(store.clone());
        Self {
            buckets: BucketService::new(store.clone(), locks.clone(), permissions.clone()),
            files: FileService::new(
                store.clone(),
                locks.clone(),
                permissions.clone(),
                max_file_size_mb,
            ),
            admin: AdminService::new(store.clone(), locks.clone(), permissions),
            store,
            locks,
            _root: root,
        }
    }

    /// Creates a bucket as the bootstrap admin and returns its id.
    pub async fn make_bucket(&self, name: &str) -> String {
        self.buckets.create_bucket(ROOT_ADMIN, name).await.unwrap()
    }
}

/// A single-chunk upload stream over a copy of `data`.
pub fn one_chunk(data: &[u8]) -> impl Stream<Item = io::Result<Bytes>> + Send {
    futures::stream::iter([Ok(Bytes::copy_from_slice(data))])
}

/// `chunks` chunks of `chunk_len` zero bytes each.
pub fn zero_chunks(chunks: usize, chunk_len: usize) -> impl Stream<Item = io::Result<Bytes>> + Send {
    futures::stream::iter((0..chunks).map(move |_| Ok(Bytes::from(vec![0u8; chunk_len]))))
}
