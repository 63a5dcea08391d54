//! Typed load/save for the JSON metadata documents.
//!
//! Writers must hold the document's lock (see [`super::lock`]) before calling
//! any `save_*` method; readers may load without locking because every save
//! is atomic (write to a temp file, fsync, rename into place), so a reader
//! observes either the previous or the next version, never a torn one.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::info;
use uuid::Uuid;

use crate::models::bucket::BucketRecord;
use crate::models::file::FileRecord;
use crate::models::permission::{PermissionLevel, Scope, UserGrants};

use super::StorageLayout;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("metadata document `{}` is corrupt: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("could not encode metadata document `{}`: {source}", path.display())]
    Encode {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// The global bucket registry: `bucket_id → record`.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(transparent)]
pub struct BucketRegistry {
    pub buckets: BTreeMap<String, BucketRecord>,
}

impl BucketRegistry {
    pub fn contains(&self, bucket_id: &str) -> bool {
        self.buckets.contains_key(bucket_id)
    }
}

/// The global permission registry: `username → grants`.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(transparent)]
pub struct PermissionRegistry {
    pub users: BTreeMap<String, UserGrants>,
}

impl PermissionRegistry {
    /// The level `user` holds on `scope`, after wildcard resolution.
    pub fn resolve(&self, user: &str, scope: &Scope) -> Option<PermissionLevel> {
        self.users.get(user).and_then(|grants| grants.effective_level(scope))
    }
}

/// One bucket's file index: `file_id → record` under a `files` key.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct FileIndex {
    pub files: BTreeMap<String, FileRecord>,
}

/// Typed access to the metadata documents beneath one storage root.
#[derive(Clone, Debug)]
pub struct MetadataStore {
    layout: StorageLayout,
}

impl MetadataStore {
    pub fn new(layout: StorageLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    /// Creates the storage root and seeds both global registries if absent.
    ///
    /// The bucket registry starts empty; the permission registry starts with
    /// `bootstrap_admin` holding admin on the system scope and on every
    /// bucket. Existing documents are left untouched, so restarts and
    /// multiple instances over the same root are safe.
    pub async fn ensure_initialized(&self, bootstrap_admin: &str) -> Result<(), StoreError> {
        fs::create_dir_all(self.layout.root()).await?;

        let buckets_doc = self.layout.buckets_document();
        if !fs::try_exists(&buckets_doc).await? {
            self.save_document(&buckets_doc, &BucketRegistry::default())
                .await?;
            info!(document = %buckets_doc.display(), "seeded empty bucket registry");
        }

        let permissions_doc = self.layout.permissions_document();
        if !fs::try_exists(&permissions_doc).await? {
            let mut grants = UserGrants::default();
            grants.permissions.insert(Scope::System, PermissionLevel::Admin);
            grants.permissions.insert(Scope::Wildcard, PermissionLevel::Admin);
            grants.buckets.insert(Scope::Wildcard);
            let mut registry = PermissionRegistry::default();
            registry.users.insert(bootstrap_admin.to_string(), grants);
            self.save_document(&permissions_doc, &registry).await?;
            info!(
                document = %permissions_doc.display(),
                admin = bootstrap_admin,
                "seeded permission registry with bootstrap admin"
            );
        }

        Ok(())
    }

    pub async fn load_buckets(&self) -> Result<BucketRegistry, StoreError> {
        self.load_document(&self.layout.buckets_document()).await
    }

    pub async fn save_buckets(&self, registry: &BucketRegistry) -> Result<(), StoreError> {
        self.save_document(&self.layout.buckets_document(), registry)
            .await
    }

    pub async fn load_permissions(&self) -> Result<PermissionRegistry, StoreError> {
        self.load_document(&self.layout.permissions_document()).await
    }

    pub async fn save_permissions(&self, registry: &PermissionRegistry) -> Result<(), StoreError> {
        self.save_document(&self.layout.permissions_document(), registry)
            .await
    }

    /// Loads a bucket's file index. A bucket directory without an index
    /// document yields an empty index rather than an error.
    pub async fn load_file_index(&self, bucket_id: &str) -> Result<FileIndex, StoreError> {
        let path = self.layout.file_index_document(bucket_id);
        match fs::read(&path).await {
            Ok(raw) => serde_json::from_slice(&raw)
                .map_err(|source| StoreError::Corrupt { path, source }),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(FileIndex::default()),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn save_file_index(
        &self,
        bucket_id: &str,
        index: &FileIndex,
    ) -> Result<(), StoreError> {
        self.save_document(&self.layout.file_index_document(bucket_id), index)
            .await
    }

    async fn load_document<T: DeserializeOwned>(&self, path: &Path) -> Result<T, StoreError> {
        let raw = fs::read(path).await?;
        serde_json::from_slice(&raw).map_err(|source| StoreError::Corrupt {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Atomic replace: write a temp file in the target directory, fsync it,
    /// then rename over the destination.
    async fn save_document<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), StoreError> {
        let encoded = serde_json::to_vec(value).map_err(|source| StoreError::Encode {
            path: path.to_path_buf(),
            source,
        })?;

        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let tmp_path = dir.join(format!(".tmp-{}", Uuid::new_v4()));

        let result = async {
            let mut tmp = fs::File::create(&tmp_path).await?;
            tmp.write_all(&encoded).await?;
            tmp.flush().await?;
            tmp.sync_all().await?;
            fs::rename(&tmp_path, path).await?;
            Ok(())
        }
        .await;

        if result.is_err() {
            let _ = fs::remove_file(&tmp_path).await;
        }
        result.map_err(StoreError::Io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn store_in(dir: &tempfile::TempDir) -> MetadataStore {
        MetadataStore::new(StorageLayout::new(dir.path()))
    }

    #[tokio::test]
    async fn initialization_seeds_registries_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.ensure_initialized("root@corp.example").await.unwrap();

        let raw = std::fs::read(store.layout().permissions_document()).unwrap();
        let seeded: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(
            seeded,
            json!({
                "root@corp.example": {
                    "permissions": {"SYSTEM": "admin", "*": "admin"},
                    "buckets": ["*"]
                }
            })
        );
        assert!(store.load_buckets().await.unwrap().buckets.is_empty());

        // A second pass must not clobber live data.
        let mut registry = store.load_permissions().await.unwrap();
        registry.users.entry("root@corp.example".into()).and_modify(|grants| {
            grants.grant(Scope::bucket("b-1"), PermissionLevel::Read);
        });
        store.save_permissions(&registry).await.unwrap();
        store.ensure_initialized("root@corp.example").await.unwrap();
        let reloaded = store.load_permissions().await.unwrap();
        assert_eq!(
            reloaded.resolve("root@corp.example", &Scope::bucket("b-1")),
            // Wildcard admin outranks the explicit read grant.
            Some(PermissionLevel::Admin)
        );
        assert!(reloaded.users["root@corp.example"]
            .permissions
            .contains_key(&Scope::bucket("b-1")));
    }

    #[tokio::test]
    async fn bucket_registry_round_trips_in_document_shape() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.ensure_initialized("root@corp.example").await.unwrap();

        let mut registry = store.load_buckets().await.unwrap();
        registry.buckets.insert(
            "0a1b".into(),
            BucketRecord {
                name: "reports".into(),
                created_by: "alice@corp.example".into(),
                created_at: Utc::now(),
            },
        );
        store.save_buckets(&registry).await.unwrap();

        let raw = std::fs::read(store.layout().buckets_document()).unwrap();
        let doc: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(doc["0a1b"]["name"], "reports");
        assert_eq!(doc["0a1b"]["created_by"], "alice@corp.example");

        let reloaded = store.load_buckets().await.unwrap();
        assert!(reloaded.contains("0a1b"));
        assert_eq!(reloaded.buckets["0a1b"].name, "reports");
    }

    #[tokio::test]
    async fn missing_file_index_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.ensure_initialized("root@corp.example").await.unwrap();

        let index = store.load_file_index("nonexistent-bucket").await.unwrap();
        assert!(index.files.is_empty());
    }

    #[tokio::test]
    async fn file_index_round_trips_under_files_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.ensure_initialized("root@corp.example").await.unwrap();
        fs::create_dir_all(store.layout().bucket_dir("b-7")).await.unwrap();

        let mut index = FileIndex::default();
        index.files.insert(
            "f-1".into(),
            FileRecord {
                file_name: "notes.txt".into(),
                file_size_mb: 0.25,
                created_by: "alice@corp.example".into(),
                created_at: Utc::now(),
            },
        );
        store.save_file_index("b-7", &index).await.unwrap();

        let raw = std::fs::read(store.layout().file_index_document("b-7")).unwrap();
        let doc: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(doc["files"]["f-1"]["file_name"], "notes.txt");
        assert_eq!(doc["files"]["f-1"]["file_size"], 0.25);

        let reloaded = store.load_file_index("b-7").await.unwrap();
        assert_eq!(reloaded.files.len(), 1);
        assert_eq!(reloaded.files["f-1"].file_size_mb, 0.25);
    }

    #[tokio::test]
    async fn corrupt_document_is_reported_with_its_path() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.ensure_initialized("root@corp.example").await.unwrap();
        std::fs::write(store.layout().buckets_document(), b"{not json").unwrap();

        let err = store.load_buckets().await.unwrap_err();
        match err {
            StoreError::Corrupt { path, .. } => {
                assert_eq!(path, store.layout().buckets_document());
            }
            other => panic!("expected corrupt, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn saves_leave_no_temp_files_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.ensure_initialized("root@corp.example").await.unwrap();
        store.save_buckets(&BucketRegistry::default()).await.unwrap();
        store.save_permissions(&PermissionRegistry::default()).await.unwrap();

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().starts_with(".tmp-"))
            .collect();
        assert!(leftovers.is_empty(), "stray temp files: {leftovers:?}");
    }
}
