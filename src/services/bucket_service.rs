//! Bucket lifecycle: create, enumerate, delete.

use std::io;

use chrono::Utc;
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::bucket::{BucketRecord, BucketSummary};
use crate::models::permission::{PermissionLevel, Scope};
use crate::store::{FileIndex, LockManager, MetadataStore};

use super::permissions::{Access, PermissionResolver};
use super::{ServiceError, ServiceResult, ensure_id_safe, with_lock};

#[derive(Clone)]
pub struct BucketService {
    store: MetadataStore,
    locks: LockManager,
    permissions: PermissionResolver,
}

impl BucketService {
    pub fn new(store: MetadataStore, locks: LockManager, permissions: PermissionResolver) -> Self {
        Self {
            store,
            locks,
            permissions,
        }
    }

    /// Buckets visible to `user`: every registered bucket for wildcard
    /// members, otherwise the ids in their membership set. Unknown users get
    /// an empty list rather than a rejection.
    pub async fn list_buckets(&self, user: &str) -> ServiceResult<Vec<BucketSummary>> {
        let Some(grants) = self.permissions.grants_for(user).await? else {
            return Ok(Vec::new());
        };
        let registry = self.store.load_buckets().await?;
        Ok(registry
            .buckets
            .iter()
            .filter(|(bucket_id, _)| grants.member_of(bucket_id))
            .map(|(bucket_id, record)| BucketSummary::from_record(bucket_id.clone(), record))
            .collect())
    }

    /// Creates the bucket directory, seeds its empty file index, registers
    /// it, and grants the creator admin on the new bucket. Returns the
    /// generated bucket id.
    pub async fn create_bucket(&self, user: &str, name: &str) -> ServiceResult<String> {
        self.permissions
            .require(user, &Scope::System, Access::Write, "create a new bucket")
            .await?;
        if name.trim().is_empty() {
            return Err(ServiceError::Validation("bucket name is required".into()));
        }

        // The bucket registry lock always precedes the permission lock; no
        // caller acquires them in the other order.
        let layout = self.store.layout().clone();
        let bucket_id = with_lock(
            &self.locks,
            &layout.buckets_document(),
            user,
            self.register_bucket(user, name),
        )
        .await?;

        // Grant phase. A failure here leaves the bucket registered without
        // its creator grant; the caller already holds system rights and can
        // delete or re-grant.
        with_lock(
            &self.locks,
            &layout.permissions_document(),
            user,
            self.grant_creator(user, &bucket_id),
        )
        .await?;

        debug!(bucket_id, created_by = user, "created bucket");
        Ok(bucket_id)
    }

    /// Removes the bucket from the registry, deletes its directory tree, and
    /// drops the caller's own grant for the dead id.
    ///
    /// Grants held by other users are left in place; ids are never reused,
    /// so those stale grants are inert.
    pub async fn delete_bucket(&self, user: &str, bucket_id: &str) -> ServiceResult<()> {
        ensure_id_safe(bucket_id)?;
        self.permissions
            .require(user, &Scope::System, Access::Write, "delete a bucket")
            .await?;

        let layout = self.store.layout().clone();
        with_lock(&self.locks, &layout.buckets_document(), user, async {
            let mut registry = self.store.load_buckets().await?;
            if !registry.contains(bucket_id) {
                return Err(ServiceError::NotFound("bucket"));
            }
            // Directory first: after a partial failure the registry entry is
            // still there, so the delete can simply be retried.
            match fs::remove_dir_all(layout.bucket_dir(bucket_id)).await {
                Ok(()) => {}
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
            registry.buckets.remove(bucket_id);
            self.store.save_buckets(&registry).await?;
            Ok(())
        })
        .await?;

        // Revoke phase, same lock order as creation. A failure here strands
        // the caller's grant, which is as inert as everyone else's.
        with_lock(
            &self.locks,
            &layout.permissions_document(),
            user,
            self.revoke_caller(user, bucket_id),
        )
        .await?;

        debug!(bucket_id, deleted_by = user, "deleted bucket");
        Ok(())
    }

    /// Registry mutation half of bucket creation; runs under the bucket
    /// registry lock.
    async fn register_bucket(&self, user: &str, name: &str) -> ServiceResult<String> {
        let mut registry = self.store.load_buckets().await?;
        let layout = self.store.layout();

        let mut bucket_id = Uuid::new_v4().to_string();
        while registry.contains(&bucket_id)
            || fs::try_exists(layout.bucket_dir(&bucket_id)).await?
        {
            bucket_id = Uuid::new_v4().to_string();
        }

        let dir = layout.bucket_dir(&bucket_id);
        fs::create_dir(&dir).await?;

        let registered = async {
            self.store
                .save_file_index(&bucket_id, &FileIndex::default())
                .await?;
            registry.buckets.insert(
                bucket_id.clone(),
                BucketRecord {
                    name: name.to_string(),
                    created_by: user.to_string(),
                    created_at: Utc::now(),
                },
            );
            self.store.save_buckets(&registry).await?;
            Ok::<_, ServiceError>(())
        }
        .await;

        if let Err(err) = registered {
            // Roll the directory back; the registry never saw this bucket.
            if let Err(cleanup) = fs::remove_dir_all(&dir).await {
                warn!(bucket_id, error = %cleanup, "could not roll back bucket directory");
            }
            return Err(err);
        }
        Ok(bucket_id)
    }

    /// Creator-grant half of bucket creation; runs under the permission
    /// registry lock.
    async fn grant_creator(&self, user: &str, bucket_id: &str) -> ServiceResult<()> {
        let mut registry = self.store.load_permissions().await?;
        registry
            .users
            .entry(user.to_string())
            .or_default()
            .grant(Scope::bucket(bucket_id), PermissionLevel::Admin);
        self.store.save_permissions(&registry).await?;
        Ok(())
    }

    /// Caller-grant removal half of bucket deletion; runs under the
    /// permission registry lock. Tolerates a caller with no explicit grant
    /// for the bucket (wildcard members never held one).
    async fn revoke_caller(&self, user: &str, bucket_id: &str) -> ServiceResult<()> {
        let mut registry = self.store.load_permissions().await?;
        if let Some(grants) = registry.users.get_mut(user) {
            grants.revoke(&Scope::bucket(bucket_id));
            self.store.save_permissions(&registry).await?;
        }
        Ok(())
    }
}
