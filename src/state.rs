//! Shared application state handed to every handler.

use std::sync::Arc;

use crate::auth::SharedIdentityProvider;
use crate::auth::claims::ClaimIdentity;
use crate::config::AppConfig;
use crate::services::admin_service::AdminService;
use crate::services::bucket_service::BucketService;
use crate::services::file_service::FileService;
use crate::services::permissions::PermissionResolver;
use crate::store::{LockManager, MetadataStore, StorageLayout, StoreError};

/// One clone per request; every member is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub buckets: BucketService,
    pub files: FileService,
    pub admin: AdminService,
    pub store: MetadataStore,
    pub identity: SharedIdentityProvider,
    pub max_file_size_mb: u64,
}

impl AppState {
    /// Builds the service stack over the configured storage root and seeds
    /// the metadata documents.
    pub async fn from_config(config: &AppConfig) -> Result<Self, StoreError> {
        let store = MetadataStore::new(StorageLayout::new(config.storage_root.clone()));
        store.ensure_initialized(&config.bootstrap_admin).await?;

        let locks = LockManager::new(config.lock_timeout(), config.lock_lease());
        let permissions = PermissionResolver::new(store.clone());

        let buckets = BucketService::new(store.clone(), locks.clone(), permissions.clone());
        let files = FileService::new(
            store.clone(),
            locks.clone(),
            permissions.clone(),
            config.max_file_size_mb,
        );
        let admin = AdminService::new(store.clone(), locks, permissions);

        let identity: SharedIdentityProvider =
            Arc::new(ClaimIdentity::new(config.identity_claim.clone()));

        Ok(Self {
            buckets,
            files,
            admin,
            store,
            identity,
            max_file_size_mb: config.max_file_size_mb,
        })
    }
}
