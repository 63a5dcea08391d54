//! Permission grants and system administrator management.

use tracing::{debug, info};

use crate::models::permission::{PermissionAction, PermissionLevel, Scope};
use crate::store::{LockManager, MetadataStore};

use super::permissions::{Access, PermissionResolver};
use super::{ServiceError, ServiceResult, ensure_id_safe, require_bucket, with_lock};

#[derive(Clone)]
pub struct AdminService {
    store: MetadataStore,
    locks: LockManager,
    permissions: PermissionResolver,
}

impl AdminService {
    pub fn new(store: MetadataStore, locks: LockManager, permissions: PermissionResolver) -> Self {
        Self {
            store,
            locks,
            permissions,
        }
    }

    /// Applies a permission action for `target` on a bucket scope.
    ///
    /// `admin`/`write`/`read` store that level and record scope membership,
    /// creating the target's registry entry on first grant. `remove` drops
    /// the grant and membership, and is a no-op when neither exists.
    pub async fn set_permission(
        &self,
        caller: &str,
        bucket_id: &str,
        target: &str,
        permission: &str,
    ) -> ServiceResult<()> {
        ensure_id_safe(bucket_id)?;
        require_bucket(&self.store, bucket_id).await?;
        self.permissions
            .require(
                caller,
                &Scope::bucket(bucket_id),
                Access::Admin,
                "set the permission level for this bucket",
            )
            .await?;

        if target.trim().is_empty() {
            return Err(ServiceError::Validation("user is required".into()));
        }
        if permission.trim().is_empty() {
            return Err(ServiceError::Validation("permission is required".into()));
        }
        let Some(action) = PermissionAction::parse(permission) else {
            return Err(ServiceError::Validation(
                "invalid permission, must be one of: admin, read, write, remove".into(),
            ));
        };

        let layout = self.store.layout().clone();
        with_lock(
            &self.locks,
            &layout.permissions_document(),
            caller,
            async {
                let mut registry = self.store.load_permissions().await?;
                let scope = Scope::bucket(bucket_id);
                match action {
                    PermissionAction::Set(level) => {
                        registry
                            .users
                            .entry(target.to_string())
                            .or_default()
                            .grant(scope, level);
                    }
                    PermissionAction::Remove => {
                        if let Some(grants) = registry.users.get_mut(target) {
                            grants.revoke(&scope);
                        }
                    }
                }
                self.store.save_permissions(&registry).await?;
                Ok(())
            },
        )
        .await?;

        debug!(bucket_id, target, permission, set_by = caller, "updated bucket permission");
        Ok(())
    }

    /// Grants `admin` the system administrator set: `SYSTEM` admin plus the
    /// wildcard grant over every bucket. Existing grants are kept.
    pub async fn add_system_admin(&self, caller: &str, admin: &str) -> ServiceResult<()> {
        self.permissions
            .require(
                caller,
                &Scope::System,
                Access::Admin,
                "create a new system admin",
            )
            .await?;
        if admin.trim().is_empty() {
            return Err(ServiceError::Validation("admin is required".into()));
        }

        let layout = self.store.layout().clone();
        with_lock(
            &self.locks,
            &layout.permissions_document(),
            caller,
            async {
                let mut registry = self.store.load_permissions().await?;
                let grants = registry.users.entry(admin.to_string()).or_default();
                // `SYSTEM` is a permission scope, never a bucket membership.
                grants
                    .permissions
                    .insert(Scope::System, PermissionLevel::Admin);
                grants.grant(Scope::Wildcard, PermissionLevel::Admin);
                self.store.save_permissions(&registry).await?;
                Ok(())
            },
        )
        .await?;

        info!(admin, granted_by = caller, "granted system administrator");
        Ok(())
    }

    /// Demotes `admin`: removes the `SYSTEM` and wildcard grants while
    /// leaving any bucket-specific grants in place. Succeeds even when the
    /// user holds no such grants or is unknown.
    pub async fn delete_system_admin(&self, caller: &str, admin: &str) -> ServiceResult<()> {
        self.permissions
            .require(caller, &Scope::System, Access::Admin, "delete a system admin")
            .await?;
        if admin.trim().is_empty() {
            return Err(ServiceError::Validation("admin is required".into()));
        }

        let layout = self.store.layout().clone();
        with_lock(
            &self.locks,
            &layout.permissions_document(),
            caller,
            async {
                let mut registry = self.store.load_permissions().await?;
                if let Some(grants) = registry.users.get_mut(admin) {
                    grants.revoke(&Scope::System);
                    grants.revoke(&Scope::Wildcard);
                    self.store.save_permissions(&registry).await?;
                }
                Ok(())
            },
        )
        .await?;

        info!(admin, revoked_by = caller, "revoked system administrator");
        Ok(())
    }
}
