//! Authorization checks against the permission registry.

use crate::models::permission::{PermissionLevel, Scope, UserGrants};
use crate::store::MetadataStore;

use super::{ServiceError, ServiceResult};

/// Minimum capability an operation demands on its scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Any grant level suffices: listing and fetching content.
    Read,
    /// `write` or `admin`: content mutation and bucket lifecycle.
    Write,
    /// `admin` only: permission changes and system administration.
    Admin,
}

impl Access {
    fn satisfied_by(self, level: PermissionLevel) -> bool {
        match self {
            Access::Read => level.grants_read(),
            Access::Write => level.grants_write(),
            Access::Admin => level.is_admin(),
        }
    }
}

/// Resolves effective permission levels and enforces them.
///
/// Every check reads the permission registry fresh. Writers replace the
/// document atomically, so an unlocked read always sees a complete version;
/// a grant revoked mid-request takes effect on the next check.
#[derive(Clone)]
pub struct PermissionResolver {
    store: MetadataStore,
}

impl PermissionResolver {
    pub fn new(store: MetadataStore) -> Self {
        Self { store }
    }

    /// The effective level `user` holds on `scope`; `None` for unknown users
    /// and ungranted scopes.
    pub async fn effective_level(
        &self,
        user: &str,
        scope: &Scope,
    ) -> ServiceResult<Option<PermissionLevel>> {
        let registry = self.store.load_permissions().await?;
        Ok(registry.resolve(user, scope))
    }

    /// Requires `user` to hold `access` on `scope`. `denied` names the
    /// attempted action in the rejection message; unknown users are rejected
    /// the same way as users lacking the grant.
    pub async fn require(
        &self,
        user: &str,
        scope: &Scope,
        access: Access,
        denied: &'static str,
    ) -> ServiceResult<()> {
        match self.effective_level(user, scope).await? {
            Some(level) if access.satisfied_by(level) => Ok(()),
            _ => Err(ServiceError::Forbidden(denied)),
        }
    }

    /// The full grants record for `user`, `None` when the user is unknown.
    pub async fn grants_for(&self, user: &str) -> ServiceResult<Option<UserGrants>> {
        let registry = self.store.load_permissions().await?;
        Ok(registry.users.get(user).cloned())
    }
}
