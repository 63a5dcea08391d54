//! Permission grants: scopes, levels, and the per-user grant record.
//!
//! A grant's target is a [`Scope`]: a concrete bucket id, the `SYSTEM`
//! pseudo-scope for system-wide rights, or the wildcard `*` covering every
//! bucket. The permission registry maps each user to a [`UserGrants`] record
//! holding their grants and the set of scopes they hold any grant on.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Literal key for system-wide rights in the permission registry.
pub const SYSTEM_SCOPE: &str = "SYSTEM";

/// Literal key for the all-buckets wildcard in the permission registry.
pub const WILDCARD_SCOPE: &str = "*";

/// The authorization target of a grant.
///
/// Serialized as its registry key string (`SYSTEM`, `*`, or the bucket id),
/// which is how scopes appear as JSON object keys on disk.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Scope {
    /// System-wide rights; never satisfied by the wildcard.
    System,
    /// Every bucket scope except `SYSTEM`.
    Wildcard,
    /// One concrete bucket, by id.
    Bucket(String),
}

impl Scope {
    /// Scope for a concrete bucket id.
    pub fn bucket(id: impl Into<String>) -> Self {
        Scope::Bucket(id.into())
    }

    pub fn is_system(&self) -> bool {
        matches!(self, Scope::System)
    }

    /// The registry key string for this scope.
    pub fn as_str(&self) -> &str {
        match self {
            Scope::System => SYSTEM_SCOPE,
            Scope::Wildcard => WILDCARD_SCOPE,
            Scope::Bucket(id) => id,
        }
    }
}

impl From<String> for Scope {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            SYSTEM_SCOPE => Scope::System,
            WILDCARD_SCOPE => Scope::Wildcard,
            _ => Scope::Bucket(raw),
        }
    }
}

impl From<Scope> for String {
    fn from(scope: Scope) -> Self {
        match scope {
            Scope::Bucket(id) => id,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored access level. `remove` is an action, not a level; see
/// [`PermissionAction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionLevel {
    Admin,
    Write,
    Read,
}

impl PermissionLevel {
    /// Levels that may read bucket contents (list/get files).
    pub fn grants_read(self) -> bool {
        matches!(self, Self::Admin | Self::Read | Self::Write)
    }

    /// Levels that may mutate bucket contents (upload/delete files) or, at
    /// `SYSTEM` scope, create and delete buckets.
    pub fn grants_write(self) -> bool {
        matches!(self, Self::Admin | Self::Write)
    }

    pub fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Admin => "admin",
            Self::Write => "write",
            Self::Read => "read",
        })
    }
}

/// What a set-permission request asks for: store a level, or remove the
/// existing grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionAction {
    Set(PermissionLevel),
    Remove,
}

impl PermissionAction {
    /// Parse the wire value. Accepts exactly `admin`, `write`, `read`,
    /// `remove`; anything else is a validation failure at the call site.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "admin" => Some(Self::Set(PermissionLevel::Admin)),
            "write" => Some(Self::Set(PermissionLevel::Write)),
            "read" => Some(Self::Set(PermissionLevel::Read)),
            "remove" => Some(Self::Remove),
            _ => None,
        }
    }
}

/// One user's entry in the permission registry.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UserGrants {
    /// Scope → granted level.
    pub permissions: BTreeMap<Scope, PermissionLevel>,

    /// Every scope the user holds any grant on; drives bucket enumeration.
    /// May contain the wildcard. Stored as a set: duplicate entries written
    /// by earlier versions collapse on load.
    pub buckets: BTreeSet<Scope>,
}

impl UserGrants {
    /// Effective level for a scope under wildcard precedence.
    ///
    /// A wildcard grant decides every non-`SYSTEM` scope outright, even when
    /// an explicit grant for that scope exists. `SYSTEM` is only ever
    /// satisfied by an explicit `SYSTEM` entry.
    pub fn effective_level(&self, scope: &Scope) -> Option<PermissionLevel> {
        if !scope.is_system() {
            if let Some(level) = self.permissions.get(&Scope::Wildcard) {
                return Some(*level);
            }
        }
        self.permissions.get(scope).copied()
    }

    /// Record a grant and its scope membership.
    pub fn grant(&mut self, scope: Scope, level: PermissionLevel) {
        self.buckets.insert(scope.clone());
        self.permissions.insert(scope, level);
    }

    /// Drop a grant and its scope membership; no-op when absent.
    pub fn revoke(&mut self, scope: &Scope) {
        self.permissions.remove(scope);
        self.buckets.remove(scope);
    }

    /// Whether the membership set covers `bucket_id`, directly or through
    /// the wildcard. Decides which buckets the user sees when listing.
    pub fn member_of(&self, bucket_id: &str) -> bool {
        self.buckets.contains(&Scope::Wildcard)
            || self.buckets.contains(&Scope::Bucket(bucket_id.to_string()))
    }
}
