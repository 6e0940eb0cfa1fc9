//! Permission catalog: permission keys and the static role→permission map.
//!
//! The catalog is seed-time data, read-mostly at runtime. Seeding is
//! idempotent: re-running it upserts every pair and never duplicates or
//! revokes mappings.

use super::role::OrgRole;
use crate::error::Result;
use crate::org::storage::CatalogStore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// A named capability in the flat permission namespace.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Permission {
    /// Read organization details.
    OrgRead,
    /// Update organization settings.
    OrgUpdate,
    /// List organization members.
    MembersRead,
    /// Invite a new member.
    MembersInvite,
    /// Remove a member.
    MembersRemove,
    /// Change a member's role.
    MembersUpdateRole,
}

impl Permission {
    /// The wire/storage key for this permission.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OrgRead => "org.read",
            Self::OrgUpdate => "org.update",
            Self::MembersRead => "members.read",
            Self::MembersInvite => "members.invite",
            Self::MembersRemove => "members.remove",
            Self::MembersUpdateRole => "members.updateRole",
        }
    }

    /// Every permission in the catalog.
    pub const ALL: &'static [Permission] = &[
        Self::OrgRead,
        Self::OrgUpdate,
        Self::MembersRead,
        Self::MembersInvite,
        Self::MembersRemove,
        Self::MembersUpdateRole,
    ];
}

impl FromStr for Permission {
    type Err = UnknownPermissionError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "org.read" => Ok(Self::OrgRead),
            "org.update" => Ok(Self::OrgUpdate),
            "members.read" => Ok(Self::MembersRead),
            "members.invite" => Ok(Self::MembersInvite),
            "members.remove" => Ok(Self::MembersRemove),
            "members.updateRole" => Ok(Self::MembersUpdateRole),
            _ => Err(UnknownPermissionError {
                key: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<Permission> for String {
    fn from(p: Permission) -> Self {
        p.as_str().to_string()
    }
}

impl TryFrom<String> for Permission {
    type Error = UnknownPermissionError;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        s.parse()
    }
}

/// Error returned when a permission key is not in the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPermissionError {
    key: String,
}

impl fmt::Display for UnknownPermissionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown permission key: '{}'", self.key)
    }
}

impl std::error::Error for UnknownPermissionError {}

/// The permission set granted to each organization role.
///
/// This is the source of truth for seeding and the fallback for decisions
/// made without a store round-trip.
#[must_use]
pub fn permissions_for_role(role: OrgRole) -> &'static [Permission] {
    match role {
        OrgRole::Owner => &[
            Permission::OrgRead,
            Permission::OrgUpdate,
            Permission::MembersRead,
            Permission::MembersInvite,
            Permission::MembersRemove,
            Permission::MembersUpdateRole,
        ],
        OrgRole::Admin => &[
            Permission::OrgRead,
            Permission::MembersRead,
            Permission::MembersInvite,
            Permission::MembersUpdateRole,
        ],
        OrgRole::Member => &[Permission::OrgRead, Permission::MembersRead],
    }
}

/// Seed the role→permission catalog into a store.
///
/// Upsert semantics per (role, permission) pair: re-seeding neither
/// duplicates pairs nor removes mappings absent from the current source
/// list. There is no runtime mutation API beyond this.
pub async fn seed_catalog<C: CatalogStore>(store: &C) -> Result<()> {
    let mut seeded = 0usize;
    for role in [OrgRole::Owner, OrgRole::Admin, OrgRole::Member] {
        for permission in permissions_for_role(role) {
            store.upsert_role_permission(role, *permission).await?;
            seeded += 1;
        }
    }
    debug!(pairs = seeded, "permission catalog seeded");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_has_full_catalog() {
        let owner = permissions_for_role(OrgRole::Owner);
        assert_eq!(owner.len(), 6);
        for p in Permission::ALL {
            assert!(owner.contains(p), "owner missing {p}");
        }
    }

    #[test]
    fn test_admin_permissions_exact() {
        let admin = permissions_for_role(OrgRole::Admin);
        assert_eq!(
            admin,
            &[
                Permission::OrgRead,
                Permission::MembersRead,
                Permission::MembersInvite,
                Permission::MembersUpdateRole,
            ]
        );
        assert!(!admin.contains(&Permission::MembersRemove));
        assert!(!admin.contains(&Permission::OrgUpdate));
    }

    #[test]
    fn test_member_is_read_only() {
        let member = permissions_for_role(OrgRole::Member);
        assert_eq!(member, &[Permission::OrgRead, Permission::MembersRead]);
        assert!(!member.contains(&Permission::MembersInvite));
    }

    #[test]
    fn test_permission_keys_round_trip() {
        for p in Permission::ALL {
            assert_eq!(p.as_str().parse::<Permission>().unwrap(), *p);
        }
        assert!("members.delete".parse::<Permission>().is_err());
    }

    #[test]
    fn test_permission_serde_uses_keys() {
        let json = serde_json::to_string(&Permission::MembersUpdateRole).unwrap();
        assert_eq!(json, "\"members.updateRole\"");
        let parsed: Permission = serde_json::from_str("\"org.read\"").unwrap();
        assert_eq!(parsed, Permission::OrgRead);
    }
}
