//! Authorization gates.
//!
//! Two separate decision paths that must not be conflated:
//!
//! - [`authorize`]: the per-organization permission gate. Given the caller's
//!   membership role and an operation's required permissions, allow iff every
//!   required permission is granted to that role.
//! - [`require_global_role`]: the coarse global-role gate for administrative
//!   operations keyed off the platform-wide user role, independent of any
//!   organization membership.

use super::catalog::Permission;
use super::role::{GlobalRole, OrgRole};
use crate::error::{AccessError, Result};
use crate::identity::VerifiedSubject;
use crate::org::storage::UserStore;
use crate::org::User;
use tracing::debug;

/// Require every permission in `required` to be present in `granted`.
///
/// The check is conjunctive: all required permissions must hold, not any.
/// An empty required set is vacuously allowed.
pub fn authorize(granted: &[Permission], required: &[Permission]) -> Result<()> {
    if let Some(missing) = required.iter().find(|p| !granted.contains(p)) {
        debug!(permission = %missing, "permission check failed");
        return Err(AccessError::forbidden("Insufficient permissions"));
    }
    Ok(())
}

/// Convenience form of [`authorize`] that resolves the granted set from the
/// static catalog for a role.
pub fn authorize_role(role: OrgRole, required: &[Permission]) -> Result<()> {
    authorize(super::catalog::permissions_for_role(role), required)
}

/// Operations on the organization API surface.
///
/// This declarative table replaces per-handler metadata: each operation
/// names whether it needs a resolved membership and which catalog
/// permissions it requires. The gate consults it before dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Create an organization; caller becomes owner.
    CreateOrganization,
    /// List the caller's own organizations.
    ListOwnOrganizations,
    /// List members of an organization.
    ListMembers,
    /// Invite a member (admin or member role).
    InviteMember,
    /// Accept an invite; the token is the credential.
    AcceptInvite,
    /// Remove a member (never the owner).
    RemoveMember,
    /// Change a member's role (never the owner's).
    UpdateMemberRole,
    /// Transfer ownership; gated on the caller holding the owner role,
    /// checked in the domain service rather than via the catalog.
    TransferOwnership,
    /// Read the organization's audit log.
    ReadAuditLogs,
}

impl Operation {
    /// Stable identifier, used in logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateOrganization => "organization.create",
            Self::ListOwnOrganizations => "organization.list_own",
            Self::ListMembers => "members.list",
            Self::InviteMember => "members.invite",
            Self::AcceptInvite => "invite.accept",
            Self::RemoveMember => "members.remove",
            Self::UpdateMemberRole => "members.update_role",
            Self::TransferOwnership => "organization.transfer_ownership",
            Self::ReadAuditLogs => "audit.read",
        }
    }

    /// Catalog permissions the caller's role must grant.
    ///
    /// Empty means no catalog-based requirement. `TransferOwnership` is
    /// empty here on purpose: its owner check is a distinct rule, not a
    /// permission lookup.
    #[must_use]
    pub fn required_permissions(&self) -> &'static [Permission] {
        match self {
            Self::ListMembers => &[Permission::MembersRead],
            Self::InviteMember => &[Permission::MembersInvite],
            Self::RemoveMember => &[Permission::MembersRemove],
            Self::UpdateMemberRole => &[Permission::MembersUpdateRole],
            Self::CreateOrganization
            | Self::ListOwnOrganizations
            | Self::AcceptInvite
            | Self::TransferOwnership
            | Self::ReadAuditLogs => &[],
        }
    }

    /// Whether the operation targets an organization the caller must be a
    /// member of. Operations without membership context never reach the
    /// permission gate.
    #[must_use]
    pub fn requires_membership(&self) -> bool {
        !matches!(
            self,
            Self::CreateOrganization | Self::ListOwnOrganizations | Self::AcceptInvite
        )
    }
}

/// Coarse global-role gate for administrative operations.
///
/// Materializes the local user record from the verified identity (upsert by
/// subject id) and requires the user's platform role to be in `allowed`.
/// This path is independent of organization memberships and the permission
/// catalog.
pub async fn require_global_role<U: UserStore>(
    store: &U,
    subject: &VerifiedSubject,
    allowed: &[GlobalRole],
) -> Result<User> {
    let user = store.upsert_user(&subject.id, &subject.email).await?;
    if !allowed.contains(&user.role) {
        debug!(user_id = %user.id, role = %user.role, "global role check failed");
        return Err(AccessError::forbidden("Insufficient role"));
    }
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rbac::catalog::permissions_for_role;

    #[test]
    fn test_authorize_is_conjunctive() {
        let granted = permissions_for_role(OrgRole::Admin);
        // Admin holds invite but not remove; requiring both must fail.
        assert!(authorize(granted, &[Permission::MembersInvite]).is_ok());
        assert!(
            authorize(granted, &[Permission::MembersInvite, Permission::MembersRemove]).is_err()
        );
    }

    #[test]
    fn test_empty_requirement_is_vacuously_allowed() {
        assert!(authorize(&[], &[]).is_ok());
        assert!(authorize(permissions_for_role(OrgRole::Member), &[]).is_ok());
    }

    #[test]
    fn test_allow_iff_in_catalog() {
        for role in [OrgRole::Owner, OrgRole::Admin, OrgRole::Member] {
            for p in Permission::ALL {
                let allowed = authorize_role(role, &[*p]).is_ok();
                assert_eq!(
                    allowed,
                    permissions_for_role(role).contains(p),
                    "role {role} permission {p}"
                );
            }
        }
    }

    #[test]
    fn test_member_cannot_invite() {
        assert!(authorize_role(OrgRole::Member, &[Permission::MembersInvite]).is_err());
    }

    #[test]
    fn test_operation_table() {
        assert_eq!(
            Operation::InviteMember.required_permissions(),
            &[Permission::MembersInvite]
        );
        assert_eq!(
            Operation::RemoveMember.required_permissions(),
            &[Permission::MembersRemove]
        );
        assert!(Operation::TransferOwnership.required_permissions().is_empty());
        assert!(Operation::TransferOwnership.requires_membership());
        assert!(!Operation::CreateOrganization.requires_membership());
        assert!(!Operation::AcceptInvite.requires_membership());
        assert!(Operation::ReadAuditLogs.requires_membership());
    }
}
