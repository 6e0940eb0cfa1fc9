//! Storage traits for the transactional relational store.
//!
//! The store is reached exclusively through these traits; the domain service
//! never talks to a database driver directly. Multi-statement invariants are
//! expressed as dedicated atomic-unit methods (`create_with_owner`,
//! `update_roles_atomic`, `redeem`) so every backend can map them onto its
//! own transaction primitive. The store's row-level semantics are the only
//! concurrency control across requests.

use super::types::{MemberRecord, Membership, Organization, OrganizationInvite, User};
use crate::error::Result;
use crate::rbac::{GlobalRole, OrgRole, Permission};
use async_trait::async_trait;

/// User records, materialized from the identity provider.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Upsert a user by subject id.
    ///
    /// Creates the record with the default global role on first sight;
    /// refreshes the email otherwise (last-write-wins). Must be safe under
    /// concurrent calls for the same id.
    async fn upsert_user(&self, id: &str, email: &str) -> Result<User>;

    /// Find a user by id.
    async fn find_user(&self, id: &str) -> Result<Option<User>>;

    /// Set a user's platform-wide role.
    ///
    /// Fails with `NotFound` if the user does not exist.
    async fn update_global_role(&self, id: &str, role: GlobalRole) -> Result<User>;
}

/// Organization records.
#[async_trait]
pub trait OrganizationStore: Send + Sync {
    /// Create an organization together with its owner membership as one
    /// atomic unit: both rows commit together or neither does.
    async fn create_with_owner(&self, org: &Organization, owner: &Membership) -> Result<()>;

    /// Find an organization by id.
    async fn find_organization(&self, id: &str) -> Result<Option<Organization>>;

    /// List the organizations a user holds a membership in.
    async fn organizations_for_user(&self, user_id: &str) -> Result<Vec<Organization>>;
}

/// Membership records, keyed by (user, organization).
#[async_trait]
pub trait MembershipStore: Send + Sync {
    /// Insert a membership.
    ///
    /// Fails with `AlreadyMember` when the composite key is occupied (a
    /// conflict, never a silent no-op).
    async fn add_member(&self, membership: &Membership) -> Result<()>;

    /// Delete a membership. Succeeds whether or not the row exists.
    async fn remove_member(&self, organization_id: &str, user_id: &str) -> Result<()>;

    /// Look up one membership by composite key. Pure read.
    async fn membership(
        &self,
        organization_id: &str,
        user_id: &str,
    ) -> Result<Option<Membership>>;

    /// Fetch the memberships of several users in one organization with a
    /// single query.
    async fn memberships_for_users(
        &self,
        organization_id: &str,
        user_ids: &[&str],
    ) -> Result<Vec<Membership>>;

    /// List an organization's members joined with their emails.
    async fn list_members(&self, organization_id: &str) -> Result<Vec<MemberRecord>>;

    /// Set one member's role.
    ///
    /// Fails with `NotAMember` if the membership does not exist.
    async fn update_role(
        &self,
        organization_id: &str,
        user_id: &str,
        role: OrgRole,
    ) -> Result<Membership>;

    /// Apply several role changes in one organization as one atomic unit.
    ///
    /// All updates commit together or none do. Ownership transfer depends on
    /// this to never leave an organization with zero or two owners.
    async fn update_roles_atomic(
        &self,
        organization_id: &str,
        changes: &[(&str, OrgRole)],
    ) -> Result<()>;
}

/// Invite records, addressed by token for the accept flow.
#[async_trait]
pub trait InviteStore: Send + Sync {
    /// Persist a new invite.
    async fn create_invite(&self, invite: &OrganizationInvite) -> Result<()>;

    /// Find an invite by its token. Pure read.
    async fn find_invite_by_token(&self, token: &str) -> Result<Option<OrganizationInvite>>;

    /// Redeem an invite: insert the membership and set `accepted_at`, as one
    /// atomic unit.
    ///
    /// Single use is enforced here, not by the preceding read: the
    /// `accepted_at` write is conditional on the column still being null,
    /// and losing that race fails the whole unit with `InvalidInvite`. A
    /// membership already present for the (user, organization) pair fails
    /// it with `AlreadyMember`.
    async fn redeem(&self, invite_id: &str, membership: &Membership) -> Result<()>;
}

/// Seeded role→permission mappings, read at decision time.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Upsert one (role, permission) pair. Idempotent.
    async fn upsert_role_permission(&self, role: OrgRole, permission: Permission) -> Result<()>;

    /// The permissions granted to a role.
    async fn permissions_for_role(&self, role: OrgRole) -> Result<Vec<Permission>>;
}

/// Everything the domain service and gate need from one backend.
pub trait AccessStore:
    UserStore + OrganizationStore + MembershipStore + InviteStore + CatalogStore
{
}

impl<S> AccessStore for S where
    S: UserStore + OrganizationStore + MembershipStore + InviteStore + CatalogStore
{
}
