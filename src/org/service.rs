//! Organization domain service.
//!
//! Owns every state transition on organizations, memberships, and invites,
//! and the invariants those transitions maintain. Permission checks happen
//! upstream in the authorization gate; this service enforces the structural
//! rules that no permission can override (owner protection, single-owner
//! invariant, single-use invites).

use super::storage::{InviteStore, MembershipStore, OrganizationStore};
use super::types::{MemberRecord, Membership, Organization, OrganizationInvite};
use super::utils::{generate_invite_token, is_valid_email};
use crate::audit::{AuditAction, AuditEntry, AuditSink};
use crate::error::{AccessError, Result};
use crate::rbac::AssignableRole;
use chrono::Utc;
use serde_json::json;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Default number of audit entries returned by [`OrganizationService::audit_logs`].
pub const DEFAULT_AUDIT_LIMIT: usize = 100;

/// Domain service over a store and an audit sink.
///
/// Audit entries are written after the state change commits. A failed audit
/// write is logged and surfaced to operators through the log stream; it never
/// rolls back the state change.
#[derive(Clone)]
pub struct OrganizationService<S, A> {
    store: S,
    audit: A,
}

impl<S, A> OrganizationService<S, A>
where
    S: OrganizationStore + MembershipStore + InviteStore,
    A: AuditSink,
{
    /// Create a new service.
    #[must_use]
    pub fn new(store: S, audit: A) -> Self {
        Self { store, audit }
    }

    /// Get a reference to the store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Create an organization with the creator as owner.
    ///
    /// The organization and the owner membership are one atomic unit.
    #[instrument(skip(self), fields(org.name = %name))]
    pub async fn create_organization(
        &self,
        creator_id: &str,
        name: &str,
    ) -> Result<Organization> {
        if name.trim().is_empty() {
            return Err(AccessError::invalid_input("organization name is required"));
        }

        let now = Utc::now();
        let org = Organization {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            created_at: now,
        };
        let owner = Membership {
            user_id: creator_id.to_string(),
            organization_id: org.id.clone(),
            role: crate::rbac::OrgRole::Owner,
            created_at: now,
        };

        self.store.create_with_owner(&org, &owner).await?;

        info!(org_id = %org.id, owner_id = creator_id, "organization created");

        self.record(
            AuditEntry::new(AuditAction::OrganizationCreated, &org.id, creator_id)
                .with_metadata(json!({ "name": name })),
        )
        .await;

        Ok(org)
    }

    /// Issue an invite into an organization.
    ///
    /// The invitee need not exist as a user yet, and repeated invites to the
    /// same email are allowed. The caller's `members.invite` permission is
    /// enforced upstream by the gate.
    #[instrument(skip(self))]
    pub async fn invite_member(
        &self,
        organization_id: &str,
        email: &str,
        role: AssignableRole,
        actor_id: &str,
    ) -> Result<OrganizationInvite> {
        self.store
            .find_organization(organization_id)
            .await?
            .ok_or_else(|| {
                AccessError::not_found(format!("organization {organization_id}"))
            })?;

        if !is_valid_email(email) {
            return Err(AccessError::InvalidEmail(email.to_string()));
        }

        let invite = OrganizationInvite {
            id: Uuid::new_v4().to_string(),
            token: generate_invite_token(),
            organization_id: organization_id.to_string(),
            email: email.to_string(),
            role,
            created_at: Utc::now(),
            accepted_at: None,
        };

        self.store.create_invite(&invite).await?;

        info!(org_id = organization_id, invite_id = %invite.id, actor_id, "member invited");

        self.record(
            AuditEntry::new(AuditAction::MemberInvited, organization_id, actor_id)
                .with_metadata(json!({ "email": email, "role": role })),
        )
        .await;

        Ok(invite)
    }

    /// Accept an invite by token, creating the membership.
    ///
    /// The token is the credential; no membership or permission is required
    /// of the caller. Single use: membership insert and the `accepted_at`
    /// write are one atomic unit, conditional on the invite still being
    /// unaccepted; two concurrent acceptances of the same token produce
    /// exactly one membership.
    #[instrument(skip(self, token))]
    pub async fn accept_invite(&self, user_id: &str, token: &str) -> Result<Membership> {
        let invite = self
            .store
            .find_invite_by_token(token)
            .await?
            .ok_or(AccessError::InvalidInvite)?;

        if invite.is_accepted() {
            return Err(AccessError::InvalidInvite);
        }

        let membership = Membership {
            user_id: user_id.to_string(),
            organization_id: invite.organization_id.clone(),
            role: invite.role.as_org_role(),
            created_at: Utc::now(),
        };

        self.store.redeem(&invite.id, &membership).await?;

        info!(
            org_id = %invite.organization_id,
            user_id,
            invite_id = %invite.id,
            "invite accepted"
        );

        self.record(
            AuditEntry::new(AuditAction::MemberJoined, &invite.organization_id, user_id)
                .with_metadata(json!({ "via": "invite" })),
        )
        .await;

        Ok(membership)
    }

    /// Remove a member from an organization.
    ///
    /// Idempotent on absence: removing a non-member succeeds without an
    /// audit entry. The owner can never be removed by this path; ownership
    /// must be transferred first.
    #[instrument(skip(self))]
    pub async fn remove_member(
        &self,
        organization_id: &str,
        user_id: &str,
        actor_id: &str,
    ) -> Result<()> {
        let Some(membership) = self.store.membership(organization_id, user_id).await? else {
            debug!(org_id = organization_id, user_id, "no membership to remove");
            return Ok(());
        };

        if membership.role.is_owner() {
            return Err(AccessError::CannotModifyOwner);
        }

        self.store.remove_member(organization_id, user_id).await?;

        info!(org_id = organization_id, user_id, actor_id, "member removed");

        self.record(
            AuditEntry::new(AuditAction::MemberRemoved, organization_id, actor_id)
                .with_target(user_id),
        )
        .await;

        Ok(())
    }

    /// Change a member's role.
    ///
    /// The owner's role is immutable via this path, for any requested role.
    #[instrument(skip(self))]
    pub async fn update_member_role(
        &self,
        organization_id: &str,
        user_id: &str,
        new_role: AssignableRole,
        actor_id: &str,
    ) -> Result<Membership> {
        let membership = self
            .store
            .membership(organization_id, user_id)
            .await?
            .ok_or(AccessError::NotAMember)?;

        if membership.role.is_owner() {
            return Err(AccessError::CannotModifyOwner);
        }

        let updated = self
            .store
            .update_role(organization_id, user_id, new_role.as_org_role())
            .await?;

        info!(org_id = organization_id, user_id, role = %new_role, actor_id, "member role updated");

        self.record(
            AuditEntry::new(AuditAction::MemberRoleUpdated, organization_id, actor_id)
                .with_target(user_id)
                .with_metadata(json!({ "newRole": new_role })),
        )
        .await;

        Ok(updated)
    }

    /// Transfer ownership to another member.
    ///
    /// The current owner is demoted to admin and the new owner promoted, as
    /// one atomic unit, so the organization never observably has zero or two
    /// owners. The caller must currently hold the owner role; this is a
    /// distinct rule, not a catalog permission.
    #[instrument(skip(self))]
    pub async fn transfer_ownership(
        &self,
        organization_id: &str,
        current_owner_id: &str,
        new_owner_id: &str,
    ) -> Result<()> {
        let memberships = self
            .store
            .memberships_for_users(organization_id, &[current_owner_id, new_owner_id])
            .await?;

        let current = memberships.iter().find(|m| m.user_id == current_owner_id);
        let new_owner = memberships.iter().find(|m| m.user_id == new_owner_id);

        match current {
            Some(m) if m.role.is_owner() => {}
            _ => {
                return Err(AccessError::forbidden(
                    "Only the owner can transfer ownership",
                ))
            }
        }

        let new_owner = new_owner.ok_or_else(|| {
            AccessError::forbidden("New owner must be a member of the organization")
        })?;

        if new_owner.role.is_owner() {
            return Err(AccessError::AlreadyOwner);
        }

        self.store
            .update_roles_atomic(
                organization_id,
                &[
                    (current_owner_id, crate::rbac::OrgRole::Admin),
                    (new_owner_id, crate::rbac::OrgRole::Owner),
                ],
            )
            .await?;

        info!(
            org_id = organization_id,
            former_owner = current_owner_id,
            new_owner = new_owner_id,
            "ownership transferred"
        );

        self.record(
            AuditEntry::new(
                AuditAction::OwnershipTransferred,
                organization_id,
                current_owner_id,
            )
            .with_target(new_owner_id),
        )
        .await;

        Ok(())
    }

    /// List an organization's members with their emails. Pure read.
    pub async fn organization_members(&self, organization_id: &str) -> Result<Vec<MemberRecord>> {
        self.store.list_members(organization_id).await
    }

    /// List the caller's organizations. Pure read, scoped to the caller.
    pub async fn user_organizations(&self, user_id: &str) -> Result<Vec<Organization>> {
        self.store.organizations_for_user(user_id).await
    }

    /// Read an organization's audit log, newest first.
    pub async fn audit_logs(&self, organization_id: &str) -> Result<Vec<AuditEntry>> {
        self.audit
            .entries_for_organization(organization_id, DEFAULT_AUDIT_LIMIT)
            .await
    }

    /// Record an audit entry, surfacing failures to operators without
    /// propagating them.
    async fn record(&self, entry: AuditEntry) {
        if let Err(e) = self.audit.record(&entry).await {
            warn!(
                error = %e,
                action = %entry.action,
                org_id = %entry.organization_id,
                "failed to record audit entry"
            );
        }
    }
}
