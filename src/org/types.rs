//! Domain record types.

use crate::rbac::{AssignableRole, GlobalRole, OrgRole};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A platform user, materialized from the external identity provider.
///
/// The id is the stable external subject id and never changes; the email is
/// refreshed on every successful identity resolution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Stable external subject id.
    pub id: String,
    /// Most recently seen email for this subject.
    pub email: String,
    /// Platform-wide role, independent of organization memberships.
    pub role: GlobalRole,
    /// When the local record was first materialized.
    pub created_at: DateTime<Utc>,
}

/// An organization. Never deleted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    /// Unique identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Links one user to one organization with exactly one role.
///
/// Composite key (user_id, organization_id): at most one membership per
/// user per organization. The role field is the sole source of truth for
/// authorization; "is owner" is never cached elsewhere.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    /// Member's user id.
    pub user_id: String,
    /// Organization id.
    pub organization_id: String,
    /// Role within this organization.
    pub role: OrgRole,
    /// When the membership was created.
    pub created_at: DateTime<Utc>,
}

/// A membership joined with the member's email, for listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRecord {
    /// The membership itself.
    pub membership: Membership,
    /// The member's email.
    pub email: String,
}

/// A single-use invitation into an organization.
///
/// Addressed independently by its unguessable token: possession of the
/// token substitutes for membership in the accept flow. Mutated once, when
/// `accepted_at` is set, and never deleted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationInvite {
    /// Unique identifier.
    pub id: String,
    /// Unguessable single-use token.
    pub token: String,
    /// Organization the invite grants entry to.
    pub organization_id: String,
    /// Invitee email. The invitee need not exist as a user yet.
    pub email: String,
    /// Role granted on acceptance; never owner.
    pub role: AssignableRole,
    /// When the invite was issued.
    pub created_at: DateTime<Utc>,
    /// Set exactly once, when the invite is accepted.
    pub accepted_at: Option<DateTime<Utc>>,
}

impl OrganizationInvite {
    /// Whether the invite has already been used.
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        self.accepted_at.is_some()
    }
}
