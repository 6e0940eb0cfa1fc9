//! Audit trail for organization mutations.
//!
//! Every accepted state change emits exactly one entry after the change
//! commits. Recording is best-effort observability: a failed audit write is
//! surfaced in the logs, never rolled into the domain transaction.

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Actions recorded in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditAction {
    /// An organization was created.
    #[serde(rename = "organization.created")]
    OrganizationCreated,
    /// A member invite was issued.
    #[serde(rename = "member.invited")]
    MemberInvited,
    /// An invite was accepted and a membership created.
    #[serde(rename = "member.joined")]
    MemberJoined,
    /// A member was removed.
    #[serde(rename = "member.removed")]
    MemberRemoved,
    /// A member's role was changed.
    #[serde(rename = "member.role_updated")]
    MemberRoleUpdated,
    /// Ownership moved to another member.
    #[serde(rename = "organization.ownership_transferred")]
    OwnershipTransferred,
}

impl AuditAction {
    /// The stable action tag stored and queried by consumers.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OrganizationCreated => "organization.created",
            Self::MemberInvited => "member.invited",
            Self::MemberJoined => "member.joined",
            Self::MemberRemoved => "member.removed",
            Self::MemberRoleUpdated => "member.role_updated",
            Self::OwnershipTransferred => "organization.ownership_transferred",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "organization.created" => Ok(Self::OrganizationCreated),
            "member.invited" => Ok(Self::MemberInvited),
            "member.joined" => Ok(Self::MemberJoined),
            "member.removed" => Ok(Self::MemberRemoved),
            "member.role_updated" => Ok(Self::MemberRoleUpdated),
            "organization.ownership_transferred" => Ok(Self::OwnershipTransferred),
            other => Err(format!("unknown audit action: {other}")),
        }
    }
}

/// One append-only audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Unique identifier for this entry.
    pub id: String,
    /// Organization the action happened in.
    pub organization_id: String,
    /// User who performed the action.
    pub actor_id: String,
    /// What happened.
    pub action: AuditAction,
    /// Target user, for membership actions.
    pub target_id: Option<String>,
    /// Structured action details.
    pub metadata: Option<serde_json::Value>,
    /// When the entry was recorded.
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    /// Create a new entry for an action in an organization.
    #[must_use]
    pub fn new(
        action: AuditAction,
        organization_id: impl Into<String>,
        actor_id: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            organization_id: organization_id.into(),
            actor_id: actor_id.into(),
            action,
            target_id: None,
            metadata: None,
            created_at: Utc::now(),
        }
    }

    /// Set the target user id.
    #[must_use]
    pub fn with_target(mut self, target_id: impl Into<String>) -> Self {
        self.target_id = Some(target_id.into());
        self
    }

    /// Attach structured metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Append-only audit persistence.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Append one entry.
    async fn record(&self, entry: &AuditEntry) -> Result<()>;

    /// Read an organization's entries, newest first, up to `limit`.
    async fn entries_for_organization(
        &self,
        organization_id: &str,
        limit: usize,
    ) -> Result<Vec<AuditEntry>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_builder() {
        let entry = AuditEntry::new(AuditAction::MemberRemoved, "org_1", "admin_1")
            .with_target("user_2");

        assert_eq!(entry.action, AuditAction::MemberRemoved);
        assert_eq!(entry.organization_id, "org_1");
        assert_eq!(entry.actor_id, "admin_1");
        assert_eq!(entry.target_id.as_deref(), Some("user_2"));
        assert!(entry.metadata.is_none());
    }

    #[test]
    fn test_action_tags() {
        assert_eq!(
            AuditAction::OrganizationCreated.to_string(),
            "organization.created"
        );
        assert_eq!(AuditAction::MemberRoleUpdated.to_string(), "member.role_updated");
        assert_eq!(
            AuditAction::OwnershipTransferred.to_string(),
            "organization.ownership_transferred"
        );
    }

    #[test]
    fn test_entry_serialization() {
        let entry = AuditEntry::new(AuditAction::MemberJoined, "org_1", "user_1")
            .with_metadata(serde_json::json!({ "via": "invite" }));
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"action\":\"member.joined\""));
        assert!(json.contains("\"via\":\"invite\""));
    }
}
