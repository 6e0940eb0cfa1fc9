//! Role types: per-organization roles and the coarse global user role.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role a user holds within one organization.
///
/// Exactly one membership per organization holds [`OrgRole::Owner`] at any
/// time; that invariant is maintained by the domain service's transition
/// rules, not by a count constraint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrgRole {
    /// Organization owner with full permissions.
    Owner,
    /// Administrator who can manage members.
    Admin,
    /// Regular member with read access.
    #[default]
    Member,
}

impl OrgRole {
    /// Get the string representation of the role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Admin => "admin",
            Self::Member => "member",
        }
    }

    /// Check if this is the owner role.
    #[must_use]
    pub fn is_owner(&self) -> bool {
        matches!(self, Self::Owner)
    }
}

/// Error returned when parsing a role string fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseRoleError {
    invalid_value: String,
    expected: &'static str,
}

impl ParseRoleError {
    fn new(invalid_value: &str, expected: &'static str) -> Self {
        Self {
            invalid_value: invalid_value.to_string(),
            expected,
        }
    }
}

impl fmt::Display for ParseRoleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid role: '{}' (expected: {})",
            self.invalid_value, self.expected
        )
    }
}

impl std::error::Error for ParseRoleError {}

impl FromStr for OrgRole {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "owner" => Ok(Self::Owner),
            "admin" => Ok(Self::Admin),
            "member" => Ok(Self::Member),
            _ => Err(ParseRoleError::new(s, "owner, admin, or member")),
        }
    }
}

impl fmt::Display for OrgRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Role that can be granted through an invite or a role update.
///
/// The owner role is deliberately absent: ownership only moves through
/// [`transfer_ownership`](crate::org::OrganizationService::transfer_ownership).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssignableRole {
    /// Administrator who can manage members.
    Admin,
    /// Regular member with read access.
    Member,
}

impl AssignableRole {
    /// Get the string representation of the role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Member => "member",
        }
    }

    /// Widen to the full organization role set.
    #[must_use]
    pub fn as_org_role(&self) -> OrgRole {
        match self {
            Self::Admin => OrgRole::Admin,
            Self::Member => OrgRole::Member,
        }
    }
}

impl FromStr for AssignableRole {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "member" => Ok(Self::Member),
            _ => Err(ParseRoleError::new(s, "admin or member")),
        }
    }
}

impl fmt::Display for AssignableRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Platform-wide user role, independent of any organization membership.
///
/// Checked only by the coarse global-role gate for administrative
/// operations; never consulted by the per-organization permission catalog.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GlobalRole {
    /// Regular platform user.
    #[default]
    User,
    /// Platform administrator.
    Admin,
}

impl GlobalRole {
    /// Get the string representation of the role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }
}

impl FromStr for GlobalRole {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            _ => Err(ParseRoleError::new(s, "user or admin")),
        }
    }
}

impl fmt::Display for GlobalRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_org_role_parsing() {
        assert_eq!("owner".parse::<OrgRole>().unwrap(), OrgRole::Owner);
        assert_eq!("ADMIN".parse::<OrgRole>().unwrap(), OrgRole::Admin);
        assert_eq!("Member".parse::<OrgRole>().unwrap(), OrgRole::Member);
        assert!("superuser".parse::<OrgRole>().is_err());
    }

    #[test]
    fn test_assignable_role_excludes_owner() {
        assert!("owner".parse::<AssignableRole>().is_err());
        assert_eq!(
            "admin".parse::<AssignableRole>().unwrap().as_org_role(),
            OrgRole::Admin
        );
        assert_eq!(
            "member".parse::<AssignableRole>().unwrap().as_org_role(),
            OrgRole::Member
        );
    }

    #[test]
    fn test_global_role_parsing() {
        assert_eq!("user".parse::<GlobalRole>().unwrap(), GlobalRole::User);
        assert_eq!("admin".parse::<GlobalRole>().unwrap(), GlobalRole::Admin);
        assert!("owner".parse::<GlobalRole>().is_err());
    }

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_string(&OrgRole::Owner).unwrap(), "\"owner\"");
        assert_eq!(
            serde_json::to_string(&AssignableRole::Member).unwrap(),
            "\"member\""
        );
        let parsed: OrgRole = serde_json::from_str("\"admin\"").unwrap();
        assert_eq!(parsed, OrgRole::Admin);
    }

    #[test]
    fn test_role_display() {
        assert_eq!(OrgRole::Owner.to_string(), "owner");
        assert_eq!(GlobalRole::Admin.to_string(), "admin");
        assert_eq!(AssignableRole::Admin.to_string(), "admin");
    }
}
