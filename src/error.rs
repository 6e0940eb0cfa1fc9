//! Error taxonomy for the authorization pipeline and domain operations.

use thiserror::Error;

/// Errors produced by identity resolution, authorization, and organization
/// domain operations.
///
/// Every variant carries a stable, caller-safe message. Storage failures are
/// reported opaquely; the underlying detail goes to the server-side logs, not
/// to callers.
#[derive(Debug, Error)]
pub enum AccessError {
    /// The request carried a missing, malformed, or expired credential.
    #[error("Authentication required: {0}")]
    Unauthenticated(String),

    /// Neither a subject nor a target organization could be resolved from
    /// the request.
    #[error("Organization context missing")]
    MissingContext,

    /// The subject has no membership in the target organization.
    #[error("Not a member of this organization")]
    NotAMember,

    /// The subject's role does not grant the required permissions, or the
    /// operation is reserved for a role the subject does not hold.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The target membership is the organization owner, which cannot be
    /// removed or re-roled. Ownership must be transferred first.
    #[error("Cannot modify the organization owner")]
    CannotModifyOwner,

    /// The proposed new owner already holds the owner role.
    #[error("User is already the owner")]
    AlreadyOwner,

    /// The invite token does not exist or has already been used.
    #[error("Invalid or expired invite")]
    InvalidInvite,

    /// A membership already exists for this (user, organization) pair.
    #[error("User is already a member of this organization")]
    AlreadyMember,

    /// A request field failed validation.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The email address is not well-formed.
    #[error("Invalid email format: {0}")]
    InvalidEmail(String),

    /// A referenced record does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The backing store failed. Not leaked verbatim to callers.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl AccessError {
    pub fn unauthenticated(msg: impl Into<String>) -> Self {
        Self::Unauthenticated(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// HTTP-class status for this failure, for embedding layers that map
    /// errors onto a wire protocol.
    ///
    /// Membership absence surfaces as 403, not 404: callers probing an
    /// organization they do not belong to learn nothing about it.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Unauthenticated(_) => 401,
            Self::MissingContext
            | Self::NotAMember
            | Self::Forbidden(_)
            | Self::CannotModifyOwner => 403,
            Self::AlreadyOwner
            | Self::InvalidInvite
            | Self::InvalidInput(_)
            | Self::InvalidEmail(_) => 400,
            Self::AlreadyMember => 409,
            Self::NotFound(_) => 404,
            Self::Storage(_) => 500,
        }
    }
}

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, AccessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(AccessError::unauthenticated("no token").status_code(), 401);
        assert_eq!(AccessError::MissingContext.status_code(), 403);
        assert_eq!(AccessError::NotAMember.status_code(), 403);
        assert_eq!(AccessError::CannotModifyOwner.status_code(), 403);
        assert_eq!(AccessError::AlreadyOwner.status_code(), 400);
        assert_eq!(AccessError::InvalidInvite.status_code(), 400);
        assert_eq!(AccessError::AlreadyMember.status_code(), 409);
        assert_eq!(AccessError::not_found("user u1").status_code(), 404);
        assert_eq!(AccessError::storage("db down").status_code(), 500);
    }

    #[test]
    fn test_messages_are_stable() {
        assert_eq!(
            AccessError::InvalidInvite.to_string(),
            "Invalid or expired invite"
        );
        assert_eq!(
            AccessError::CannotModifyOwner.to_string(),
            "Cannot modify the organization owner"
        );
        assert_eq!(
            AccessError::AlreadyOwner.to_string(),
            "User is already the owner"
        );
    }
}
