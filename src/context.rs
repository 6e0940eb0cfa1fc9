//! Staged request context: authenticate, scope to an organization, resolve
//! membership, then authorize.
//!
//! Each stage produces a context type that proves the previous stages ran,
//! so handlers can require exactly the guarantees they need in their
//! signatures.

use crate::error::{AccessError, Result};
use crate::identity::{IdentityResolver, VerifiedSubject};
use crate::org::storage::{CatalogStore, MembershipStore, UserStore};
use crate::org::types::{Membership, User};
use crate::rbac::{self, Operation, Permission};
use tracing::instrument;

/// Where a request carries its organization id.
///
/// Resolution order is fixed: an `orgId` path parameter wins, then a
/// generic `id` path parameter, then an `organizationId` field from the
/// request body. Empty strings are treated as absent.
#[derive(Debug, Clone, Default)]
pub struct OrgScope {
    pub org_id_param: Option<String>,
    pub id_param: Option<String>,
    pub body_organization_id: Option<String>,
}

impl OrgScope {
    /// Scope taken from an `orgId` path parameter.
    pub fn from_org_id_param(org_id: impl Into<String>) -> Self {
        Self {
            org_id_param: Some(org_id.into()),
            ..Self::default()
        }
    }

    /// Scope taken from a generic `id` path parameter.
    pub fn from_id_param(id: impl Into<String>) -> Self {
        Self {
            id_param: Some(id.into()),
            ..Self::default()
        }
    }

    /// Scope taken from an `organizationId` body field.
    pub fn from_body(organization_id: impl Into<String>) -> Self {
        Self {
            body_organization_id: Some(organization_id.into()),
            ..Self::default()
        }
    }

    /// First non-empty source in precedence order.
    #[must_use]
    pub fn resolve(&self) -> Option<&str> {
        [
            self.org_id_param.as_deref(),
            self.id_param.as_deref(),
            self.body_organization_id.as_deref(),
        ]
        .into_iter()
        .flatten()
        .find(|s| !s.is_empty())
    }
}

/// Proof of authentication: a verified subject and its local user record.
#[derive(Debug, Clone)]
pub struct AuthedContext {
    pub subject: VerifiedSubject,
    pub user: User,
}

/// An authenticated caller bound to one organization id.
///
/// The id has been extracted but membership has not been checked yet.
#[derive(Debug, Clone)]
pub struct ScopedContext {
    pub subject: VerifiedSubject,
    pub user: User,
    pub organization_id: String,
}

/// Full proof: the caller is a member of the organization, with the
/// permissions their role grants.
#[derive(Debug, Clone)]
pub struct MemberContext {
    pub user: User,
    pub organization_id: String,
    pub membership: Membership,
    pub granted: Vec<Permission>,
}

/// Runs the context pipeline against a store.
#[derive(Clone)]
pub struct AccessGate<S> {
    identity: IdentityResolver,
    store: S,
}

impl<S> AccessGate<S>
where
    S: UserStore + MembershipStore + CatalogStore,
{
    pub fn new(identity: IdentityResolver, store: S) -> Self {
        Self { identity, store }
    }

    /// Stage one: verify the credential and materialize the local user.
    #[instrument(skip_all)]
    pub async fn authenticate(&self, authorization: Option<&str>) -> Result<AuthedContext> {
        let subject = self.identity.resolve(authorization).await?;
        let user = self.identity.materialize_user(&self.store, &subject).await?;
        Ok(AuthedContext { subject, user })
    }

    /// Stage two: bind the caller to the organization named by the request.
    ///
    /// Fails with [`AccessError::MissingContext`] when no source yields an
    /// organization id.
    pub fn scope(&self, authed: AuthedContext, scope: &OrgScope) -> Result<ScopedContext> {
        let organization_id = scope
            .resolve()
            .ok_or(AccessError::MissingContext)?
            .to_string();
        Ok(ScopedContext {
            subject: authed.subject,
            user: authed.user,
            organization_id,
        })
    }

    /// Stage three: require membership and load the granted permissions.
    #[instrument(skip_all, fields(org_id = %scoped.organization_id, user_id = %scoped.user.id))]
    pub async fn resolve_membership(&self, scoped: ScopedContext) -> Result<MemberContext> {
        let membership = self
            .store
            .membership(&scoped.organization_id, &scoped.user.id)
            .await?
            .ok_or(AccessError::NotAMember)?;
        let granted = self.store.permissions_for_role(membership.role).await?;
        Ok(MemberContext {
            user: scoped.user,
            organization_id: scoped.organization_id,
            membership,
            granted,
        })
    }

    /// Run every stage for an org-scoped operation.
    ///
    /// Authenticates, resolves the organization id, requires membership and
    /// checks the operation's permissions against the member's grants. An
    /// operation with no required permissions still demands membership;
    /// finer checks (owner-only rules) live in the domain service.
    ///
    /// Operations whose [`Operation::requires_membership`] is false should
    /// go through [`Self::check_authenticated`] instead.
    #[instrument(skip_all, fields(operation = %operation.as_str()))]
    pub async fn check(
        &self,
        authorization: Option<&str>,
        scope: &OrgScope,
        operation: Operation,
    ) -> Result<MemberContext> {
        let authed = self.authenticate(authorization).await?;
        let scoped = self.scope(authed, scope)?;
        let member = self.resolve_membership(scoped).await?;
        rbac::authorize(&member.granted, operation.required_permissions())?;
        Ok(member)
    }

    /// Authenticate without binding to an organization.
    ///
    /// Entry point for operations that act on no existing organization,
    /// such as creating one or accepting an invite.
    pub async fn check_authenticated(
        &self,
        authorization: Option<&str>,
    ) -> Result<AuthedContext> {
        self.authenticate(authorization).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::JwtVerifier;
    use crate::org::memory::InMemoryStore;
    use crate::org::types::Membership;
    use crate::rbac::{seed_catalog, OrgRole};
    use chrono::Utc;
    use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
    use serde_json::json;

    const SECRET: &[u8] = b"context_test_secret_000000";

    fn token_for(sub: &str, email: &str) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            &json!({
                "sub": sub,
                "email": email,
                "exp": Utc::now().timestamp() + 3600,
                "iss": "https://issuer.test",
                "aud": "account",
            }),
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap()
    }

    async fn gate() -> (AccessGate<InMemoryStore>, InMemoryStore) {
        let store = InMemoryStore::new();
        seed_catalog(&store).await.unwrap();
        let resolver = IdentityResolver::new(JwtVerifier::from_secret(
            SECRET,
            "https://issuer.test",
            "account",
        ));
        (AccessGate::new(resolver, store.clone()), store)
    }

    fn membership(org: &str, user: &str, role: OrgRole) -> Membership {
        Membership {
            user_id: user.to_string(),
            organization_id: org.to_string(),
            role,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn scope_precedence_org_id_first() {
        let scope = OrgScope {
            org_id_param: Some("org-a".into()),
            id_param: Some("org-b".into()),
            body_organization_id: Some("org-c".into()),
        };
        assert_eq!(scope.resolve(), Some("org-a"));
    }

    #[test]
    fn scope_skips_empty_sources() {
        let scope = OrgScope {
            org_id_param: Some(String::new()),
            id_param: None,
            body_organization_id: Some("org-c".into()),
        };
        assert_eq!(scope.resolve(), Some("org-c"));
    }

    #[test]
    fn scope_empty_everywhere_is_none() {
        assert_eq!(OrgScope::default().resolve(), None);
    }

    #[tokio::test]
    async fn check_passes_for_member_with_permission() {
        let (gate, store) = gate().await;
        store.insert_membership(membership("org-1", "user-1", OrgRole::Member));

        let header = format!("Bearer {}", token_for("user-1", "alice@example.com"));
        let member = gate
            .check(
                Some(&header),
                &OrgScope::from_org_id_param("org-1"),
                Operation::ListMembers,
            )
            .await
            .unwrap();
        assert_eq!(member.organization_id, "org-1");
        assert_eq!(member.membership.role, OrgRole::Member);
    }

    #[tokio::test]
    async fn check_forbids_member_without_permission() {
        let (gate, store) = gate().await;
        store.insert_membership(membership("org-1", "user-1", OrgRole::Member));

        let header = format!("Bearer {}", token_for("user-1", "alice@example.com"));
        let err = gate
            .check(
                Some(&header),
                &OrgScope::from_org_id_param("org-1"),
                Operation::RemoveMember,
            )
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 403);
    }

    #[tokio::test]
    async fn check_rejects_non_member() {
        let (gate, _store) = gate().await;

        let header = format!("Bearer {}", token_for("user-1", "alice@example.com"));
        let err = gate
            .check(
                Some(&header),
                &OrgScope::from_org_id_param("org-1"),
                Operation::ListMembers,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::NotAMember));
    }

    #[tokio::test]
    async fn check_rejects_missing_scope() {
        let (gate, store) = gate().await;
        store.insert_membership(membership("org-1", "user-1", OrgRole::Member));

        let header = format!("Bearer {}", token_for("user-1", "alice@example.com"));
        let err = gate
            .check(Some(&header), &OrgScope::default(), Operation::ListMembers)
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::MissingContext));
    }

    #[tokio::test]
    async fn check_rejects_missing_credential() {
        let (gate, _store) = gate().await;
        let err = gate
            .check(
                None,
                &OrgScope::from_org_id_param("org-1"),
                Operation::ListMembers,
            )
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 401);
    }

    #[tokio::test]
    async fn authenticate_materializes_user() {
        let (gate, store) = gate().await;
        let header = format!("Bearer {}", token_for("user-9", "new@example.com"));
        let authed = gate.check_authenticated(Some(&header)).await.unwrap();
        assert_eq!(authed.user.id, "user-9");
        let found = store.find_user("user-9").await.unwrap();
        assert_eq!(found.unwrap().email, "new@example.com");
    }

    #[tokio::test]
    async fn membership_required_even_without_permissions() {
        // Transfer ownership lists no catalog permissions but still needs
        // membership in the target organization.
        let (gate, _store) = gate().await;
        let header = format!("Bearer {}", token_for("user-1", "alice@example.com"));
        let err = gate
            .check(
                Some(&header),
                &OrgScope::from_id_param("org-1"),
                Operation::TransferOwnership,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::NotAMember));
    }
}
