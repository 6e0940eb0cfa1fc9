use super::jwt::JwtVerifier;
use crate::error::{AccessError, Result};
use crate::org::storage::UserStore;
use crate::org::types::User;
use tracing::instrument;

/// A caller whose token has been verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedSubject {
    /// Subject identifier, used as the local user id.
    pub id: String,
    pub email: String,
    /// Provider role hint from the token, if any. Informational only.
    pub role_hint: Option<String>,
}

/// Turns a bearer credential into a [`VerifiedSubject`] and keeps the local
/// user record in sync with the token's claims.
#[derive(Clone)]
pub struct IdentityResolver {
    verifier: JwtVerifier,
}

impl IdentityResolver {
    pub fn new(verifier: JwtVerifier) -> Self {
        Self { verifier }
    }

    /// Verify an `Authorization` header value.
    ///
    /// Accepts either a bare token or the `Bearer <token>` form. A missing
    /// or malformed credential is rejected before any signature work.
    #[instrument(skip_all)]
    pub async fn resolve(&self, authorization: Option<&str>) -> Result<VerifiedSubject> {
        let raw = authorization
            .ok_or_else(|| AccessError::unauthenticated("Missing authorization header"))?;
        let token = raw.strip_prefix("Bearer ").unwrap_or(raw).trim();
        if token.is_empty() {
            return Err(AccessError::unauthenticated("Empty bearer token"));
        }

        let data = self.verifier.verify(token).await?;
        Ok(VerifiedSubject {
            id: data.claims.sub,
            email: data.claims.email,
            role_hint: data.claims.role,
        })
    }

    /// Upsert the local user row for a verified subject.
    ///
    /// Creates the record on first sight and refreshes the email on every
    /// call, so a provider-side email change propagates on the next request.
    pub async fn materialize_user<U: UserStore>(
        &self,
        store: &U,
        subject: &VerifiedSubject,
    ) -> Result<User> {
        store.upsert_user(&subject.id, &subject.email).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
    use serde_json::json;

    const SECRET: &[u8] = b"resolver_test_secret_000000";

    fn resolver() -> IdentityResolver {
        IdentityResolver::new(JwtVerifier::from_secret(SECRET, "https://issuer.test", "account"))
    }

    fn valid_token() -> String {
        encode(
            &Header::new(Algorithm::HS256),
            &json!({
                "sub": "user-1",
                "email": "alice@example.com",
                "role": "authenticated",
                "exp": chrono::Utc::now().timestamp() + 3600,
                "iss": "https://issuer.test",
                "aud": "account",
            }),
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn resolves_bearer_header() {
        let header = format!("Bearer {}", valid_token());
        let subject = resolver().resolve(Some(&header)).await.unwrap();
        assert_eq!(subject.id, "user-1");
        assert_eq!(subject.email, "alice@example.com");
        assert_eq!(subject.role_hint.as_deref(), Some("authenticated"));
    }

    #[tokio::test]
    async fn resolves_bare_token() {
        let token = valid_token();
        let subject = resolver().resolve(Some(&token)).await.unwrap();
        assert_eq!(subject.id, "user-1");
    }

    #[tokio::test]
    async fn missing_header_is_unauthenticated() {
        let err = resolver().resolve(None).await.unwrap_err();
        assert_eq!(err.status_code(), 401);
    }

    #[tokio::test]
    async fn empty_bearer_is_unauthenticated() {
        let err = resolver().resolve(Some("Bearer ")).await.unwrap_err();
        assert_eq!(err.status_code(), 401);
    }

    #[tokio::test]
    async fn garbage_token_is_unauthenticated() {
        let err = resolver().resolve(Some("Bearer not.a.jwt")).await.unwrap_err();
        assert_eq!(err.status_code(), 401);
    }
}
