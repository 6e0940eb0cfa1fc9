use serde::{Deserialize, Serialize};

/// Claims carried by an access token.
///
/// Only the fields the resolver consumes are modelled. Unknown claims are
/// ignored during deserialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityClaims {
    /// Stable subject identifier from the identity provider.
    pub sub: String,
    /// Email address asserted by the identity provider.
    pub email: String,
    /// Optional provider-side role hint. Not trusted for authorization,
    /// only surfaced for diagnostics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Expiry as a unix timestamp (validated by the verifier).
    pub exp: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_minimal_claims() {
        let claims: IdentityClaims = serde_json::from_str(
            r#"{"sub":"user-1","email":"a@b.com","exp":9999999999,"aud":"ignored"}"#,
        )
        .unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.email, "a@b.com");
        assert!(claims.role.is_none());
    }
}
