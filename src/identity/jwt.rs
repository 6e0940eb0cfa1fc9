use super::claims::IdentityClaims;
use crate::error::{AccessError, Result};
use jsonwebtoken::{Algorithm, DecodingKey, TokenData, Validation, decode, decode_header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// JSON Web Key as published by identity providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jwk {
    pub kty: String,
    pub kid: Option<String>,
    pub n: String,
    pub e: String,
    #[serde(rename = "use")]
    pub key_use: Option<String>,
    pub alg: Option<String>,
}

/// JWK Set containing multiple keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwkSet {
    pub keys: Vec<Jwk>,
}

impl JwkSet {
    /// Fetch a JWK Set from a URL.
    pub async fn fetch(url: &str) -> Result<Self> {
        let client = Client::new();
        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| AccessError::storage(format!("Failed to fetch JWKS: {}", e)))?;

        if !response.status().is_success() {
            return Err(AccessError::storage(format!(
                "JWKS endpoint returned status: {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AccessError::storage(format!("Failed to parse JWKS: {}", e)))
    }

    /// Find a JWK by key ID.
    pub fn find_by_kid(&self, kid: &str) -> Option<&Jwk> {
        self.keys
            .iter()
            .find(|jwk| jwk.kid.as_ref().map(|k| k == kid).unwrap_or(false))
    }
}

struct CachedJwks {
    jwks: JwkSet,
    last_fetch: Instant,
}

/// Verifies bearer tokens and decodes [`IdentityClaims`].
///
/// Keys come either from a JWKS endpoint (RS256, with rate-limited refresh
/// on key rotation) or from a static HS256 secret. Issuer and audience are
/// always validated.
#[derive(Clone)]
pub struct JwtVerifier {
    cache: Arc<RwLock<CachedJwks>>,
    jwks_url: Option<String>,
    decoding_key: Option<DecodingKey>,
    validation: Validation,
    /// Minimum spacing between JWKS fetches, derived from the configured
    /// requests-per-minute cap.
    min_refresh_interval: Duration,
}

impl JwtVerifier {
    /// Create a verifier that fetches RS256 keys from a JWKS endpoint.
    ///
    /// `requests_per_minute` caps how often a rotation-triggered refresh may
    /// hit the endpoint. An unknown `kid` inside the window fails without a
    /// network call.
    pub async fn from_jwks_url(
        url: impl Into<String>,
        issuer: impl Into<String>,
        audience: impl Into<String>,
        requests_per_minute: u32,
    ) -> Result<Self> {
        let url = url.into();
        let jwks = JwkSet::fetch(&url).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_exp = true;
        // No clock tolerance: an elapsed exp is rejected immediately.
        validation.leeway = 0;
        validation.set_issuer(&[issuer.into()]);
        validation.set_audience(&[audience.into()]);

        Ok(Self {
            cache: Arc::new(RwLock::new(CachedJwks {
                jwks,
                last_fetch: Instant::now(),
            })),
            jwks_url: Some(url),
            decoding_key: None,
            validation,
            min_refresh_interval: refresh_interval(requests_per_minute),
        })
    }

    /// Create a JWKS-backed verifier from configuration.
    ///
    /// Fails with `InvalidInput` when no JWKS URL is configured; use
    /// [`Self::from_secret`] for secret-based setups.
    pub async fn from_config(config: &crate::config::IdentityConfig) -> Result<Self> {
        let url = config
            .jwks_url
            .as_deref()
            .ok_or_else(|| AccessError::invalid_input("jwks_url is required"))?;
        Self::from_jwks_url(
            url,
            config.issuer.as_str(),
            config.audience.as_str(),
            config.jwks_requests_per_minute,
        )
        .await
    }

    /// Create a verifier from a static HS256 secret.
    ///
    /// Meant for local development and tests where no JWKS endpoint exists.
    pub fn from_secret(
        secret: &[u8],
        issuer: impl Into<String>,
        audience: impl Into<String>,
    ) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.set_issuer(&[issuer.into()]);
        validation.set_audience(&[audience.into()]);

        Self {
            cache: Arc::new(RwLock::new(CachedJwks {
                jwks: JwkSet { keys: vec![] },
                last_fetch: Instant::now(),
            })),
            jwks_url: None,
            decoding_key: Some(DecodingKey::from_secret(secret)),
            validation,
            min_refresh_interval: refresh_interval(0),
        }
    }

    /// Verify and decode a token.
    pub async fn verify(&self, token: &str) -> Result<TokenData<IdentityClaims>> {
        if let Some(key) = &self.decoding_key {
            return decode::<IdentityClaims>(token, key, &self.validation)
                .map_err(|e| AccessError::unauthenticated(format!("Invalid token: {}", e)));
        }

        let header = decode_header(token)
            .map_err(|e| AccessError::unauthenticated(format!("Invalid token header: {}", e)))?;
        let kid = header
            .kid
            .as_ref()
            .ok_or_else(|| AccessError::unauthenticated("Token missing 'kid' header"))?;

        if let Some(jwk) = self.lookup(kid).await {
            return self.decode_with(&jwk, token);
        }

        // Unknown kid: the provider may have rotated keys. Refresh at most
        // once per interval, then retry the lookup.
        self.refresh_if_permitted().await?;
        let jwk = self.lookup(kid).await.ok_or_else(|| {
            AccessError::unauthenticated(format!("Key '{}' not found in JWKS", kid))
        })?;
        self.decode_with(&jwk, token)
    }

    async fn lookup(&self, kid: &str) -> Option<Jwk> {
        self.cache.read().await.jwks.find_by_kid(kid).cloned()
    }

    async fn refresh_if_permitted(&self) -> Result<()> {
        let Some(url) = &self.jwks_url else {
            return Ok(());
        };

        let mut cache = self.cache.write().await;
        // Re-checked under the write lock so concurrent misses trigger at
        // most one fetch per interval.
        if cache.last_fetch.elapsed() < self.min_refresh_interval {
            return Ok(());
        }

        let new_jwks = JwkSet::fetch(url).await?;
        cache.jwks = new_jwks;
        cache.last_fetch = Instant::now();
        Ok(())
    }

    fn decode_with(&self, jwk: &Jwk, token: &str) -> Result<TokenData<IdentityClaims>> {
        let decoding_key = DecodingKey::from_rsa_components(&jwk.n, &jwk.e)
            .map_err(|e| AccessError::storage(format!("Failed to create decoding key: {}", e)))?;

        decode::<IdentityClaims>(token, &decoding_key, &self.validation)
            .map_err(|e| AccessError::unauthenticated(format!("Invalid token: {}", e)))
    }
}

fn refresh_interval(requests_per_minute: u32) -> Duration {
    Duration::from_secs(60) / requests_per_minute.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde_json::json;

    const SECRET: &[u8] = b"test_secret_key_1234567890";

    fn token_for(claims: &serde_json::Value) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap()
    }

    fn verifier() -> JwtVerifier {
        JwtVerifier::from_secret(SECRET, "https://issuer.test", "account")
    }

    #[tokio::test]
    async fn accepts_valid_token() {
        let exp = chrono::Utc::now().timestamp() + 3600;
        let token = token_for(&json!({
            "sub": "user-1",
            "email": "alice@example.com",
            "exp": exp,
            "iss": "https://issuer.test",
            "aud": "account",
        }));

        let data = verifier().verify(&token).await.unwrap();
        assert_eq!(data.claims.sub, "user-1");
        assert_eq!(data.claims.email, "alice@example.com");
    }

    #[tokio::test]
    async fn rejects_expired_token() {
        let token = token_for(&json!({
            "sub": "user-1",
            "email": "alice@example.com",
            "exp": chrono::Utc::now().timestamp() - 60,
            "iss": "https://issuer.test",
            "aud": "account",
        }));

        let err = verifier().verify(&token).await.err().unwrap();
        assert_eq!(err.status_code(), 401);
    }

    #[tokio::test]
    async fn expiry_has_no_clock_tolerance() {
        // A token expired only seconds ago is already invalid.
        let token = token_for(&json!({
            "sub": "user-1",
            "email": "alice@example.com",
            "exp": chrono::Utc::now().timestamp() - 5,
            "iss": "https://issuer.test",
            "aud": "account",
        }));

        let err = verifier().verify(&token).await.err().unwrap();
        assert_eq!(err.status_code(), 401);
    }

    #[tokio::test]
    async fn rejects_wrong_issuer() {
        let token = token_for(&json!({
            "sub": "user-1",
            "email": "alice@example.com",
            "exp": chrono::Utc::now().timestamp() + 3600,
            "iss": "https://other.test",
            "aud": "account",
        }));

        assert!(verifier().verify(&token).await.is_err());
    }

    #[tokio::test]
    async fn rejects_wrong_audience() {
        let token = token_for(&json!({
            "sub": "user-1",
            "email": "alice@example.com",
            "exp": chrono::Utc::now().timestamp() + 3600,
            "iss": "https://issuer.test",
            "aud": "somewhere-else",
        }));

        assert!(verifier().verify(&token).await.is_err());
    }

    #[tokio::test]
    async fn rejects_wrong_algorithm() {
        let exp = chrono::Utc::now().timestamp() + 3600;
        let claims = json!({
            "sub": "user-1",
            "email": "alice@example.com",
            "exp": exp,
            "iss": "https://issuer.test",
            "aud": "account",
        });
        let token = encode(
            &Header::new(Algorithm::HS384),
            &claims,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();

        assert!(verifier().verify(&token).await.is_err());
    }

    #[tokio::test]
    async fn from_config_requires_a_jwks_url() {
        let config = crate::config::IdentityConfig::default();
        let err = JwtVerifier::from_config(&config).await.err().unwrap();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn refresh_interval_respects_rate() {
        assert_eq!(refresh_interval(5), Duration::from_secs(12));
        assert_eq!(refresh_interval(0), Duration::from_secs(60));
    }
}
