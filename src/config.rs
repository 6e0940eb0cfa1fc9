use serde::{Deserialize, Serialize};

/// Configuration for the token verifier.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IdentityConfig {
    /// JWKS endpoint of the identity provider. When unset, the verifier
    /// must be constructed from a static secret instead.
    #[serde(default)]
    pub jwks_url: Option<String>,
    /// Expected `iss` claim.
    pub issuer: String,
    /// Expected `aud` claim.
    #[serde(default = "default_audience")]
    pub audience: String,
    /// Cap on JWKS fetches per minute when keys rotate.
    #[serde(default = "default_jwks_requests_per_minute")]
    pub jwks_requests_per_minute: u32,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            jwks_url: None,
            issuer: String::new(),
            audience: default_audience(),
            jwks_requests_per_minute: default_jwks_requests_per_minute(),
        }
    }
}

impl IdentityConfig {
    /// Build configuration from `MOORGATE_*` environment variables.
    ///
    /// Reads `MOORGATE_JWKS_URL`, `MOORGATE_ISSUER`, `MOORGATE_AUDIENCE`
    /// and `MOORGATE_JWKS_REQUESTS_PER_MINUTE`. Unset variables fall back
    /// to the defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("MOORGATE_JWKS_URL") {
            config.jwks_url = Some(url);
        }
        if let Ok(issuer) = std::env::var("MOORGATE_ISSUER") {
            config.issuer = issuer;
        }
        if let Ok(audience) = std::env::var("MOORGATE_AUDIENCE") {
            config.audience = audience;
        }
        if let Ok(rpm) = std::env::var("MOORGATE_JWKS_REQUESTS_PER_MINUTE") {
            if let Ok(parsed) = rpm.parse() {
                config.jwks_requests_per_minute = parsed;
            }
        }
        config
    }

    pub fn with_jwks_url(mut self, url: impl Into<String>) -> Self {
        self.jwks_url = Some(url.into());
        self
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = audience.into();
        self
    }
}

fn default_audience() -> String {
    "authenticated".to_string()
}

fn default_jwks_requests_per_minute() -> u32 {
    5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = IdentityConfig::default();
        assert!(config.jwks_url.is_none());
        assert_eq!(config.audience, "authenticated");
        assert_eq!(config.jwks_requests_per_minute, 5);
    }

    #[test]
    fn builder_overrides() {
        let config = IdentityConfig::default()
            .with_jwks_url("https://auth.example.com/jwks")
            .with_issuer("https://auth.example.com")
            .with_audience("account");
        assert_eq!(
            config.jwks_url.as_deref(),
            Some("https://auth.example.com/jwks")
        );
        assert_eq!(config.issuer, "https://auth.example.com");
        assert_eq!(config.audience, "account");
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: IdentityConfig =
            serde_json::from_str(r#"{"issuer":"https://auth.example.com"}"#).unwrap();
        assert_eq!(config.issuer, "https://auth.example.com");
        assert_eq!(config.jwks_requests_per_minute, 5);
    }
}
