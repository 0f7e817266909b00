//! Firebase ID token verification.
//!
//! Tokens are RS256 JWTs signed with keys published in Google's securetoken
//! JWKS. The key set is fetched lazily, cached, and refreshed when a token
//! names an unknown `kid` and the cache is older than the refresh TTL.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::jwk::{Jwk, JwkSet};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::identity::{IdentityProvider, VerifiedIdentity, VerifyError};

/// Google's published signing keys for Firebase ID tokens.
pub const DEFAULT_JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";

/// Firebase verifier configuration.
#[derive(Debug, Clone)]
pub struct FirebaseConfig {
    /// Firebase project id; the expected `aud`.
    pub project_id: String,
    pub jwks_url: String,
    /// Inline JWKS document used instead of `jwks_url` when set.
    pub jwks_json: Option<String>,
    pub jwks_timeout: Duration,
    pub jwks_refresh_ttl: Duration,
    /// Allowed clock skew when checking `exp`.
    pub leeway: Duration,
}

impl FirebaseConfig {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            jwks_url: DEFAULT_JWKS_URL.to_string(),
            jwks_json: None,
            jwks_timeout: Duration::from_secs(5),
            jwks_refresh_ttl: Duration::from_secs(300),
            leeway: Duration::from_secs(60),
        }
    }

    /// `https://securetoken.google.com/<project_id>`
    pub fn issuer(&self) -> String {
        format!("https://securetoken.google.com/{}", self.project_id)
    }
}

#[derive(Debug, Deserialize)]
struct FirebaseClaims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Default)]
struct JwksCache {
    keys: Option<JwkSet>,
    fetched_at: Option<Instant>,
}

impl JwksCache {
    fn find(&self, kid: &str) -> Option<&Jwk> {
        self.keys.as_ref()?.find(kid)
    }

    fn is_stale(&self, ttl: Duration) -> bool {
        self.fetched_at.map(|t| t.elapsed() > ttl).unwrap_or(true)
    }
}

/// Verifies Firebase ID tokens.
#[derive(Clone)]
pub struct FirebaseTokenVerifier {
    config: Arc<FirebaseConfig>,
    http: reqwest::Client,
    jwks: Arc<RwLock<JwksCache>>,
}

impl FirebaseTokenVerifier {
    pub fn new(config: FirebaseConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(config.jwks_timeout)
            .build()?;

        Ok(Self {
            config: Arc::new(config),
            http,
            jwks: Arc::new(RwLock::new(JwksCache::default())),
        })
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[self.config.issuer()]);
        validation.set_audience(std::slice::from_ref(&self.config.project_id));
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.leeway = self.config.leeway.as_secs();
        validation
    }

    async fn decoding_key_for_kid(&self, kid: &str) -> Result<DecodingKey, VerifyError> {
        {
            let cache = self.jwks.read().await;
            if let Some(jwk) = cache.find(kid) {
                return decoding_key(jwk);
            }
        }

        let mut cache = self.jwks.write().await;
        if cache.is_stale(self.config.jwks_refresh_ttl) {
            cache.keys = Some(self.fetch_jwks().await?);
            cache.fetched_at = Some(Instant::now());
            debug!("Refreshed Firebase signing keys");
        }

        match cache.find(kid) {
            Some(jwk) => decoding_key(jwk),
            None => Err(VerifyError::Invalid(format!("unknown signing key id {kid}"))),
        }
    }

    async fn fetch_jwks(&self) -> Result<JwkSet, VerifyError> {
        if let Some(json) = &self.config.jwks_json {
            return serde_json::from_str(json)
                .map_err(|e| VerifyError::Unavailable(format!("inline JWKS is not valid: {e}")));
        }

        self.http
            .get(&self.config.jwks_url)
            .send()
            .await
            .map_err(|e| VerifyError::Unavailable(format!("failed to fetch JWKS: {e}")))?
            .error_for_status()
            .map_err(|e| VerifyError::Unavailable(format!("JWKS endpoint error: {e}")))?
            .json::<JwkSet>()
            .await
            .map_err(|e| VerifyError::Unavailable(format!("failed to parse JWKS: {e}")))
    }
}

fn decoding_key(jwk: &Jwk) -> Result<DecodingKey, VerifyError> {
    DecodingKey::from_jwk(jwk)
        .map_err(|e| VerifyError::Unavailable(format!("unusable signing key: {e}")))
}

#[async_trait]
impl IdentityProvider for FirebaseTokenVerifier {
    async fn verify_token(&self, token: &str) -> Result<VerifiedIdentity, VerifyError> {
        let header =
            decode_header(token).map_err(|e| VerifyError::Invalid(format!("bad header: {e}")))?;

        if header.alg != Algorithm::RS256 {
            return Err(VerifyError::Invalid(format!(
                "unsupported algorithm {:?}",
                header.alg
            )));
        }

        let kid = header
            .kid
            .ok_or_else(|| VerifyError::Invalid("token header has no kid".to_string()))?;

        let key = self.decoding_key_for_kid(&kid).await?;

        let decoded = decode::<FirebaseClaims>(token, &key, &self.validation()).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => VerifyError::Expired,
                _ => VerifyError::Invalid(e.to_string()),
            }
        })?;

        let claims = decoded.claims;
        if claims.sub.is_empty() {
            return Err(VerifyError::Invalid("empty subject".to_string()));
        }
        if claims.email.is_none() {
            warn!(subject_id = %claims.sub, "ID token carries no email claim");
        }

        Ok(VerifiedIdentity {
            subject_id: claims.sub,
            email: claims.email.unwrap_or_default(),
            name: claims.name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issuer_uses_project_id() {
        let config = FirebaseConfig::new("mdm-prod");
        assert_eq!(config.issuer(), "https://securetoken.google.com/mdm-prod");
        assert_eq!(config.jwks_url, DEFAULT_JWKS_URL);
    }

    #[tokio::test]
    async fn test_garbage_token_is_invalid() {
        let verifier = FirebaseTokenVerifier::new(FirebaseConfig::new("mdm-prod")).unwrap();
        let err = verifier.verify_token("not.a.jwt").await.unwrap_err();
        assert!(matches!(err, VerifyError::Invalid(_)));
    }

    #[tokio::test]
    async fn test_unreachable_jwks_is_unavailable() {
        let mut config = FirebaseConfig::new("mdm-prod");
        config.jwks_url = "http://127.0.0.1:1/jwks".to_string();
        let verifier = FirebaseTokenVerifier::new(config).unwrap();

        // Header: {"alg":"RS256","kid":"k1","typ":"JWT"}
        let token = "eyJhbGciOiJSUzI1NiIsImtpZCI6ImsxIiwidHlwIjoiSldUIn0.e30.c2ln";
        let err = verifier.verify_token(token).await.unwrap_err();
        assert!(matches!(err, VerifyError::Unavailable(_)), "got {err:?}");
    }
}
