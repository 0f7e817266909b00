//! Identity provider seam.

use async_trait::async_trait;
use thiserror::Error;

/// Claims extracted from a verified bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub subject_id: String,
    pub email: String,
    pub name: Option<String>,
}

/// Reasons an identity provider refuses a token.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("token has expired")]
    Expired,

    #[error("token is invalid: {0}")]
    Invalid(String),

    /// The provider could not complete verification (network, key fetch, ...).
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

/// Verifies bearer tokens issued by an external identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn verify_token(&self, token: &str) -> Result<VerifiedIdentity, VerifyError>;
}
