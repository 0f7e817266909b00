//! Bearer token authentication.
//!
//! The [`Authenticator`] delegates signature and expiry checks to an
//! [`IdentityProvider`] and turns the verified claims into a [`Principal`]
//! using the [`PermissionPolicy`].

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, warn};

use super::identity::{IdentityProvider, VerifyError};
use super::permissions::{Capability, CapabilitySet, PermissionPolicy, Role};

/// An authenticated caller. Recomputed on every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub subject_id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub role: Role,
    pub capabilities: CapabilitySet,
}

impl Principal {
    /// Whether this principal passes a gate on `capability`.
    pub fn can(&self, capability: Capability) -> bool {
        self.capabilities.allows(capability)
    }
}

/// Authentication failures.
///
/// Messages are deliberately generic; only the kind is distinguished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("authentication failed")]
    Unauthenticated,

    #[error("authentication token has expired")]
    Expired,

    #[error("invalid authentication token")]
    Invalid,
}

/// Authenticates bearer tokens.
#[derive(Clone)]
pub struct Authenticator {
    provider: Arc<dyn IdentityProvider>,
    policy: PermissionPolicy,
}

impl Authenticator {
    pub fn new(provider: Arc<dyn IdentityProvider>, policy: PermissionPolicy) -> Self {
        Self { provider, policy }
    }

    /// Authenticate a bearer token. An absent or blank token is
    /// `Unauthenticated`.
    pub async fn authenticate(&self, token: Option<&str>) -> Result<Principal, AuthError> {
        let token = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::Unauthenticated)?;

        let identity = self.provider.verify_token(token).await.map_err(|e| match e {
            VerifyError::Expired => {
                warn!("Expired ID token provided");
                AuthError::Expired
            }
            VerifyError::Invalid(reason) => {
                warn!(reason = %reason, "Invalid ID token provided");
                AuthError::Invalid
            }
            VerifyError::Unavailable(reason) => {
                error!(reason = %reason, "Identity provider failed to verify token");
                AuthError::Unauthenticated
            }
        })?;

        let (role, capabilities) = self.policy.derive(&identity.email);
        debug!(
            subject_id = %identity.subject_id,
            email = %identity.email,
            role = role.as_str(),
            "User authenticated"
        );

        Ok(Principal {
            subject_id: identity.subject_id,
            email: identity.email,
            display_name: identity.name.filter(|n| !n.is_empty()),
            role,
            capabilities,
        })
    }

    /// Like [`authenticate`](Self::authenticate), but any failure collapses
    /// to `None`.
    pub async fn authenticate_optional(&self, token: Option<&str>) -> Option<Principal> {
        token?;
        self.authenticate(token).await.ok()
    }
}
