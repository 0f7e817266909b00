//! Capability gate middleware.
//!
//! One [`PermissionGate`] per protected route, parameterized by the
//! capability it requires. On success the authenticated [`Principal`] is
//! stored in the request extensions for [`RequestContext`] to pick up.
//!
//! [`RequestContext`]: crate::api::request_context::RequestContext

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::{info, warn};

use crate::api::error::ApiError;
use crate::api::request_context::{bearer_token, request_id};
use crate::auth::{Authenticator, Capability, Principal};

#[derive(Clone)]
pub struct PermissionGate {
    authenticator: Authenticator,
    capability: Capability,
}

impl PermissionGate {
    pub fn new(authenticator: Authenticator, capability: Capability) -> Self {
        Self {
            authenticator,
            capability,
        }
    }

    /// Authenticate the token and check the capability.
    pub async fn check(&self, token: Option<&str>) -> Result<Principal, ApiError> {
        let principal = self.authenticator.authenticate(token).await?;
        if !principal.can(self.capability) {
            return Err(ApiError::missing_capability(self.capability));
        }
        Ok(principal)
    }
}

pub async fn enforce(
    State(gate): State<PermissionGate>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let request_id = request_id(request.headers());

    let principal = match gate.check(bearer_token(request.headers())).await {
        Ok(principal) => principal,
        Err(e) => {
            if e.status == axum::http::StatusCode::FORBIDDEN {
                warn!(
                    request_id = %request_id,
                    capability = %gate.capability,
                    "Caller lacks required capability"
                );
            } else {
                info!(request_id = %request_id, code = %e.problem.code, "Request not authenticated");
            }
            return Err(e.with_request_id(request_id));
        }
    };

    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{DevIdentityProvider, PermissionPolicy};
    use axum::http::StatusCode;
    use rstest::rstest;
    use std::sync::Arc;

    fn gate(capability: Capability) -> PermissionGate {
        PermissionGate::new(
            Authenticator::new(
                Arc::new(DevIdentityProvider),
                PermissionPolicy::new("weedme.ca", ["boss@weedme.ca"]),
            ),
            capability,
        )
    }

    #[rstest]
    #[case(Capability::Read, "user:someone@gmail.com", None)]
    #[case(Capability::Write, "user:someone@gmail.com", Some(StatusCode::FORBIDDEN))]
    #[case(Capability::Delete, "user:staff@weedme.ca", None)]
    #[case(Capability::Approve, "user:staff@weedme.ca", Some(StatusCode::FORBIDDEN))]
    #[case(Capability::Approve, "user:boss@weedme.ca", None)]
    #[case(Capability::Admin, "user:boss@weedme.ca", None)]
    #[case(Capability::Read, "garbage", Some(StatusCode::UNAUTHORIZED))]
    #[tokio::test]
    async fn test_gate_decisions(
        #[case] capability: Capability,
        #[case] token: &str,
        #[case] rejected: Option<StatusCode>,
    ) {
        let result = gate(capability).check(Some(token)).await;
        assert_eq!(result.err().map(|e| e.status), rejected);
    }

    #[tokio::test]
    async fn test_missing_token_is_unauthorized() {
        let err = gate(Capability::Read).check(None).await.unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
        assert_eq!(err.problem.code, "unauthenticated");
    }

    #[tokio::test]
    async fn test_forbidden_names_capability() {
        let err = gate(Capability::Delete)
            .check(Some("user:someone@gmail.com"))
            .await
            .unwrap_err();
        assert!(err.problem.detail.contains("delete"));
    }
}
