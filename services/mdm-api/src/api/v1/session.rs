//! Session and capability catalogue endpoints.

use axum::{extract::State, http::HeaderMap, Json};
use serde::Serialize;

use crate::api::request_context::bearer_token;
use crate::auth::{Capability, Principal};
use crate::state::AppState;

use super::ApiResponse;

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal: Option<Principal>,
}

#[derive(Debug, Serialize)]
pub struct CapabilityInfo {
    pub name: Capability,
    pub description: &'static str,
}

/// GET /api/v1/session
///
/// Anonymous callers and callers with a bad token both see
/// `authenticated: false`.
pub async fn current_session(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Json<SessionResponse> {
    let principal = state
        .authenticator()
        .authenticate_optional(bearer_token(&headers))
        .await;

    Json(SessionResponse {
        authenticated: principal.is_some(),
        principal,
    })
}

/// GET /api/v1/admin/capabilities
pub async fn list_capabilities() -> Json<ApiResponse<Vec<CapabilityInfo>>> {
    let capabilities = Capability::ALL
        .into_iter()
        .map(|name| CapabilityInfo {
            name,
            description: name.description(),
        })
        .collect();

    Json(ApiResponse::ok("Capabilities retrieved successfully", capabilities))
}
