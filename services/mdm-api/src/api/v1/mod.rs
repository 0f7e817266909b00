//! API v1 routes.

pub mod partnerships;
pub mod session;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use serde::Serialize;

use crate::api::gate::{enforce, PermissionGate};
use crate::auth::Capability;
use crate::state::AppState;

/// Success envelope for JSON responses.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn empty(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
        }
    }
}

/// Create API v1 routes. Each route carries the gate for its capability.
pub fn routes(state: &AppState) -> Router<AppState> {
    let require = |capability: Capability| {
        middleware::from_fn_with_state(
            PermissionGate::new(state.authenticator().clone(), capability),
            enforce,
        )
    };

    Router::new()
        .route(
            "/partnerships",
            get(partnerships::list_partnerships).route_layer(require(Capability::Read)),
        )
        .route(
            "/partnerships",
            post(partnerships::create_partnership).route_layer(require(Capability::Write)),
        )
        .route(
            "/partnerships/stats/summary",
            get(partnerships::partnership_stats).route_layer(require(Capability::Read)),
        )
        .route(
            "/partnerships/bulk",
            post(partnerships::bulk_create_partnerships).route_layer(require(Capability::Write)),
        )
        .route(
            "/partnerships/export/csv",
            get(partnerships::export_partnerships_csv).route_layer(require(Capability::Read)),
        )
        .route(
            "/partnerships/{id}",
            get(partnerships::get_partnership).route_layer(require(Capability::Read)),
        )
        .route(
            "/partnerships/{id}",
            put(partnerships::update_partnership).route_layer(require(Capability::Write)),
        )
        .route(
            "/partnerships/{id}",
            delete(partnerships::delete_partnership).route_layer(require(Capability::Delete)),
        )
        .route("/session", get(session::current_session))
        .route(
            "/admin/capabilities",
            get(session::list_capabilities).route_layer(require(Capability::Admin)),
        )
}
