//! Health check endpoints.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::state::AppState;

const SERVICE: &str = "mdm-api";

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct HealthResponse {
    /// "ok" or "degraded".
    pub status: String,
    pub service: String,
    pub version: String,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub components: Option<ComponentHealth>,
}

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct ComponentHealth {
    pub warehouse: ComponentStatus,
}

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct ComponentStatus {
    /// "ok" or "unavailable".
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub message: &'static str,
    pub version: &'static str,
    pub status: &'static str,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/livez", get(livez))
}

async fn root() -> impl IntoResponse {
    Json(ServiceInfo {
        message: "Partnership MDM API",
        version: env!("CARGO_PKG_VERSION"),
        status: "running",
    })
}

fn response(status: &str, components: Option<ComponentHealth>) -> HealthResponse {
    HealthResponse {
        status: status.to_string(),
        service: SERVICE.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
        components,
    }
}

/// Liveness; does not check dependencies.
async fn healthz() -> impl IntoResponse {
    Json(response("ok", None))
}

/// Readiness; 503 when the warehouse cannot answer a trivial query.
async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let result = state.warehouse().health_check().await;
    let ok = result.is_ok();

    let components = ComponentHealth {
        warehouse: ComponentStatus {
            status: if ok { "ok" } else { "unavailable" }.to_string(),
            message: result.err().map(|e| e.to_string()),
        },
    };

    if ok {
        (StatusCode::OK, Json(response("ok", Some(components))))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(response("degraded", Some(components))),
        )
    }
}

async fn livez() -> impl IntoResponse {
    StatusCode::OK
}
