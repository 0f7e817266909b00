//! HTTP API handlers and routing.

pub mod error;
pub mod gate;
mod health;
pub mod request_context;
mod v1;

use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::state::AppState;
use request_context::{MakeRequestUlid, REQUEST_ID_HEADER};

/// Create the main API router with all routes and middleware.
pub fn create_router(state: AppState, cors_origins: &[String]) -> Router {
    let origins: Vec<HeaderValue> = cors_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
        .allow_origin(AllowOrigin::list(origins));

    let request_id_header = HeaderName::from_static(REQUEST_ID_HEADER);

    Router::new()
        // Health endpoints (no auth required)
        .merge(health::routes())
        .nest("/api/v1", v1::routes(&state))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUlid))
        .with_state(state)
}
