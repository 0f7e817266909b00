//! Request-scoped context extracted from HTTP requests.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue, Request};
use tower_http::request_id::{MakeRequestId, RequestId};
use ulid::Ulid;

use crate::api::error::ApiError;
use crate::auth::Principal;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Generates `req_<ulid>` request ids for requests that arrive without one.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUlid;

impl MakeRequestId for MakeRequestUlid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = format!("req_{}", Ulid::new().to_string().to_lowercase());
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

pub fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| format!("req_{}", Ulid::new().to_string().to_lowercase()))
}

/// The bearer token from the `Authorization` header, if any.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?.trim();
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    Some(token.trim()).filter(|t| !t.is_empty())
}

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    /// Set when the route sits behind a permission gate.
    pub principal: Option<Principal>,
}

impl RequestContext {
    /// The gated caller. Fails with 401 on routes without a gate.
    pub fn principal(&self) -> Result<&Principal, ApiError> {
        self.principal.as_ref().ok_or_else(|| {
            ApiError::unauthorized("unauthenticated", "authentication failed")
                .with_request_id(self.request_id.clone())
        })
    }
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self {
            request_id: request_id(&parts.headers),
            principal: parts.extensions.get::<Principal>().cloned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::AUTHORIZATION;
    use rstest::rstest;

    fn headers(auth: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(auth).unwrap());
        headers
    }

    #[rstest]
    #[case("Bearer abc.def", Some("abc.def"))]
    #[case("bearer   abc ", Some("abc"))]
    #[case("Bearer ", None)]
    #[case("Basic dXNlcjpwYXNz", None)]
    #[case("abc", None)]
    fn test_bearer_token(#[case] auth: &str, #[case] expected: Option<&str>) {
        assert_eq!(bearer_token(&headers(auth)), expected);
    }

    #[test]
    fn test_request_id_prefers_header() {
        let mut map = HeaderMap::new();
        map.insert(REQUEST_ID_HEADER, HeaderValue::from_static("req_fixed"));
        assert_eq!(request_id(&map), "req_fixed");
        assert!(request_id(&HeaderMap::new()).starts_with("req_"));
    }
}
