//! Middleware and extractors: bearer session credentials, security headers.

use axum::{
    extract::{FromRequestParts, Request},
    http::{header, request::Parts, HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use banter_common::error::BanterError;
use uuid::Uuid;

/// Session id taken from `Authorization: Bearer <session_id>`.
///
/// Only the shape is checked here. Whether the session exists is up to the handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BearerSession(pub Uuid);

impl<S: Send + Sync> FromRequestParts<S> for BearerSession {
    type Rejection = BanterError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(BanterError::Unauthorized)?;

        let token = value
            .strip_prefix("Bearer ")
            .ok_or(BanterError::Unauthorized)?;

        token
            .trim()
            .parse::<Uuid>()
            .map(BearerSession)
            .map_err(|_| BanterError::Unauthorized)
    }
}

/// Add security headers to every HTTP response.
pub async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let h = response.headers_mut();

    for (name, value) in [
        ("x-content-type-options", "nosniff"),
        ("x-frame-options", "DENY"),
        ("referrer-policy", "no-referrer"),
        ("strict-transport-security", "max-age=63072000; includeSubDomains"),
        ("cache-control", "no-store"),
    ] {
        h.insert(HeaderName::from_static(name), HeaderValue::from_static(value));
    }

    response
}
