//! Gateway-asserted scope authorization.
//!
//! This service sits behind an API gateway that has already authenticated the
//! caller and written the caller's scopes into `X-Authenticated-Scope`. The
//! header is trusted as-is: no token is decoded and no identity provider is
//! contacted here. The only decision made is whether the required scope is
//! among the asserted ones. Do not add token verification to this layer; that
//! would move the trust boundary away from the gateway.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use crate::config::ScopeConfig;
use crate::error::RequestError;

/// Header the gateway fills with the caller's comma-separated scopes
pub const SCOPE_HEADER: &str = "X-Authenticated-Scope";

/// Health-check path, never gated
pub const PING_PATH: &str = "/ping";

/// Scopes asserted for a single request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationContext {
    pub raw_scope_header: String,
    pub scopes: Vec<String>,
}

impl AuthorizationContext {
    /// Read the scope header. Only a missing or blank header counts as no
    /// authorization information; the value is read byte for byte, so a
    /// non-ASCII entry never hides the other scopes.
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, RequestError> {
        let raw = headers
            .get(SCOPE_HEADER)
            .map(|value| String::from_utf8_lossy(value.as_bytes()))
            .unwrap_or_default();

        if raw.trim().is_empty() {
            return Err(RequestError::UnauthorizedRequest);
        }

        Ok(Self::parse(&raw))
    }

    /// Split on ',' without trimming entries: " bim:read" is not "bim:read"
    pub fn parse(raw: &str) -> Self {
        Self {
            raw_scope_header: raw.to_string(),
            scopes: raw.split(',').map(str::to_string).collect(),
        }
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }
}

/// Middleware admitting only requests whose asserted scopes contain the
/// configured one. On success the request is forwarded untouched.
pub async fn authorization_check(
    State(scope): State<Arc<ScopeConfig>>,
    request: Request,
    next: Next,
) -> Result<Response, RequestError> {
    tracing::debug!(
        middleware = true,
        title = "AuthorizationCheck",
        path = %request.uri().path(),
        "Checking the incoming request for authorization information set by the gateway"
    );

    if request.uri().path() == PING_PATH {
        return Ok(next.run(request).await);
    }

    let context = AuthorizationContext::from_headers(request.headers()).map_err(|e| {
        tracing::warn!(
            middleware = true,
            title = "AuthorizationCheck",
            "Unauthorized request detected. The required header had no content or was not set"
        );
        e
    })?;

    if !context.has_scope(&scope.value) {
        tracing::error!(
            middleware = true,
            title = "AuthorizationCheck",
            scopes = %context.raw_scope_header,
            required_scope = %scope.value,
            "Request rejected. The user is missing the scope needed for accessing this service"
        );
        return Err(RequestError::MissingScope);
    }

    Ok(next.run(request).await)
}
