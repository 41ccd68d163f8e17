//! Session resolution for portal requests.
//!
//! The portal's session machinery is an external collaborator; this
//! module is the seam it plugs into. Production uses a static bearer
//! token table from configuration; tests inject their own resolver.

use std::collections::HashMap;

use async_trait::async_trait;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;

use super::error::PortalError;

/// Resolves a bearer session token to a portal user id.
#[async_trait]
pub trait SessionResolver: Send + Sync {
    async fn resolve(&self, token: &str) -> Option<String>;
}

/// Token table loaded from configuration at startup.
pub struct StaticTokenResolver {
    tokens: HashMap<String, String>,
}

impl StaticTokenResolver {
    #[must_use]
    pub fn new(tokens: HashMap<String, String>) -> Self {
        Self { tokens }
    }
}

#[async_trait]
impl SessionResolver for StaticTokenResolver {
    async fn resolve(&self, token: &str) -> Option<String> {
        self.tokens.get(token).cloned()
    }
}

/// Authenticates a request, returning the session's user id.
///
/// # Errors
///
/// Returns [`PortalError::Unauthorized`] when the `Authorization` header
/// is missing, is not a bearer token, or names an unknown session.
pub async fn authenticate(
    resolver: &dyn SessionResolver,
    headers: &HeaderMap,
) -> Result<String, PortalError> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token)
        .ok_or(PortalError::Unauthorized)?;

    resolver
        .resolve(token)
        .await
        .ok_or(PortalError::Unauthorized)
}

/// Extracts the token from a `Bearer <token>` header value.
fn bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
