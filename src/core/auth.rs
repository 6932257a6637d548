//! Authentication collaborator
//!
//! The routing core never looks at credentials. An [`AuthProvider`] turns
//! request headers into a [`Session`] (or nothing), and the
//! [`RequireSession`](crate::middleware::RequireSession) middleware stores it
//! on the request context or answers 401.

use anyhow::Result;
use async_trait::async_trait;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use serde::Serialize;
use std::collections::HashMap;

/// The authenticated caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub user_id: String,
}

impl Session {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }
}

/// Trait for auth providers
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Resolve the caller from the request headers
    ///
    /// `Ok(None)` means the request carries no valid credentials. `Err` is
    /// reserved for provider failures (unreachable identity service, ...).
    async fn authenticate(&self, headers: &HeaderMap) -> Result<Option<Session>>;
}

/// Token in an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Provider backed by a fixed token -> user id table
///
/// Meant for development and tests; tokens come from the `auth.tokens`
/// configuration section.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenAuth {
    tokens: HashMap<String, String>,
}

impl StaticTokenAuth {
    pub fn new(tokens: HashMap<String, String>) -> Self {
        Self { tokens }
    }

    /// Accept `token` as `user_id`
    pub fn with_token(mut self, token: impl Into<String>, user_id: impl Into<String>) -> Self {
        self.tokens.insert(token.into(), user_id.into());
        self
    }
}

#[async_trait]
impl AuthProvider for StaticTokenAuth {
    async fn authenticate(&self, headers: &HeaderMap) -> Result<Option<Session>> {
        Ok(bearer_token(headers)
            .and_then(|token| self.tokens.get(token))
            .map(Session::new))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(authorization: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(authorization).unwrap());
        headers
    }

    #[test]
    fn test_bearer_token_extraction() {
        assert_eq!(bearer_token(&headers("Bearer abc")), Some("abc"));
        assert_eq!(bearer_token(&headers("bearer abc")), Some("abc"));
        assert_eq!(bearer_token(&headers("Basic abc")), None);
        assert_eq!(bearer_token(&headers("Bearer ")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[tokio::test]
    async fn test_static_tokens() {
        let auth = StaticTokenAuth::default().with_token("alice-token", "alice");

        let session = auth.authenticate(&headers("Bearer alice-token")).await.unwrap();
        assert_eq!(session, Some(Session::new("alice")));

        let session = auth.authenticate(&headers("Bearer nope")).await.unwrap();
        assert_eq!(session, None);
    }
}
