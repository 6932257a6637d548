//! Session middleware

use async_trait::async_trait;
use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use std::sync::Arc;

use crate::core::auth::AuthProvider;
use crate::core::error::{AppError, ErrorResponse};
use crate::routing::{Flow, Middleware, RequestContext};

/// Attach the caller's session, or answer 401
pub struct RequireSession {
    provider: Arc<dyn AuthProvider>,
}

impl RequireSession {
    pub fn new(provider: Arc<dyn AuthProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Middleware for RequireSession {
    async fn handle(&self, cx: &mut RequestContext) -> Result<Flow, AppError> {
        let session = self
            .provider
            .authenticate(cx.headers())
            .await
            .map_err(|e| AppError::internal(format!("auth provider failed: {:#}", e)))?;

        match session {
            Some(session) => {
                cx.set_session(session);
                Ok(Flow::Next)
            }
            None => {
                tracing::debug!(path = cx.path(), "rejecting request without a valid session");
                Ok(Flow::Halt(
                    (
                        StatusCode::UNAUTHORIZED,
                        Json(ErrorResponse {
                            message: "Unauthorized".to_string(),
                        }),
                    )
                        .into_response(),
                ))
            }
        }
    }

    fn name(&self) -> &str {
        "require_session"
    }
}
