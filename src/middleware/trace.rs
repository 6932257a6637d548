//! Request logging middleware

use async_trait::async_trait;

use crate::core::error::AppError;
use crate::routing::{Flow, Middleware, RequestContext};

/// Log every request that reaches a controller
///
/// Latency is recorded by the HTTP trace layer; this logs the controller-level
/// view: method, path below the base path, and the caller when known.
#[derive(Debug, Clone, Default)]
pub struct RequestLogger;

#[async_trait]
impl Middleware for RequestLogger {
    async fn handle(&self, cx: &mut RequestContext) -> Result<Flow, AppError> {
        tracing::info!(
            method = %cx.method(),
            path = cx.path(),
            user = cx.user_id().unwrap_or("-"),
            "controller request"
        );
        Ok(Flow::Next)
    }

    fn name(&self) -> &str {
        "request_logger"
    }
}
