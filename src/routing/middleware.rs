//! Middleware pipeline
//!
//! A middleware inspects or modifies the [`RequestContext`] and then either
//! lets the request continue ([`Flow::Next`]), answers it itself
//! ([`Flow::Halt`]), or fails (`Err`), in which case the controller's error
//! handler takes over.

use async_trait::async_trait;
use axum::response::Response;
use std::sync::Arc;

use super::context::RequestContext;
use crate::core::error::AppError;

/// What a middleware decided to do with the request
#[derive(Debug)]
pub enum Flow {
    /// Hand the request to the next step
    Next,
    /// Stop here; this response is sent as is
    Halt(Response),
}

/// A pipeline step
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(&self, cx: &mut RequestContext) -> Result<Flow, AppError>;

    /// Name used in logs
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Middleware built from a synchronous closure, see [`from_fn`]
pub struct FnMiddleware<F> {
    f: F,
}

/// Wrap a closure as a middleware
///
/// ```rust,ignore
/// let deny_all = from_fn(|_cx| Ok(Flow::Halt(StatusCode::FORBIDDEN.into_response())));
/// ```
pub fn from_fn<F>(f: F) -> FnMiddleware<F>
where
    F: Fn(&mut RequestContext) -> Result<Flow, AppError> + Send + Sync,
{
    FnMiddleware { f }
}

#[async_trait]
impl<F> Middleware for FnMiddleware<F>
where
    F: Fn(&mut RequestContext) -> Result<Flow, AppError> + Send + Sync,
{
    async fn handle(&self, cx: &mut RequestContext) -> Result<Flow, AppError> {
        (self.f)(cx)
    }

    fn name(&self) -> &str {
        "fn"
    }
}

/// Run `chain` in order
///
/// Returns `Some(response)` when a middleware halted the request, `None` when
/// every step let it through.
pub async fn run_pipeline(
    chain: &[Arc<dyn Middleware>],
    cx: &mut RequestContext,
) -> Result<Option<Response>, AppError> {
    for middleware in chain {
        match middleware.handle(cx).await? {
            Flow::Next => {}
            Flow::Halt(response) => {
                tracing::debug!(
                    middleware = middleware.name(),
                    status = %response.status(),
                    "request halted by middleware"
                );
                return Ok(Some(response));
            }
        }
    }
    Ok(None)
}
