//! Request host for wired controllers
//!
//! The host owns every [`WiredController`] and is installed as the axum
//! fallback handler. Each request body is buffered once, then offered to the
//! controllers in mount order; the first one whose base path covers the
//! request serves it. Requests no controller claims get a 404.

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::extract::{Request, State};
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::core::error::{AppError, RequestError};
use crate::routing::{WiredController, not_found};

/// Default cap on buffered request bodies
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

/// All wired controllers of an application, in mount order
#[derive(Debug)]
pub struct ControllerHost {
    controllers: Vec<WiredController>,
    body_limit: usize,
}

impl ControllerHost {
    pub fn new(controllers: Vec<WiredController>, body_limit: usize) -> Self {
        Self {
            controllers,
            body_limit,
        }
    }

    pub fn controllers(&self) -> &[WiredController] {
        &self.controllers
    }

    /// Serve one request
    pub async fn dispatch(&self, request: Request) -> Response {
        let (parts, body) = request.into_parts();
        let bytes = match to_bytes(body, self.body_limit).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(error = %e, limit = self.body_limit, "rejected request body");
                return body_error(e.to_string());
            }
        };
        let request = axum::http::Request::from_parts(parts, bytes);

        for controller in &self.controllers {
            if let Some(response) = controller.handle(&request).await {
                return response;
            }
        }

        tracing::debug!(path = request.uri().path(), "no controller for path");
        not_found()
    }

    /// An axum router that hands every request to this host
    pub fn into_router(self) -> Router {
        Router::new()
            .fallback(dispatch)
            .with_state(Arc::new(self))
            .layer(TraceLayer::new_for_http())
    }
}

async fn dispatch(State(host): State<Arc<ControllerHost>>, request: Request<Body>) -> Response {
    host.dispatch(request).await
}

/// Too large or unreadable bodies are a 400
fn body_error(message: String) -> Response {
    AppError::from(RequestError::InvalidBody { message }).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controllers::HealthController;
    use crate::routing::{Controller, Registry, wire};
    use axum::http::{Request as HttpRequest, StatusCode};
    use serde_json::Value;

    fn host(body_limit: usize) -> ControllerHost {
        let mut registry = Registry::new();
        HealthController::declare(&mut registry).unwrap();
        let health = wire(&registry, Arc::new(HealthController), "/").unwrap();
        ControllerHost::new(vec![health], body_limit)
    }

    async fn body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_is_served() {
        let request = HttpRequest::get("/health").body(Body::empty()).unwrap();
        let response = host(DEFAULT_BODY_LIMIT).dispatch(request).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_unclaimed_path_is_404_json() {
        let host = ControllerHost::new(Vec::new(), DEFAULT_BODY_LIMIT);
        let request = HttpRequest::get("/nowhere").body(Body::empty()).unwrap();
        let response = host.dispatch(request).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body(response).await["message"], "Not found");
    }

    #[tokio::test]
    async fn test_router_serves_through_fallback() {
        use tower::ServiceExt;

        let router = host(DEFAULT_BODY_LIMIT).into_router();
        let request = HttpRequest::get("/health").body(Body::empty()).unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body(response).await["service"], "ctrlkit");
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let request = HttpRequest::post("/health")
            .body(Body::from(vec![b'x'; 64]))
            .unwrap();
        let response = host(16).dispatch(request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
