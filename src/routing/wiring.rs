//! Controller wiring and per-request dispatch
//!
//! [`wire`] reads a controller's declarations from the [`Registry`], binds
//! every declared method name to a handler on the controller instance and
//! returns a [`WiredController`]. Binding failures surface here, at startup,
//! never while serving.
//!
//! Per request, a wired controller:
//!
//! 1. ignores the request unless its path is under the base path,
//! 2. runs the controller-wide middlewares,
//! 3. picks the first route (registration order) whose verb and pattern
//!    match the path below the base path,
//! 4. runs that route's middlewares, then its handler,
//! 5. renders the handler's [`Outcome`].
//!
//! No matching route is a 404 `{ "message": ... }`. Errors and panics from
//! any step go to the controller's error handler, or to the default one,
//! which logs and maps the error with [`AppError::into_response`].

use axum::Json;
use axum::body::Bytes;
use axum::http::{Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use futures::FutureExt;
use futures::future::BoxFuture;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use super::context::RequestContext;
use super::middleware::{Middleware, run_pipeline};
use super::pattern::PathPattern;
use super::registry::{ControllerKey, Registry, Verb};
use super::render::{Outcome, render};
use crate::core::error::{AppError, ConfigError, ErrorResponse};

/// A bound controller method
pub type ActionHandler =
    Arc<dyn Fn(RequestContext) -> BoxFuture<'static, Result<Outcome, AppError>> + Send + Sync>;

/// A bound error handling method
pub type ErrorHandler =
    Arc<dyn Fn(AppError, RequestInfo) -> BoxFuture<'static, Outcome> + Send + Sync>;

/// What an error handler knows about the failed request
#[derive(Debug, Clone)]
pub struct RequestInfo {
    pub controller: ControllerKey,
    pub method: Method,
    /// Path relative to the base path
    pub path: String,
}

/// Bind an async method of `controller` as an action handler
///
/// ```rust,ignore
/// "toggle" => Some(action(&self, |c, cx| async move { c.toggle(cx).await })),
/// ```
pub fn action<C, F, Fut>(controller: &Arc<C>, f: F) -> ActionHandler
where
    C: Send + Sync + 'static,
    F: Fn(Arc<C>, RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Outcome, AppError>> + Send + 'static,
{
    let controller = controller.clone();
    Arc::new(move |cx| f(controller.clone(), cx).boxed())
}

/// Bind an async method of `controller` as an error handler
pub fn error_handler<C, F, Fut>(controller: &Arc<C>, f: F) -> ErrorHandler
where
    C: Send + Sync + 'static,
    F: Fn(Arc<C>, AppError, RequestInfo) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Outcome> + Send + 'static,
{
    let controller = controller.clone();
    Arc::new(move |err, info| f(controller.clone(), err, info).boxed())
}

/// A type whose methods serve routes
///
/// `declare` records the routes (and optionally middlewares and an error
/// handler) under [`Controller::KEY`]; `bind` resolves the method names used
/// there to handlers on an instance.
pub trait Controller: Send + Sync + 'static {
    /// Registry key of this controller's declarations
    const KEY: ControllerKey;

    /// Record this controller's declarations, and its parent's
    ///
    /// Must tolerate being called more than once; use
    /// [`Registry::declare_once`].
    fn declare(registry: &mut Registry) -> Result<(), ConfigError>;

    /// Handler for a declared action method
    fn bind(self: Arc<Self>, method: &str) -> Option<ActionHandler>;

    /// Handler for a declared error handler method
    fn bind_error_handler(self: Arc<Self>, _method: &str) -> Option<ErrorHandler> {
        None
    }
}

/// One resolved route
struct CompiledRoute {
    verb: Verb,
    pattern: PathPattern,
    method: String,
    handler: ActionHandler,
    middlewares: Vec<Arc<dyn Middleware>>,
}

/// A controller ready to serve requests under its base path
pub struct WiredController {
    key: ControllerKey,
    base_path: String,
    common: Vec<Arc<dyn Middleware>>,
    routes: Vec<CompiledRoute>,
    error_handler: Option<ErrorHandler>,
}

impl std::fmt::Debug for WiredController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WiredController")
            .field("key", &self.key)
            .field("base_path", &self.base_path)
            .field("routes", &self.routes().collect::<Vec<_>>())
            .finish()
    }
}

/// Resolve `controller`'s declarations into a request handler
pub fn wire<C: Controller>(
    registry: &Registry,
    controller: Arc<C>,
    base_path: &str,
) -> Result<WiredController, ConfigError> {
    let middlewares = registry.middlewares(C::KEY);
    let common: Vec<Arc<dyn Middleware>> = middlewares
        .iter()
        .filter(|m| m.method.is_none())
        .map(|m| m.handler.clone())
        .collect();

    let mut routes = Vec::new();
    for descriptor in registry.actions(C::KEY) {
        let handler = controller
            .clone()
            .bind(&descriptor.method)
            .ok_or_else(|| ConfigError::MissingMethod {
                controller: C::KEY,
                method: descriptor.method.clone(),
            })?;

        let route_middlewares = middlewares
            .iter()
            .filter(|m| m.method.as_deref() == Some(descriptor.method.as_str()))
            .map(|m| m.handler.clone())
            .collect();

        routes.push(CompiledRoute {
            verb: descriptor.verb,
            pattern: descriptor.pattern.clone(),
            method: descriptor.method.clone(),
            handler,
            middlewares: route_middlewares,
        });
    }

    let error_handler = match registry.error_handler(C::KEY) {
        Some(descriptor) => Some(
            controller
                .clone()
                .bind_error_handler(&descriptor.method)
                .ok_or_else(|| ConfigError::MissingMethod {
                    controller: C::KEY,
                    method: descriptor.method.clone(),
                })?,
        ),
        None => None,
    };

    let base_path = normalize_base_path(base_path);
    tracing::info!(
        controller = C::KEY,
        base_path = %base_path,
        routes = routes.len(),
        middlewares = common.len(),
        "wired controller"
    );

    Ok(WiredController {
        key: C::KEY,
        base_path,
        common,
        routes,
        error_handler,
    })
}

/// Leading slash, no trailing slash (except for the root)
fn normalize_base_path(base_path: &str) -> String {
    let trimmed = base_path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

impl WiredController {
    pub fn key(&self) -> ControllerKey {
        self.key
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// (verb, pattern, method) of each route, in matching order
    pub fn routes(&self) -> impl Iterator<Item = (Verb, &str, &str)> {
        self.routes
            .iter()
            .map(|r| (r.verb, r.pattern.as_str(), r.method.as_str()))
    }

    /// The path below the base path, or `None` when `path` is not under it
    pub fn strip_base<'p>(&self, path: &'p str) -> Option<&'p str> {
        if self.base_path == "/" {
            return Some(path);
        }
        let rest = path.strip_prefix(self.base_path.as_str())?;
        if rest.is_empty() {
            Some("/")
        } else if rest.starts_with('/') {
            Some(rest)
        } else {
            None
        }
    }

    /// Serve `request`, or return `None` when it is not under the base path
    pub async fn handle(&self, request: &Request<Bytes>) -> Option<Response> {
        let path = self.strip_base(request.uri().path())?.to_string();
        Some(self.dispatch(request, path).await)
    }

    async fn dispatch(&self, request: &Request<Bytes>, path: String) -> Response {
        let info = RequestInfo {
            controller: self.key,
            method: request.method().clone(),
            path: path.clone(),
        };
        let cx = RequestContext::new(request, &path);

        let error = match AssertUnwindSafe(self.run(cx)).catch_unwind().await {
            Ok(Ok(response)) => return response,
            Ok(Err(err)) => err,
            Err(panic) => AppError::internal(format!("panicked: {}", panic_message(&*panic))),
        };
        self.handle_error(error, info).await
    }

    async fn run(&self, mut cx: RequestContext) -> Result<Response, AppError> {
        if let Some(response) = run_pipeline(&self.common, &mut cx).await? {
            return Ok(response);
        }

        for route in &self.routes {
            if !route.verb.accepts(cx.method()) {
                continue;
            }
            let Some(params) = route.pattern.matches(cx.path()) else {
                continue;
            };

            tracing::debug!(
                controller = self.key,
                verb = %route.verb,
                pattern = route.pattern.as_str(),
                method = %route.method,
                "route matched"
            );
            cx.set_params(params);

            if let Some(response) = run_pipeline(&route.middlewares, &mut cx).await? {
                return Ok(response);
            }
            let outcome = (route.handler)(cx).await?;
            return Ok(render(outcome));
        }

        tracing::debug!(
            controller = self.key,
            method = %cx.method(),
            path = cx.path(),
            "no route matched"
        );
        Ok(not_found())
    }

    async fn handle_error(&self, error: AppError, info: RequestInfo) -> Response {
        let Some(handler) = &self.error_handler else {
            return default_error_handler(error, &info);
        };

        match AssertUnwindSafe(handler(error, info.clone()))
            .catch_unwind()
            .await
        {
            Ok(outcome) => render(outcome),
            Err(panic) => default_error_handler(
                AppError::internal(format!(
                    "error handler panicked: {}",
                    panic_message(&*panic)
                )),
                &info,
            ),
        }
    }
}

/// Log `error` and map it to its status with a `{ message }` body
pub fn default_error_handler(error: AppError, info: &RequestInfo) -> Response {
    if error.is_server_error() {
        tracing::error!(
            controller = info.controller,
            method = %info.method,
            path = %info.path,
            error = %error,
            "unhandled error"
        );
    } else {
        tracing::warn!(
            controller = info.controller,
            method = %info.method,
            path = %info.path,
            status = %error.status_code(),
            error = %error,
            "request failed"
        );
    }
    error.into_response()
}

/// 404 with a `{ message }` body
pub fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            message: "Not found".to_string(),
        }),
    )
        .into_response()
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
