//! Controller-based routing
//!
//! Controllers declare their routes, middlewares and error handler in a
//! [`Registry`]; [`wire`] turns a controller instance plus its declarations
//! into a [`WiredController`] that serves requests under a base path.

pub mod context;
pub mod middleware;
pub mod pattern;
pub mod registry;
pub mod render;
pub mod wiring;

pub use context::RequestContext;
pub use middleware::{Flow, FnMiddleware, Middleware, from_fn, run_pipeline};
pub use pattern::{IntoPattern, PathParams, PathPattern};
pub use registry::{
    ActionDescriptor, ControllerDecl, ControllerDescriptor, ControllerKey, ErrorHandlerDescriptor,
    MiddlewareDescriptor, Registry, Verb,
};
pub use render::{Outcome, render};
pub use wiring::{
    ActionHandler, Controller, ErrorHandler, RequestInfo, WiredController, action,
    default_error_handler, error_handler, not_found, wire,
};
