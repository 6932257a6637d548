//! Server assembly
//!
//! [`ServerBuilder`] mounts controllers and produces an axum router whose
//! fallback is a [`ControllerHost`]. [`build_todo_app`] wires the todo
//! application on top of it.

pub mod app;
pub mod builder;
pub mod host;

pub use app::{SOFT_DELETE_FIELD, build_todo_app, todo_app_builder};
pub use builder::{ServerBuilder, serve_router};
pub use host::{ControllerHost, DEFAULT_BODY_LIMIT};

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Install the global tracing subscriber
///
/// Filtering follows `RUST_LOG`, `info` when unset. Calling this twice keeps
/// the first subscriber.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let result = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
    if let Err(e) = result {
        tracing::debug!(error = %e, "tracing subscriber already installed");
    }
}
