//! # ctrlkit
//!
//! Controller-based HTTP routing for axum, with a generic paginated
//! repository and a todo API built on both.
//!
//! ## Features
//!
//! - **Declared routes**: controllers list `(verb, pattern) -> method` in a
//!   [`Registry`](routing::Registry), optionally extending a parent controller
//! - **Middleware pipelines**: controller-wide and per-method steps that can
//!   halt a request with their own response
//! - **Uniform errors**: errors and panics go to the nearest declared error
//!   handler, or become `{ "message": ... }` responses
//! - **Generic REST controller**: list/get/create/update/delete with
//!   pagination, audit fields, user scoping and soft delete
//! - **Pluggable storage**: in-memory by default, MongoDB behind the
//!   `mongodb_backend` feature, both transactional
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ctrlkit::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     init_tracing();
//!     let config = AppConfig::default().with_env_overrides();
//!     let store = open_store(&config.database)?;
//!     let app = build_todo_app(&config, store)?;
//!     serve_router(app, &config.server.addr).await
//! }
//! ```

pub mod config;
pub mod controllers;
pub mod core;
pub mod entities;
pub mod middleware;
pub mod routing;
pub mod server;
pub mod storage;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Routing ===
    pub use crate::routing::{
        ActionHandler, Controller, ControllerKey, ErrorHandler, Flow, Middleware, Outcome,
        Registry, RequestContext, RequestInfo, Verb, WiredController, action,
        default_error_handler, error_handler, from_fn, wire,
    };

    // === Core ===
    pub use crate::core::{
        AppError, AuthProvider, ConfigError, Document, DocumentStore, Entity, FindQuery,
        PageResult, PaginationOptions, Repository, Session, Sort, SortOrder, StaticTokenAuth,
        Transaction, finish_transaction,
    };

    // === Controllers ===
    pub use crate::controllers::{
        AuditConfig, HealthController, Resource, RestConfig, RestController, TagsController,
        TodosController,
    };

    // === Middlewares ===
    pub use crate::middleware::{EnsureConnected, RequestLogger, RequireSession};

    // === Storage ===
    pub use crate::storage::{InMemoryStore, LazyConnection, open_store};
    #[cfg(feature = "mongodb_backend")]
    pub use crate::storage::MongoStore;

    // === Config ===
    pub use crate::config::AppConfig;

    // === Server ===
    pub use crate::server::{ServerBuilder, build_todo_app, init_tracing, serve_router};

    // === External dependencies ===
    pub use async_trait::async_trait;
    pub use serde::{Deserialize, Serialize};
}
