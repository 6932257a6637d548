//! Assembly of the todo application

use axum::Router;
use std::sync::Arc;

use super::builder::ServerBuilder;
use crate::config::AppConfig;
use crate::controllers::{
    AuditConfig, HealthController, REST_KEY, RestConfig, RestController, TagsController,
    TodosController,
};
use crate::core::auth::{AuthProvider, StaticTokenAuth};
use crate::core::error::ConfigError;
use crate::core::repository::Repository;
use crate::core::store::DocumentStore;
use crate::middleware::{EnsureConnected, RequestLogger, RequireSession};

/// Flag set on soft-deleted todos
pub const SOFT_DELETE_FIELD: &str = "deleted";

/// A [`ServerBuilder`] with the todo, tag and health controllers mounted
///
/// Every data route first connects the store, then requires a session from
/// `auth`, then logs the request. Todos and tags are scoped to the user who
/// created them whenever creator stamping is enabled.
pub fn todo_app_builder(
    config: &AppConfig,
    store: Arc<dyn DocumentStore>,
    auth: Arc<dyn AuthProvider>,
) -> Result<ServerBuilder, ConfigError> {
    let audit = AuditConfig::from(&config.audit);
    let mut rest = RestConfig::default()
        .with_audit(audit.clone())
        .with_default_page_size(config.pagination.default_page_size);
    if let (true, Some(creator)) = (audit.enabled, audit.creator_field.as_deref()) {
        rest = rest.with_session_filter(creator);
    }

    let todos = RestController::new(
        Repository::new(store.clone()),
        rest.clone().with_soft_delete(SOFT_DELETE_FIELD),
    );
    let tags = RestController::new(Repository::new(store.clone()), rest);

    let base = config.api.base_path.trim_end_matches('/');
    let builder = ServerBuilder::new()
        .with_body_limit(config.api.body_limit)
        .mount(TodosController::new(todos, tags.clone()), format!("{}/todos", base))?
        .mount(TagsController::new(tags), format!("{}/tags", base))?
        .mount(HealthController, "/")?
        .configure(move |registry| {
            registry
                .controller(REST_KEY)
                .use_middleware(EnsureConnected::new(store))
                .use_middleware(RequireSession::new(auth))
                .use_middleware(RequestLogger);
            Ok(())
        });
    Ok(builder)
}

/// The todo application router, authenticating with the configured tokens
pub fn build_todo_app(
    config: &AppConfig,
    store: Arc<dyn DocumentStore>,
) -> Result<Router, ConfigError> {
    let auth = Arc::new(StaticTokenAuth::new(config.auth.tokens.clone()));
    todo_app_builder(config, store, auth)?.build()
}
