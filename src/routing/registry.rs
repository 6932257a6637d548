//! Controller metadata registry
//!
//! The registry records, per controller key, the actions (verb + pattern ->
//! method name), the middlewares (class-scoped or method-scoped) and the
//! error handler declared for it. It is an ordinary value built at startup
//! and handed to [`wire`](super::wire); nothing here is global.
//!
//! Controllers may extend another controller by naming it as their parent.
//! Lookups walk the parent chain, so a child sees its ancestors' actions and
//! middlewares before its own.
//!
//! ```rust,ignore
//! let mut registry = Registry::new();
//! registry
//!     .controller("rest")
//!     .get("/", "list")?
//!     .get("/:id", "get")?;
//! registry
//!     .controller_with_parent("todos", "rest")?
//!     .post("/:id/toggle", "toggle")?;
//! ```

use axum::http::Method;
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use super::middleware::Middleware;
use super::pattern::{IntoPattern, PathPattern};
use crate::core::error::ConfigError;

/// Identifies a controller's route table
pub type ControllerKey = &'static str;

/// HTTP verb an action answers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    /// Any verb
    All,
}

impl Verb {
    /// Whether a request with `method` should reach an action with this verb
    ///
    /// GET actions also answer HEAD; the server drops the body.
    pub fn accepts(&self, method: &Method) -> bool {
        match self {
            Verb::All => true,
            Verb::Get => method == Method::GET || method == Method::HEAD,
            Verb::Post => method == Method::POST,
            Verb::Put => method == Method::PUT,
            Verb::Patch => method == Method::PATCH,
            Verb::Delete => method == Method::DELETE,
            Verb::Head => method == Method::HEAD,
            Verb::Options => method == Method::OPTIONS,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
            Verb::Put => "PUT",
            Verb::Patch => "PATCH",
            Verb::Delete => "DELETE",
            Verb::Head => "HEAD",
            Verb::Options => "OPTIONS",
            Verb::All => "ALL",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One (verb, pattern) -> method mapping
#[derive(Debug, Clone)]
pub struct ActionDescriptor {
    pub controller: ControllerKey,
    pub verb: Verb,
    pub pattern: PathPattern,
    pub method: String,
}

/// A middleware attached to a whole controller or to one of its methods
#[derive(Clone)]
pub struct MiddlewareDescriptor {
    pub controller: ControllerKey,
    /// `None` applies to every route of the controller
    pub method: Option<String>,
    pub handler: Arc<dyn Middleware>,
}

impl MiddlewareDescriptor {
    /// Middleware for every route of `controller`
    pub fn class(controller: ControllerKey, handler: Arc<dyn Middleware>) -> Self {
        Self {
            controller,
            method: None,
            handler,
        }
    }

    /// Middleware for the routes bound to `method`
    pub fn method(
        controller: ControllerKey,
        method: impl Into<String>,
        handler: Arc<dyn Middleware>,
    ) -> Self {
        Self {
            controller,
            method: Some(method.into()),
            handler,
        }
    }
}

impl fmt::Debug for MiddlewareDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareDescriptor")
            .field("controller", &self.controller)
            .field("method", &self.method)
            .field("handler", &self.handler.name())
            .finish()
    }
}

/// The method that receives errors raised while serving a controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorHandlerDescriptor {
    pub controller: ControllerKey,
    pub method: String,
}

/// Marks a controller as declared, with its optional parent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerDescriptor {
    pub key: ControllerKey,
    pub parent: Option<ControllerKey>,
}

/// Route, middleware and error handler declarations for all controllers
#[derive(Default, Clone)]
pub struct Registry {
    controllers: IndexMap<ControllerKey, ControllerDescriptor>,
    actions: HashMap<ControllerKey, Vec<ActionDescriptor>>,
    middlewares: HashMap<ControllerKey, Vec<MiddlewareDescriptor>>,
    error_handlers: HashMap<ControllerKey, ErrorHandlerDescriptor>,
    declared: HashSet<ControllerKey>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a controller with an optional parent
    ///
    /// Declaring the same key again is a no-op as long as the parent matches.
    pub fn add_controller(
        &mut self,
        key: ControllerKey,
        parent: Option<ControllerKey>,
    ) -> Result<(), ConfigError> {
        if let Some(parent) = parent {
            if parent == key || !self.controllers.contains_key(parent) {
                return Err(ConfigError::UnknownParent {
                    controller: key,
                    parent,
                });
            }
        }

        match self.controllers.get(key) {
            Some(existing) if existing.parent != parent => {
                Err(ConfigError::ConflictingParent { controller: key })
            }
            Some(_) => Ok(()),
            None => {
                tracing::debug!(controller = key, parent = ?parent, "declared controller");
                self.controllers
                    .insert(key, ControllerDescriptor { key, parent });
                Ok(())
            }
        }
    }

    /// Register an action
    ///
    /// Fails when the controller already has an action for the same verb and
    /// pattern. Ancestors are not consulted: a child may redeclare a pair its
    /// parent owns.
    pub fn add_action(&mut self, action: ActionDescriptor) -> Result<(), ConfigError> {
        self.ensure_controller(action.controller);
        let actions = self.actions.entry(action.controller).or_default();

        if actions
            .iter()
            .any(|a| a.verb == action.verb && a.pattern.as_str() == action.pattern.as_str())
        {
            return Err(ConfigError::DuplicateRoute {
                controller: action.controller,
                verb: action.verb,
                pattern: action.pattern.as_str().to_string(),
            });
        }

        tracing::debug!(
            controller = action.controller,
            verb = %action.verb,
            pattern = action.pattern.as_str(),
            method = %action.method,
            "registered action"
        );
        actions.push(action);
        Ok(())
    }

    /// Register a middleware; registrations accumulate in order
    pub fn add_middleware(&mut self, middleware: MiddlewareDescriptor) {
        self.ensure_controller(middleware.controller);
        self.middlewares
            .entry(middleware.controller)
            .or_default()
            .push(middleware);
    }

    /// Register the error handler; a later registration replaces an earlier one
    pub fn add_error_handler(&mut self, handler: ErrorHandlerDescriptor) {
        self.ensure_controller(handler.controller);
        self.error_handlers.insert(handler.controller, handler);
    }

    /// Run `declare` the first time `key` is declared, skip it afterwards
    ///
    /// Lets several controllers extend the same parent, and the same
    /// controller be mounted more than once, without redeclaring routes.
    pub fn declare_once(
        &mut self,
        key: ControllerKey,
        declare: impl FnOnce(&mut Registry) -> Result<(), ConfigError>,
    ) -> Result<(), ConfigError> {
        if self.declared.contains(key) {
            return Ok(());
        }
        declare(self)?;
        self.declared.insert(key);
        Ok(())
    }

    /// Whether `key` has been declared
    pub fn has_controller(&self, key: ControllerKey) -> bool {
        self.controllers.contains_key(key)
    }

    /// `key` and its ancestors, root first
    pub fn lineage(&self, key: ControllerKey) -> Vec<ControllerKey> {
        let mut chain = vec![key];
        let mut current = key;
        while let Some(parent) = self.controllers.get(current).and_then(|c| c.parent) {
            chain.push(parent);
            current = parent;
        }
        chain.reverse();
        chain
    }

    /// Controller descriptors along the lineage of `key`, root first
    pub fn controllers(&self, key: ControllerKey) -> Vec<&ControllerDescriptor> {
        self.lineage(key)
            .into_iter()
            .filter_map(|k| self.controllers.get(k))
            .collect()
    }

    /// Actions visible to `key`: inherited ones first, in declaration order
    pub fn actions(&self, key: ControllerKey) -> Vec<&ActionDescriptor> {
        self.lineage(key)
            .into_iter()
            .filter_map(|k| self.actions.get(k))
            .flatten()
            .collect()
    }

    /// Middlewares visible to `key`: inherited ones first, in declaration order
    pub fn middlewares(&self, key: ControllerKey) -> Vec<&MiddlewareDescriptor> {
        self.lineage(key)
            .into_iter()
            .filter_map(|k| self.middlewares.get(k))
            .flatten()
            .collect()
    }

    /// The nearest error handler: the controller's own, else an ancestor's
    pub fn error_handler(&self, key: ControllerKey) -> Option<&ErrorHandlerDescriptor> {
        self.lineage(key)
            .into_iter()
            .rev()
            .find_map(|k| self.error_handlers.get(k))
    }

    /// Start declaring a controller without a parent
    pub fn controller(&mut self, key: ControllerKey) -> ControllerDecl<'_> {
        self.ensure_controller(key);
        ControllerDecl {
            registry: self,
            key,
        }
    }

    /// Start declaring a controller that extends `parent`
    pub fn controller_with_parent(
        &mut self,
        key: ControllerKey,
        parent: ControllerKey,
    ) -> Result<ControllerDecl<'_>, ConfigError> {
        self.add_controller(key, Some(parent))?;
        Ok(ControllerDecl {
            registry: self,
            key,
        })
    }

    fn ensure_controller(&mut self, key: ControllerKey) {
        self.controllers
            .entry(key)
            .or_insert(ControllerDescriptor { key, parent: None });
    }
}

/// Fluent builder for one controller's declarations
pub struct ControllerDecl<'r> {
    registry: &'r mut Registry,
    key: ControllerKey,
}

impl ControllerDecl<'_> {
    pub fn key(&self) -> ControllerKey {
        self.key
    }

    /// Map `verb` + `pattern` to `method`
    pub fn action(
        &mut self,
        verb: Verb,
        pattern: impl IntoPattern,
        method: impl Into<String>,
    ) -> Result<&mut Self, ConfigError> {
        let pattern = pattern.into_pattern()?;
        self.registry.add_action(ActionDescriptor {
            controller: self.key,
            verb,
            pattern,
            method: method.into(),
        })?;
        Ok(self)
    }

    pub fn get(
        &mut self,
        pattern: impl IntoPattern,
        method: impl Into<String>,
    ) -> Result<&mut Self, ConfigError> {
        self.action(Verb::Get, pattern, method)
    }

    pub fn post(
        &mut self,
        pattern: impl IntoPattern,
        method: impl Into<String>,
    ) -> Result<&mut Self, ConfigError> {
        self.action(Verb::Post, pattern, method)
    }

    pub fn put(
        &mut self,
        pattern: impl IntoPattern,
        method: impl Into<String>,
    ) -> Result<&mut Self, ConfigError> {
        self.action(Verb::Put, pattern, method)
    }

    pub fn patch(
        &mut self,
        pattern: impl IntoPattern,
        method: impl Into<String>,
    ) -> Result<&mut Self, ConfigError> {
        self.action(Verb::Patch, pattern, method)
    }

    pub fn delete(
        &mut self,
        pattern: impl IntoPattern,
        method: impl Into<String>,
    ) -> Result<&mut Self, ConfigError> {
        self.action(Verb::Delete, pattern, method)
    }

    pub fn all(
        &mut self,
        pattern: impl IntoPattern,
        method: impl Into<String>,
    ) -> Result<&mut Self, ConfigError> {
        self.action(Verb::All, pattern, method)
    }

    /// Run `middleware` before every route of this controller
    pub fn use_middleware(&mut self, middleware: impl Middleware + 'static) -> &mut Self {
        self.registry
            .add_middleware(MiddlewareDescriptor::class(self.key, Arc::new(middleware)));
        self
    }

    /// Run `middleware` before the routes bound to `method`
    pub fn use_middleware_for(
        &mut self,
        method: impl Into<String>,
        middleware: impl Middleware + 'static,
    ) -> &mut Self {
        self.registry.add_middleware(MiddlewareDescriptor::method(
            self.key,
            method,
            Arc::new(middleware),
        ));
        self
    }

    /// Send errors raised by this controller to `method`
    pub fn on_error(&mut self, method: impl Into<String>) -> &mut Self {
        self.registry.add_error_handler(ErrorHandlerDescriptor {
            controller: self.key,
            method: method.into(),
        });
        self
    }
}
