//! ServerBuilder for fluent assembly of controller-based servers

use anyhow::Result;
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;

use super::host::{ControllerHost, DEFAULT_BODY_LIMIT};
use crate::core::error::ConfigError;
use crate::routing::{Controller, Registry, WiredController, wire};

type Mount = Box<dyn FnOnce(&Registry) -> Result<WiredController, ConfigError> + Send>;
type Configure = Box<dyn FnOnce(&mut Registry) -> Result<(), ConfigError> + Send>;

/// Builder for a server made of mounted controllers
///
/// Mounting declares the controller's routes right away; wiring waits for
/// [`build`](Self::build), after every `configure` step has run. That lets
/// configuration attach middlewares to a controller declared by a later
/// mount, such as the shared `rest` parent.
///
/// # Example
///
/// ```ignore
/// let app = ServerBuilder::new()
///     .mount(TodosController::new(todos, tags), "/api/todos")?
///     .mount(HealthController, "/")?
///     .configure(|registry| {
///         registry.controller("rest").use_middleware(RequestLogger);
///         Ok(())
///     })
///     .build()?;
/// ```
pub struct ServerBuilder {
    registry: Registry,
    mounts: Vec<Mount>,
    configure: Vec<Configure>,
    body_limit: usize,
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
            mounts: Vec::new(),
            configure: Vec::new(),
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    /// Serve `controller` under `base_path`
    ///
    /// Controllers are tried in mount order, so a controller mounted at `/`
    /// should come last.
    pub fn mount<C: Controller>(
        mut self,
        controller: C,
        base_path: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        C::declare(&mut self.registry)?;
        let controller = Arc::new(controller);
        let base_path = base_path.into();
        self.mounts
            .push(Box::new(move |registry| wire(registry, controller, &base_path)));
        Ok(self)
    }

    /// Adjust the registry once every controller has been declared
    pub fn configure(
        mut self,
        configure: impl FnOnce(&mut Registry) -> Result<(), ConfigError> + Send + 'static,
    ) -> Self {
        self.configure.push(Box::new(configure));
        self
    }

    /// Cap on buffered request bodies, in bytes
    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    /// Wire every mounted controller
    pub fn build_host(mut self) -> Result<ControllerHost, ConfigError> {
        for configure in self.configure {
            configure(&mut self.registry)?;
        }

        let controllers = self
            .mounts
            .into_iter()
            .map(|mount| mount(&self.registry))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ControllerHost::new(controllers, self.body_limit))
    }

    /// Build the final router
    pub fn build(self) -> Result<Router, ConfigError> {
        Ok(self.build_host()?.into_router())
    }

    /// Serve the application with graceful shutdown
    ///
    /// Binds `addr`, serves until SIGTERM or Ctrl+C, then drains in-flight
    /// requests.
    pub async fn serve(self, addr: &str) -> Result<()> {
        let app = self.build()?;
        serve_router(app, addr).await
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Serve an already built router with graceful shutdown
pub async fn serve_router(app: Router, addr: &str) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, initiating graceful shutdown...");
        },
    }
}
