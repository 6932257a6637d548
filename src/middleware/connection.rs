//! Database connection middleware

use async_trait::async_trait;
use std::sync::Arc;

use crate::core::error::{AppError, StorageError};
use crate::core::store::DocumentStore;
use crate::routing::{Flow, Middleware, RequestContext};

/// Make sure the store is connected before any data route runs
///
/// The store memoizes its connection, so this costs one check per request
/// once connected. A failed connection is an unhandled error (500).
pub struct EnsureConnected {
    store: Arc<dyn DocumentStore>,
}

impl EnsureConnected {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Middleware for EnsureConnected {
    async fn handle(&self, _cx: &mut RequestContext) -> Result<Flow, AppError> {
        self.store.connect().await.map_err(|e| StorageError::Connection {
            message: format!("{} backend: {:#}", self.store.backend(), e),
        })?;
        Ok(Flow::Next)
    }

    fn name(&self) -> &str {
        "ensure_connected"
    }
}
