//! Liveness endpoint

use serde_json::json;
use std::sync::Arc;

use crate::core::error::{AppError, ConfigError};
use crate::routing::{
    ActionHandler, Controller, ControllerKey, Outcome, Registry, RequestContext, action,
};

/// Answers `GET /health`; mounted at base path `/`
#[derive(Debug, Default)]
pub struct HealthController;

impl HealthController {
    pub async fn health(&self, _cx: RequestContext) -> Result<Outcome, AppError> {
        Outcome::json(&json!({
            "status": "ok",
            "service": env!("CARGO_PKG_NAME"),
        }))
    }
}

impl Controller for HealthController {
    const KEY: ControllerKey = "health";

    fn declare(registry: &mut Registry) -> Result<(), ConfigError> {
        registry.declare_once(Self::KEY, |r| {
            r.controller(Self::KEY).get("/health", "health")?;
            Ok(())
        })
    }

    fn bind(self: Arc<Self>, method: &str) -> Option<ActionHandler> {
        match method {
            "health" => Some(action(&self, |c, cx| async move { c.health(cx).await })),
            _ => None,
        }
    }
}
