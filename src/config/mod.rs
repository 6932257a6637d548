//! Configuration loading and management
//!
//! ```yaml
//! server:
//!   addr: 127.0.0.1:3000
//! api:
//!   base_path: /api
//! database:
//!   backend: mongodb
//!   uri: mongodb://localhost:27017
//!   name: todos
//! auth:
//!   tokens:
//!     dev-token: alice
//! ```
//!
//! Every section is optional; missing values take the defaults of
//! [`AppConfig::default`]. `CTRLKIT_*` environment variables override the
//! file (see [`AppConfig::apply_overrides`]).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::core::query::DEFAULT_PAGE_SIZE;

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub pagination: PaginationConfig,
    pub auth: AuthConfig,
    pub audit: AuditFieldsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to listen on
    pub addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:3000".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Prefix under which the data controllers answer
    pub base_path: String,
    /// Largest accepted request body, in bytes
    pub body_limit: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_path: "/api".to_string(),
            body_limit: 1024 * 1024,
        }
    }
}

/// Which document store to use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    #[default]
    Memory,
    Mongodb,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    pub uri: String,
    pub name: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: DatabaseBackend::Memory,
            uri: "mongodb://localhost:27017".to_string(),
            name: "ctrlkit".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    /// Page size when only `page` is given
    pub default_page_size: u64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Bearer token -> user id
    pub tokens: HashMap<String, String>,
}

/// Audit stamping; a field set to `null` is not stamped
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditFieldsConfig {
    pub enabled: bool,
    pub creator_field: Option<String>,
    pub updater_field: Option<String>,
    pub deleter_field: Option<String>,
}

impl Default for AuditFieldsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            creator_field: Some("creatorUserId".to_string()),
            updater_field: Some("updaterUserId".to_string()),
            deleter_field: Some("deleterUserId".to_string()),
        }
    }
}

impl AppConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml_str(&content)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml).context("Failed to parse config")?;
        Ok(config)
    }

    /// Apply `CTRLKIT_*` overrides from the process environment
    pub fn with_env_overrides(mut self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok());
        self
    }

    /// Apply overrides from `lookup`
    ///
    /// Recognized keys: `CTRLKIT_ADDR`, `CTRLKIT_BASE_PATH`,
    /// `CTRLKIT_DATABASE_URI`, `CTRLKIT_DATABASE_NAME`. Setting a database URI
    /// also selects the MongoDB backend.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(addr) = lookup("CTRLKIT_ADDR") {
            self.server.addr = addr;
        }
        if let Some(base_path) = lookup("CTRLKIT_BASE_PATH") {
            self.api.base_path = base_path;
        }
        if let Some(uri) = lookup("CTRLKIT_DATABASE_URI") {
            self.database.uri = uri;
            self.database.backend = DatabaseBackend::Mongodb;
        }
        if let Some(name) = lookup("CTRLKIT_DATABASE_NAME") {
            self.database.name = name;
        }
    }
}
