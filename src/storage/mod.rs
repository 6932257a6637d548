//! Storage implementations for different backends

pub mod connection;
pub mod in_memory;
#[cfg(feature = "mongodb_backend")]
pub mod mongodb;

pub use connection::LazyConnection;
pub use in_memory::InMemoryStore;
#[cfg(feature = "mongodb_backend")]
pub use mongodb::MongoStore;

use anyhow::Result;
use std::sync::Arc;

use crate::config::{DatabaseBackend, DatabaseConfig};
use crate::core::store::DocumentStore;

/// Build the store selected by `config`
///
/// No connection is opened here; the first request (or an explicit
/// `connect()`) does that.
pub fn open_store(config: &DatabaseConfig) -> Result<Arc<dyn DocumentStore>> {
    match config.backend {
        DatabaseBackend::Memory => Ok(Arc::new(InMemoryStore::new())),
        #[cfg(feature = "mongodb_backend")]
        DatabaseBackend::Mongodb => Ok(Arc::new(MongoStore::new(&config.uri, &config.name))),
        #[cfg(not(feature = "mongodb_backend"))]
        DatabaseBackend::Mongodb => Err(anyhow::anyhow!(
            "The mongodb backend requires the `mongodb_backend` feature"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_backend_is_default() {
        let store = open_store(&DatabaseConfig::default()).unwrap();
        assert_eq!(store.backend(), "memory");
    }
}
