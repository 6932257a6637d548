//! Core types shared by the routing layer, the controllers and the stores

pub mod auth;
pub mod error;
pub mod query;
pub mod repository;
pub mod store;
pub mod validation;

pub use auth::{AuthProvider, Session, StaticTokenAuth};
pub use error::{AppError, ConfigError};
pub use query::{PageResult, PaginationOptions, Sort, SortOrder};
pub use repository::{Entity, Repository};
pub use store::{Document, DocumentStore, FindQuery, Transaction, finish_transaction};
