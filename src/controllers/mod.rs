//! Controllers served by the todo application
//!
//! [`rest`] holds the generic CRUD controller; the others extend it or stand
//! alone.

pub mod health;
pub mod rest;
pub mod tags;
pub mod todos;

pub use health::HealthController;
pub use rest::{AuditConfig, REST_KEY, Resource, RestConfig, RestController};
pub use tags::TagsController;
pub use todos::TodosController;
