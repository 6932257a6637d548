//! Middlewares shipped with ctrlkit

pub mod auth;
pub mod connection;
pub mod trace;

pub use auth::RequireSession;
pub use connection::EnsureConnected;
pub use trace::RequestLogger;
