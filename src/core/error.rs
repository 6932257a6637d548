//! Typed error handling for ctrlkit
//!
//! Every failure that can reach the dispatch boundary is an [`AppError`].
//! Each variant wraps a more specific error type for its category, and each
//! category knows its HTTP status code.
//!
//! # Error Categories
//!
//! - [`ConfigError`]: wiring and startup mistakes (duplicate routes, missing
//!   bound methods, malformed patterns, unreadable configuration). Fatal.
//! - [`ValidationError`]: the request payload was rejected by the input
//!   validator. Rendered as 400.
//! - [`RequestError`]: the request itself is unusable (no session, bad body,
//!   bad query). Rendered as 400/401.
//! - [`StorageError`]: the document store failed. Rendered as 500 with a
//!   generic message.
//!
//! "Not found" is deliberately absent: repositories return `Option` and
//! handlers turn `None` into [`Outcome::NotFound`](crate::routing::Outcome).
//!
//! # Example
//!
//! ```rust,ignore
//! async fn get(&self, cx: RequestContext) -> Result<Outcome, AppError> {
//!     let id = cx.require_param("id")?;
//!     let todo = self.repository.find_by_id(id, None).await?;
//!     Outcome::found(todo)
//! }
//! ```

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::fmt;

use crate::routing::registry::{ControllerKey, Verb};

/// Message sent to clients for every 5xx error
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// The main error type for ctrlkit
#[derive(Debug)]
pub enum AppError {
    /// Configuration and wiring errors
    Config(ConfigError),

    /// Input rejected by the validator
    Validation(ValidationError),

    /// Unusable request (authentication, body, query)
    Request(RequestError),

    /// Storage backend errors
    Storage(StorageError),

    /// Anything else, including panics caught at the dispatch boundary
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(e) => write!(f, "{}", e),
            AppError::Validation(e) => write!(f, "{}", e),
            AppError::Request(e) => write!(f, "{}", e),
            AppError::Storage(e) => write!(f, "{}", e),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(e) => Some(e),
            AppError::Validation(e) => Some(e),
            AppError::Request(e) => Some(e),
            AppError::Storage(e) => Some(e),
            AppError::Internal(_) => None,
        }
    }
}

/// Error body written for every error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Human-readable error message
    pub message: String,
}

impl AppError {
    /// Build an internal error from anything displayable
    pub fn internal(message: impl fmt::Display) -> Self {
        AppError::Internal(message.to_string())
    }

    /// Shortcut for a validation failure with a single message
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(ValidationError::Invalid {
            message: message.into(),
        })
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Request(e) => e.status_code(),
            AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the error is the server's fault
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Convert to the body sent to clients
    ///
    /// Server errors never leak their details.
    pub fn to_response(&self) -> ErrorResponse {
        let message = if self.is_server_error() {
            INTERNAL_ERROR_MESSAGE.to_string()
        } else {
            match self {
                AppError::Validation(e) => e.message().to_string(),
                other => other.to_string(),
            }
        };
        ErrorResponse { message }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self.to_response());
        (status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Storage(StorageError::Backend {
            message: format!("{:#}", err),
        })
    }
}

// =============================================================================
// Config Errors
// =============================================================================

/// Errors raised while declaring or wiring controllers, or loading config
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The same (verb, pattern) pair was declared twice on one controller
    DuplicateRoute {
        controller: ControllerKey,
        verb: Verb,
        pattern: String,
    },

    /// A declared action or error handler names a method the controller
    /// does not bind
    MissingMethod {
        controller: ControllerKey,
        method: String,
    },

    /// A path template could not be compiled
    MalformedPattern { pattern: String, reason: String },

    /// A controller names a parent that was never declared
    UnknownParent {
        controller: ControllerKey,
        parent: ControllerKey,
    },

    /// A controller was declared again with a different parent
    ConflictingParent { controller: ControllerKey },

    /// Configuration could not be read or parsed
    Invalid { message: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::DuplicateRoute {
                controller,
                verb,
                pattern,
            } => write!(
                f,
                "Duplicate route {} {} on controller '{}'",
                verb, pattern, controller
            ),
            ConfigError::MissingMethod { controller, method } => write!(
                f,
                "Controller '{}' has no method '{}'",
                controller, method
            ),
            ConfigError::MalformedPattern { pattern, reason } => {
                write!(f, "Malformed route pattern '{}': {}", pattern, reason)
            }
            ConfigError::UnknownParent { controller, parent } => write!(
                f,
                "Controller '{}' extends undeclared controller '{}'",
                controller, parent
            ),
            ConfigError::ConflictingParent { controller } => write!(
                f,
                "Controller '{}' was declared twice with different parents",
                controller
            ),
            ConfigError::Invalid { message } => write!(f, "Invalid configuration: {}", message),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Config(err)
    }
}

// =============================================================================
// Validation Errors
// =============================================================================

/// Errors produced by the input validator
#[derive(Debug)]
pub enum ValidationError {
    /// A single message describing what is wrong
    Invalid { message: String },

    /// Field-level errors reported by `validator`
    Fields(validator::ValidationErrors),
}

impl ValidationError {
    /// The message sent to clients
    pub fn message(&self) -> String {
        match self {
            ValidationError::Invalid { message } => message.clone(),
            ValidationError::Fields(errors) => errors.to_string(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ValidationError {}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err)
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(ValidationError::Fields(errors))
    }
}

// =============================================================================
// Request Errors
// =============================================================================

/// Errors related to the incoming request itself
#[derive(Debug)]
pub enum RequestError {
    /// No valid session
    Unauthorized { message: String },

    /// Body missing or not parseable
    InvalidBody { message: String },

    /// Query string value not understood
    InvalidQuery { parameter: String, message: String },

    /// A route parameter the handler relies on was not captured
    MissingParam { name: String },
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestError::Unauthorized { message } => write!(f, "{}", message),
            RequestError::InvalidBody { message } => write!(f, "Invalid request body: {}", message),
            RequestError::InvalidQuery { parameter, message } => {
                write!(f, "Invalid query parameter '{}': {}", parameter, message)
            }
            RequestError::MissingParam { name } => {
                write!(f, "Missing route parameter '{}'", name)
            }
        }
    }
}

impl std::error::Error for RequestError {}

impl RequestError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RequestError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            RequestError::InvalidBody { .. } => StatusCode::BAD_REQUEST,
            RequestError::InvalidQuery { .. } => StatusCode::BAD_REQUEST,
            RequestError::MissingParam { .. } => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<RequestError> for AppError {
    fn from(err: RequestError) -> Self {
        AppError::Request(err)
    }
}

// =============================================================================
// Storage Errors
// =============================================================================

/// Errors related to the document store
#[derive(Debug)]
pub enum StorageError {
    /// Connection could not be established
    Connection { message: String },

    /// A store operation failed
    Backend { message: String },

    /// Commit or abort failed
    Transaction { message: String },

    /// A stored document does not match the entity shape
    Corrupted {
        collection: String,
        message: String,
    },
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Connection { message } => {
                write!(f, "Failed to connect to the database: {}", message)
            }
            StorageError::Backend { message } => write!(f, "Storage error: {}", message),
            StorageError::Transaction { message } => write!(f, "Transaction error: {}", message),
            StorageError::Corrupted {
                collection,
                message,
            } => write!(
                f,
                "Document in '{}' does not match its entity: {}",
                collection, message
            ),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        AppError::Storage(err)
    }
}
