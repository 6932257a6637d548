//! Input validation
//!
//! Request payloads derive [`validator::Validate`]. The routing core only
//! needs to know whether a value is acceptable, and if not, which message to
//! send back with the 400.

use validator::Validate;

use super::error::AppError;

/// Run the payload's validation rules
pub fn validate<T: Validate>(value: &T) -> Result<(), AppError> {
    value.validate().map_err(AppError::from)
}

/// Reject blank strings (whitespace only counts as blank)
pub fn not_blank(value: &str) -> Result<(), validator::ValidationError> {
    if value.trim().is_empty() {
        let mut error = validator::ValidationError::new("not_blank");
        error.message = Some("must not be blank".into());
        return Err(error);
    }
    Ok(())
}
