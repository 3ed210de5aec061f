//! Request field validation utilities.
//!
//! Request DTOs use `Option<String>` fields so absent values reach the
//! handler instead of being rejected by the framework; the helpers here
//! turn them into typed values or field-level errors, which the handlers
//! map to the endpoint's wire message.

use std::fmt;

use chrono::NaiveDate;

/// Validation error type.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Require a field to be present and non-blank.
///
/// # Example
/// ```
/// use keygate::server::validation::require_field;
///
/// assert!(require_field(Some("KEY-1"), "license_key").is_ok());
/// assert!(require_field(None, "license_key").is_err());
/// assert!(require_field(Some("   "), "license_key").is_err());
/// ```
pub fn require_field<'a>(value: Option<&'a str>, field_name: &str) -> ValidationResult<&'a str> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ValidationError {
            field: field_name.to_string(),
            message: "is required".to_string(),
        }),
    }
}

/// Parse an expiry date in strict `YYYY-MM-DD` form.
///
/// # Example
/// ```
/// use keygate::server::validation::parse_expiry_date;
///
/// assert!(parse_expiry_date("2099-01-01", "expiry_date").is_ok());
/// assert!(parse_expiry_date("01/01/2099", "expiry_date").is_err());
/// ```
pub fn parse_expiry_date(value: &str, field_name: &str) -> ValidationResult<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| ValidationError {
        field: field_name.to_string(),
        message: "must be a YYYY-MM-DD calendar date".to_string(),
    })
}
