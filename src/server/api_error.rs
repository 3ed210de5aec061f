//! Standardized API error responses for all Keygate endpoints.
//!
//! Every failure is reported as structured JSON with a status tag and a
//! message, matching the bodies the admin tool and client application
//! already parse:
//!
//! ```json
//! {"status": "FAIL", "message": "License not found."}
//! ```
//!
//! The tag is `FAIL` for input, auth, lookup and mismatch errors, the
//! license's own status for not-active rejections (`{"status": "BLOCKED",
//! ...}`), `EXPIRED` for lapsed licenses, and `ERROR` (with a `code`
//! field) for unexpected 500s. None of these are fatal to the process.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::errors::KeygateError;
use crate::server::registry::RegistryError;

/// Wire body of a failed request.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    /// Status tag: `FAIL`, `EXPIRED`, `ERROR`, or a license status
    pub status: String,
    /// Human-readable message
    pub message: String,
    /// HTTP code, only present on `ERROR` bodies
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
}

/// An HTTP error response: status code plus wire body.
#[derive(Debug, Clone)]
pub struct ApiError {
    pub http_status: StatusCode,
    pub body: ErrorBody,
}

impl ApiError {
    fn new(http_status: StatusCode, status: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            http_status,
            body: ErrorBody {
                status: status.into(),
                message: message.into(),
                code: None,
            },
        }
    }

    /// 400 - a required field is absent or empty.
    pub fn missing(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "FAIL", message)
    }

    /// 400 - `expiry_date` is not a `YYYY-MM-DD` calendar date.
    pub fn invalid_date() -> Self {
        Self::new(StatusCode::BAD_REQUEST, "FAIL", "Invalid date format.")
    }

    /// 401 - admin secret mismatch. Deliberately detail-free.
    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "FAIL", "Admin key incorrect.")
    }

    /// 404 - no license with that key.
    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "FAIL", "License not found.")
    }

    /// 409 - license key already taken.
    pub fn duplicate_key() -> Self {
        Self::new(StatusCode::CONFLICT, "FAIL", "License key already exists.")
    }

    /// 403 - license bound to a different machine. The message depends on
    /// the endpoint: activation and validation have historically reported
    /// this differently and the clients match on the text.
    pub fn machine_mismatch(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "FAIL", message)
    }

    /// 403 - license carries a non-active status; the tag is the status
    /// itself so callers can display it.
    pub fn not_active(status: &str) -> Self {
        Self::new(StatusCode::FORBIDDEN, status, format!("License is {status}."))
    }

    /// 403 - expiry date has passed.
    pub fn expired() -> Self {
        Self::new(StatusCode::FORBIDDEN, "EXPIRED", "Expired.")
    }

    /// 500 - unexpected failure; the server stays up.
    pub fn internal(message: impl Into<String>) -> Self {
        let status = StatusCode::INTERNAL_SERVER_ERROR;
        Self {
            http_status: status,
            body: ErrorBody {
                status: "ERROR".to_string(),
                message: message.into(),
                code: Some(status.as_u16()),
            },
        }
    }

    /// Map a registry outcome to its wire response.
    ///
    /// `mismatch_message` supplies the endpoint-specific device-mismatch
    /// text ("Activated on another device." vs "Machine ID mismatch.").
    pub fn from_registry(err: RegistryError, mismatch_message: &str) -> Self {
        match err {
            RegistryError::NotFound => Self::not_found(),
            RegistryError::DuplicateKey => Self::duplicate_key(),
            RegistryError::Expired => Self::expired(),
            RegistryError::NotActive(status) => Self::not_active(status.as_str()),
            RegistryError::MachineMismatch => Self::machine_mismatch(mismatch_message),
            RegistryError::Store(e) => Self::internal(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.http_status, Json(self.body)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.body.status, self.body.message)
    }
}

impl std::error::Error for ApiError {}

impl From<KeygateError> for ApiError {
    fn from(err: KeygateError) -> Self {
        ApiError::internal(err.to_string())
    }
}
