//! Admin shared-secret check.
//!
//! Privileged endpoints carry an `admin_key` field in the request body,
//! compared for exact equality against the configured secret. Any mismatch
//! (absent field included) is a 401 with no further detail.

use crate::server::api_error::ApiError;

pub fn verify_admin_key(expected: &str, provided: Option<&str>) -> Result<(), ApiError> {
    match provided {
        Some(key) if key == expected => Ok(()),
        _ => Err(ApiError::unauthorized()),
    }
}
