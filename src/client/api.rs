//! HTTP client for license activation and periodic re-validation.
//!
//! The server distinguishes business rejections (expired, blocked, bound to
//! another machine) from transport failures with structured JSON bodies;
//! `ClientError` preserves that distinction so callers can react to an
//! expired license differently from a flaky network.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::warn;

use crate::client::machine_id::get_machine_id;

/// Errors returned by [`LicenseClient`].
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("license not found")]
    NotFound,

    #[error("license has expired")]
    Expired,

    /// The license carries a non-active status such as `BLOCKED`.
    #[error("license is {0}")]
    NotActive(String),

    #[error("license is bound to another machine")]
    MachineMismatch,

    /// The server rejected the request as malformed (HTTP 400).
    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("server error: {0}")]
    Server(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Successful activation or validation result.
#[derive(Debug, Clone)]
pub struct Activation {
    /// Status tag returned by the server (`ACTIVATED` or `OK`)
    pub status: String,
    /// Expiry date in `YYYY-MM-DD` form
    pub expiry_date: String,
}

/// Wire shape of every server response; all fields optional so one struct
/// covers success and failure bodies alike.
#[derive(Debug, Deserialize)]
struct WireResponse {
    status: Option<String>,
    message: Option<String>,
    expiry_date: Option<String>,
}

/// Client for the license server's public endpoints.
pub struct LicenseClient {
    http: Client,
    server_url: String,
    machine_id: String,
}

impl LicenseClient {
    /// Create a client talking to `server_url`, fingerprinting this machine.
    pub fn new(server_url: impl Into<String>) -> Self {
        Self::with_machine_id(server_url, get_machine_id())
    }

    /// Create a client with an explicit machine id (used by tests).
    pub fn with_machine_id(server_url: impl Into<String>, machine_id: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            server_url: server_url.into(),
            machine_id: machine_id.into(),
        }
    }

    pub fn machine_id(&self) -> &str {
        &self.machine_id
    }

    /// Activate `license_key` for this machine.
    ///
    /// Idempotent: repeating the call from the same machine succeeds again
    /// with the same expiry date.
    pub async fn activate(&self, license_key: &str) -> Result<Activation, ClientError> {
        self.call("activate", license_key).await
    }

    /// Confirm the license is still valid for this machine.
    pub async fn validate(&self, license_key: &str) -> Result<Activation, ClientError> {
        self.call("validate", license_key).await
    }

    async fn call(&self, endpoint: &str, license_key: &str) -> Result<Activation, ClientError> {
        let url = format!("{}/api/v1/{}", self.server_url, endpoint);

        let response = self
            .http
            .post(&url)
            .json(&serde_json::json!({
                "license_key": license_key,
                "machine_id": self.machine_id,
            }))
            .send()
            .await?;

        let status = response.status();
        let body: WireResponse = response.json().await.unwrap_or(WireResponse {
            status: None,
            message: None,
            expiry_date: None,
        });

        match status {
            StatusCode::OK => Ok(Activation {
                status: body.status.unwrap_or_default(),
                expiry_date: body.expiry_date.unwrap_or_default(),
            }),
            StatusCode::NOT_FOUND => Err(ClientError::NotFound),
            StatusCode::FORBIDDEN => {
                // The status tag carries the reason: EXPIRED for a lapsed
                // license, FAIL for a machine mismatch, anything else is the
                // license's own non-active status.
                match body.status.as_deref() {
                    Some("EXPIRED") => Err(ClientError::Expired),
                    Some("FAIL") | None => Err(ClientError::MachineMismatch),
                    Some(other) => Err(ClientError::NotActive(other.to_string())),
                }
            }
            StatusCode::BAD_REQUEST => Err(ClientError::Rejected(
                body.message.unwrap_or_else(|| "bad request".to_string()),
            )),
            other => Err(ClientError::Server(format!(
                "{} ({})",
                body.message.unwrap_or_else(|| "unexpected response".to_string()),
                other
            ))),
        }
    }
}

/// Re-validate `license_key` every `interval` until the server rejects it.
///
/// Network errors are logged and retried on the next tick; the first
/// business rejection (expired, blocked, mismatch, not found) ends the loop
/// and is returned to the caller. Retry policy beyond that is the
/// application's concern.
pub async fn revalidation_loop(
    client: &LicenseClient,
    license_key: &str,
    interval: Duration,
) -> ClientError {
    loop {
        tokio::time::sleep(interval).await;

        match client.validate(license_key).await {
            Ok(_) => {}
            Err(ClientError::Network(e)) => {
                warn!("License re-validation attempt failed: {e}");
            }
            Err(e) => return e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_keeps_the_injected_machine_id() {
        let client = LicenseClient::with_machine_id("http://localhost:8080", "MACHINE-A");
        assert_eq!(client.machine_id(), "MACHINE-A");
    }

    #[test]
    fn wire_response_tolerates_partial_bodies() {
        let body: WireResponse = serde_json::from_str(r#"{"status":"EXPIRED"}"#).unwrap();
        assert_eq!(body.status.as_deref(), Some("EXPIRED"));
        assert!(body.expiry_date.is_none());

        let body: WireResponse = serde_json::from_str("{}").unwrap();
        assert!(body.status.is_none());
    }
}
