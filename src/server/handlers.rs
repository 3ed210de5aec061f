//! Axum HTTP handlers for all license endpoints.
//!
//! Handlers decode requests, run the matching registry operation, and
//! encode the wire responses. Request DTOs deserialize every field as
//! optional and check presence explicitly, so a missing field produces the
//! contract's 400 body instead of a framework rejection; a missing or
//! malformed JSON body is treated as an empty one.

use std::sync::Arc;

use axum::{extract::State, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::license::License;
use crate::server::api_error::ApiError;
use crate::server::auth::verify_admin_key;
use crate::server::database::Database;
use crate::server::logging::{log_license_event, LicenseEvent};
use crate::server::registry::Registry;
use crate::server::validation::{parse_expiry_date, require_field};

/// Shared application state for handlers.
///
/// The store handle and admin secret are injected here at startup, so
/// tests can run the full router against an in-memory database and a
/// known secret.
#[derive(Clone)]
pub struct AppState {
    pub registry: Registry,
    pub admin_secret: Arc<str>,
}

impl AppState {
    pub fn new(db: Arc<Database>, admin_secret: impl Into<Arc<str>>) -> Self {
        Self {
            registry: Registry::new(db),
            admin_secret: admin_secret.into(),
        }
    }
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct CreateRequest {
    pub admin_key: Option<String>,
    pub license_key: Option<String>,
    /// Expiry date in `YYYY-MM-DD` form
    pub expiry_date: Option<String>,
    #[serde(default)]
    pub zalo_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteRequest {
    pub admin_key: Option<String>,
    pub license_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ActivateRequest {
    pub license_key: Option<String>,
    pub machine_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ValidateRequest {
    pub license_key: Option<String>,
    pub machine_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExtendRequest {
    pub admin_key: Option<String>,
    pub license_key: Option<String>,
    /// May be any integer, including zero or negative (shortening)
    pub days_to_add: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RelicenseRequest {
    pub admin_key: Option<String>,
    pub license_key: Option<String>,
    pub new_machine_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DownloadRequest {
    pub admin_key: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ActivationResponse {
    pub status: &'static str,
    pub expiry_date: String,
}

#[derive(Debug, Serialize)]
pub struct ExtendResponse {
    pub status: &'static str,
    pub new_expiry_date: String,
}

#[derive(Debug, Serialize)]
pub struct RelicenseResponse {
    pub status: &'static str,
    pub new_machine_id: String,
}

#[derive(Debug, Serialize)]
pub struct DownloadResponse {
    pub status: &'static str,
    pub licenses: Vec<LicenseSnapshot>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub time: String,
}

/// Full field set of a license as exported by the admin download endpoint.
#[derive(Debug, Serialize)]
pub struct LicenseSnapshot {
    pub id: String,
    pub license_key: String,
    pub expiry_date: String,
    pub allowed_machine_id: Option<String>,
    pub status: String,
    pub created_at: String,
    pub last_check: Option<String>,
    pub zalo_id: Option<String>,
    pub activation_note: Option<String>,
}

impl From<License> for LicenseSnapshot {
    fn from(license: License) -> Self {
        Self {
            id: license.id,
            license_key: license.license_key,
            expiry_date: license.expiry_date.format("%Y-%m-%d").to_string(),
            allowed_machine_id: license.allowed_machine_id,
            status: license.status.as_str().to_string(),
            created_at: license.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            last_check: license
                .last_check
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string()),
            zalo_id: license.zalo_id,
            activation_note: license.activation_note,
        }
    }
}

fn payload_or_default<T: Default>(payload: Option<Json<T>>) -> T {
    payload.map(|Json(p)| p).unwrap_or_default()
}

// ============================================================================
// Handlers
// ============================================================================

/// `GET /` - health check.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "RUNNING",
        message: "License Server is Online",
        time: Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
    })
}

/// `POST /api/v1/create` - issue a new license (admin).
pub async fn create_handler(
    State(state): State<AppState>,
    payload: Option<Json<CreateRequest>>,
) -> Result<Json<StatusResponse>, ApiError> {
    let req = payload_or_default(payload);
    verify_admin_key(&state.admin_secret, req.admin_key.as_deref())?;

    let license_key = require_field(req.license_key.as_deref(), "license_key")
        .map_err(|_| ApiError::missing("Missing data."))?;
    let expiry_raw = require_field(req.expiry_date.as_deref(), "expiry_date")
        .map_err(|_| ApiError::missing("Missing data."))?;
    let expiry_date =
        parse_expiry_date(expiry_raw, "expiry_date").map_err(|_| ApiError::invalid_date())?;

    state
        .registry
        .create(license_key, expiry_date, req.zalo_id.clone(), Utc::now())
        .await
        .map_err(|e| ApiError::from_registry(e, ""))?;

    log_license_event(LicenseEvent::Created, license_key, None);

    Ok(Json(StatusResponse {
        status: "CREATED",
        message: "License created.",
    }))
}

/// `POST /api/v1/delete` - permanently remove a license (admin).
pub async fn delete_handler(
    State(state): State<AppState>,
    payload: Option<Json<DeleteRequest>>,
) -> Result<Json<StatusResponse>, ApiError> {
    let req = payload_or_default(payload);
    verify_admin_key(&state.admin_secret, req.admin_key.as_deref())?;

    let license_key = require_field(req.license_key.as_deref(), "license_key")
        .map_err(|_| ApiError::missing("Missing data."))?;

    state
        .registry
        .delete(license_key)
        .await
        .map_err(|e| ApiError::from_registry(e, ""))?;

    log_license_event(LicenseEvent::Deleted, license_key, None);

    Ok(Json(StatusResponse {
        status: "DELETED",
        message: "License deleted.",
    }))
}

/// `POST /api/v1/activate` - bind a license to a machine (client).
///
/// Idempotent for the same machine id; a different machine gets 403.
pub async fn activate_handler(
    State(state): State<AppState>,
    payload: Option<Json<ActivateRequest>>,
) -> Result<Json<ActivationResponse>, ApiError> {
    let req = payload_or_default(payload);

    let license_key = require_field(req.license_key.as_deref(), "license_key")
        .map_err(|_| ApiError::missing("Missing info"))?;
    let machine_id = require_field(req.machine_id.as_deref(), "machine_id")
        .map_err(|_| ApiError::missing("Missing info"))?;

    let license = state
        .registry
        .activate(license_key, machine_id, Utc::now())
        .await
        .map_err(|e| {
            log_license_event(LicenseEvent::ValidationFailed, license_key, Some(&e.to_string()));
            ApiError::from_registry(e, "Activated on another device.")
        })?;

    log_license_event(LicenseEvent::Activated, license_key, Some(machine_id));

    Ok(Json(ActivationResponse {
        status: "ACTIVATED",
        expiry_date: license.expiry_date.format("%Y-%m-%d").to_string(),
    }))
}

/// `POST /api/v1/validate` - periodic entitlement check (client).
///
/// Runs the lazy expiry check first: an overdue license flips to `EXPIRED`,
/// is persisted, and the caller gets a 403 EXPIRED body - distinguishable
/// from transport errors.
pub async fn validate_handler(
    State(state): State<AppState>,
    payload: Option<Json<ValidateRequest>>,
) -> Result<Json<ActivationResponse>, ApiError> {
    let req = payload_or_default(payload);

    let license_key = require_field(req.license_key.as_deref(), "license_key")
        .map_err(|_| ApiError::missing("Missing info"))?;
    let machine_id = require_field(req.machine_id.as_deref(), "machine_id")
        .map_err(|_| ApiError::missing("Missing info"))?;

    let license = state
        .registry
        .validate(license_key, machine_id, Utc::now())
        .await
        .map_err(|e| {
            log_license_event(LicenseEvent::ValidationFailed, license_key, Some(&e.to_string()));
            ApiError::from_registry(e, "Machine ID mismatch.")
        })?;

    log_license_event(LicenseEvent::Validated, license_key, None);

    Ok(Json(ActivationResponse {
        status: "OK",
        expiry_date: license.expiry_date.format("%Y-%m-%d").to_string(),
    }))
}

/// `POST /api/v1/extend` - push the expiry date out (admin).
///
/// The baseline is `max(expiry_date, today)` so reviving an expired
/// license is never backdated. Forces status back to `ACTIVE`.
pub async fn extend_handler(
    State(state): State<AppState>,
    payload: Option<Json<ExtendRequest>>,
) -> Result<Json<ExtendResponse>, ApiError> {
    let req = payload_or_default(payload);
    verify_admin_key(&state.admin_secret, req.admin_key.as_deref())?;

    let license_key = require_field(req.license_key.as_deref(), "license_key")
        .map_err(|_| ApiError::missing("Missing data."))?;
    let days_to_add = req
        .days_to_add
        .ok_or_else(|| ApiError::missing("Missing data."))?;

    let new_expiry_date = state
        .registry
        .extend(license_key, days_to_add, Utc::now())
        .await
        .map_err(|e| ApiError::from_registry(e, ""))?;

    log_license_event(
        LicenseEvent::Extended,
        license_key,
        Some(&format!("{days_to_add} days")),
    );

    Ok(Json(ExtendResponse {
        status: "EXTENDED",
        new_expiry_date: new_expiry_date.format("%Y-%m-%d").to_string(),
    }))
}

/// `POST /api/v1/relicense` - rebind to a new machine (admin).
///
/// The override path for lost or replaced devices: overwrites the binding
/// unconditionally and forces status `ACTIVE`.
pub async fn relicense_handler(
    State(state): State<AppState>,
    payload: Option<Json<RelicenseRequest>>,
) -> Result<Json<RelicenseResponse>, ApiError> {
    let req = payload_or_default(payload);
    verify_admin_key(&state.admin_secret, req.admin_key.as_deref())?;

    let license_key = require_field(req.license_key.as_deref(), "license_key")
        .map_err(|_| ApiError::missing("Missing data."))?;
    let new_machine_id = require_field(req.new_machine_id.as_deref(), "new_machine_id")
        .map_err(|_| ApiError::missing("Missing data."))?;

    let new_machine_id = state
        .registry
        .relicense(license_key, new_machine_id)
        .await
        .map_err(|e| ApiError::from_registry(e, ""))?;

    log_license_event(LicenseEvent::Relicensed, license_key, Some(&new_machine_id));

    Ok(Json(RelicenseResponse {
        status: "RE-LICENSED",
        new_machine_id,
    }))
}

/// `POST /api/v1/admin/download` - bulk export of every license (admin).
pub async fn download_handler(
    State(state): State<AppState>,
    payload: Option<Json<DownloadRequest>>,
) -> Result<Json<DownloadResponse>, ApiError> {
    let req = payload_or_default(payload);
    verify_admin_key(&state.admin_secret, req.admin_key.as_deref())?;

    let licenses: Vec<LicenseSnapshot> = state
        .registry
        .list_all()
        .await
        .map_err(|e| ApiError::from_registry(e, ""))?
        .into_iter()
        .map(LicenseSnapshot::from)
        .collect();

    let count = licenses.len();

    Ok(Json(DownloadResponse {
        status: "OK",
        licenses,
        count,
    }))
}
