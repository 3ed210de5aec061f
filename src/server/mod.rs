// src/server/mod.rs

//! Server-side components for Keygate.
//!
//! This module contains:
//! - `database`   → DB abstraction over SQLite/Postgres
//! - `registry`   → License state machine and transition operations
//! - `handlers`   → Axum HTTP handlers for all endpoints
//! - `routes`     → Router builder
//! - `api_error`  → Wire-format error responses
//! - `auth`       → Admin shared-secret check
//! - `validation` → Request field validation utilities
//! - `logging`    → Request logging middleware + license event log

pub mod api_error;
pub mod auth;
pub mod database;
pub mod handlers;
pub mod logging;
pub mod registry;
pub mod routes;
pub mod validation;

// Convenient re-exports so callers can do `keygate::server::X`
// instead of digging into submodules.

pub use api_error::ApiError;
pub use auth::verify_admin_key;
pub use database::{Database, LicenseRow};
pub use handlers::{
    activate_handler, create_handler, delete_handler, download_handler, extend_handler,
    health_handler, relicense_handler, validate_handler, AppState,
};
pub use logging::{log_license_event, request_logging_middleware, LicenseEvent};
pub use registry::{Registry, RegistryError};
pub use routes::build_router;
pub use validation::{parse_expiry_date, require_field, ValidationError, ValidationResult};
