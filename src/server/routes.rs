use axum::{
    routing::{get, post},
    Router,
};

use crate::server::handlers::{
    activate_handler, create_handler, delete_handler, download_handler, extend_handler,
    health_handler, relicense_handler, validate_handler, AppState,
};

/// Build the main application router for the license server.
///
/// This is a convenience helper so `main.rs` or tests can construct the
/// router in a single call. The request logging layer is applied by the
/// binary (it is configurable), not here.
///
/// # Routes
///
/// ## Public
/// - `GET /` - Health check
/// - `POST /api/v1/activate` - Bind a license to a machine
/// - `POST /api/v1/validate` - Periodic entitlement check
///
/// ## Admin (shared secret in request body)
/// - `POST /api/v1/create` - Issue a license
/// - `POST /api/v1/delete` - Permanently remove a license
/// - `POST /api/v1/extend` - Push the expiry date out
/// - `POST /api/v1/relicense` - Rebind to a new machine
/// - `POST /api/v1/admin/download` - Bulk export all licenses
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health_handler))
        .route("/api/v1/create", post(create_handler))
        .route("/api/v1/delete", post(delete_handler))
        .route("/api/v1/activate", post(activate_handler))
        .route("/api/v1/validate", post(validate_handler))
        .route("/api/v1/extend", post(extend_handler))
        .route("/api/v1/relicense", post(relicense_handler))
        .route("/api/v1/admin/download", post(download_handler))
        .with_state(state)
}
