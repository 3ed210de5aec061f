//! Keygate - a self-hosted license key registry and activation server
//!
//! # Features
//!
//! Keygate uses feature flags to allow you to include only what you need:
//!
//! - `server` - Server components (registry, handlers, database). Enabled by default.
//! - `sqlite` - SQLite database backend. Enabled by default.
//! - `postgres` - PostgreSQL database backend.
//!
//! # Example
//!
//! ```toml
//! # Use defaults (server + sqlite)
//! keygate = { git = "https://github.com/keygate-io/keygate" }
//!
//! # Client-only (no server components)
//! keygate = { git = "https://github.com/keygate-io/keygate", default-features = false }
//!
//! # Server with PostgreSQL
//! keygate = { git = "https://github.com/keygate-io/keygate", features = ["server", "postgres"] }
//! ```

// Core modules (always available)
pub mod config;
pub mod errors;
pub mod license;

// Client-related modules (always available)
pub mod client {
    pub mod api;
    pub mod machine_id;
}

// Server-related modules (requires "server" feature)
#[cfg(feature = "server")]
#[path = "server/mod.rs"]
pub mod server;
