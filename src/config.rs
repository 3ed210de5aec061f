//! Configuration system for Keygate.
//!
//! Configuration is loaded from multiple sources with the following precedence:
//! 1. Environment variables (highest priority)
//! 2. `config.toml` file
//! 3. Default values (lowest priority)
//!
//! # Environment Variables
//!
//! All configuration options can be overridden via environment variables:
//! - `KEYGATE_SERVER_HOST` - Server bind address
//! - `KEYGATE_SERVER_PORT` - Server port
//! - `KEYGATE_DATABASE_TYPE` - Database backend ("sqlite" or "postgres")
//! - `KEYGATE_DATABASE_URL` - Database connection URL
//! - `KEYGATE_ADMIN_SECRET` - Shared secret for admin endpoints
//! - `KEYGATE_LOG_LEVEL` - Log level (trace, debug, info, warn, error)
//! - `KEYGATE_LOGGING_ENABLED` - Enable request logging middleware
//! - `KEYGATE_SERVER_URL` - Base URL the client SDK talks to
//! - `KEYGATE_CHECK_INTERVAL` - Client re-validation interval in seconds
//!
//! The admin secret and database handle are process-wide configuration, but
//! they are injected into `AppState` at startup rather than read from here
//! by the handlers, so tests can run against fakes.

use config::Config;
use serde::Deserialize;
use std::env;
use std::sync::OnceLock;

use crate::errors::{KeygateError, KeygateResult};

/// Global configuration singleton.
static CONFIG: OnceLock<KeygateConfig> = OnceLock::new();

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct KeygateConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Admin authentication configuration
    pub admin: AdminConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Client SDK configuration
    pub client: ClientConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database type: "sqlite" or "postgres"
    pub db_type: String,
    /// SQLite connection URL
    pub sqlite_url: String,
    /// PostgreSQL connection URL
    pub postgres_url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            db_type: "sqlite".to_string(),
            sqlite_url: "sqlite://keygate.db?mode=rwc".to_string(),
            postgres_url: "postgres://localhost/keygate".to_string(),
        }
    }
}

/// Admin authentication configuration.
///
/// A single static shared secret authorizes the privileged lifecycle
/// endpoints (create, delete, extend, relicense, bulk export). The server
/// binary refuses to start while it is empty.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Shared secret compared against the `admin_key` request field
    pub secret: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Enable the request logging middleware
    pub enabled: bool,
    /// Log level: trace, debug, info, warn, error
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
        }
    }
}

/// Client SDK configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the license server
    pub server_url: String,
    /// Re-validation interval in seconds
    pub check_interval: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8080".to_string(),
            check_interval: 3600,
        }
    }
}

impl KeygateConfig {
    /// Load configuration from file and environment.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. `config.toml` file (optional)
    /// 3. Environment variables
    fn load() -> KeygateResult<Self> {
        let builder = Config::builder()
            // Start with defaults
            .set_default("server.host", "127.0.0.1")
            .map_err(|e| KeygateError::ConfigError(e.to_string()))?
            .set_default("server.port", 8080)
            .map_err(|e| KeygateError::ConfigError(e.to_string()))?
            .set_default("database.db_type", "sqlite")
            .map_err(|e| KeygateError::ConfigError(e.to_string()))?
            .set_default("database.sqlite_url", "sqlite://keygate.db?mode=rwc")
            .map_err(|e| KeygateError::ConfigError(e.to_string()))?
            .set_default("database.postgres_url", "postgres://localhost/keygate")
            .map_err(|e| KeygateError::ConfigError(e.to_string()))?
            .set_default("admin.secret", "")
            .map_err(|e| KeygateError::ConfigError(e.to_string()))?
            .set_default("logging.enabled", true)
            .map_err(|e| KeygateError::ConfigError(e.to_string()))?
            .set_default("logging.level", "info")
            .map_err(|e| KeygateError::ConfigError(e.to_string()))?
            .set_default("client.server_url", "http://127.0.0.1:8080")
            .map_err(|e| KeygateError::ConfigError(e.to_string()))?
            .set_default("client.check_interval", 3600)
            .map_err(|e| KeygateError::ConfigError(e.to_string()))?
            // Load from config.toml (optional)
            .add_source(config::File::with_name("config").required(false))
            // Override with environment variables
            .set_override_option("server.host", env::var("KEYGATE_SERVER_HOST").ok())
            .map_err(|e| KeygateError::ConfigError(e.to_string()))?
            .set_override_option(
                "server.port",
                env::var("KEYGATE_SERVER_PORT")
                    .ok()
                    .and_then(|v| v.parse::<i64>().ok()),
            )
            .map_err(|e| KeygateError::ConfigError(e.to_string()))?
            .set_override_option("database.db_type", env::var("KEYGATE_DATABASE_TYPE").ok())
            .map_err(|e| KeygateError::ConfigError(e.to_string()))?
            .set_override_option(
                "database.sqlite_url",
                env::var("KEYGATE_DATABASE_URL")
                    .ok()
                    .filter(|url| url.starts_with("sqlite")),
            )
            .map_err(|e| KeygateError::ConfigError(e.to_string()))?
            .set_override_option(
                "database.postgres_url",
                env::var("KEYGATE_DATABASE_URL")
                    .ok()
                    .filter(|url| url.starts_with("postgres")),
            )
            .map_err(|e| KeygateError::ConfigError(e.to_string()))?
            .set_override_option("admin.secret", env::var("KEYGATE_ADMIN_SECRET").ok())
            .map_err(|e| KeygateError::ConfigError(e.to_string()))?
            .set_override_option(
                "logging.enabled",
                env::var("KEYGATE_LOGGING_ENABLED")
                    .ok()
                    .and_then(|v| v.parse::<bool>().ok()),
            )
            .map_err(|e| KeygateError::ConfigError(e.to_string()))?
            .set_override_option("logging.level", env::var("KEYGATE_LOG_LEVEL").ok())
            .map_err(|e| KeygateError::ConfigError(e.to_string()))?
            .set_override_option("client.server_url", env::var("KEYGATE_SERVER_URL").ok())
            .map_err(|e| KeygateError::ConfigError(e.to_string()))?
            .set_override_option(
                "client.check_interval",
                env::var("KEYGATE_CHECK_INTERVAL")
                    .ok()
                    .and_then(|v| v.parse::<i64>().ok()),
            )
            .map_err(|e| KeygateError::ConfigError(e.to_string()))?;

        let settings = builder
            .build()
            .map_err(|e| KeygateError::ConfigError(format!("failed to build config: {e}")))?;

        settings
            .try_deserialize()
            .map_err(|e| KeygateError::ConfigError(format!("failed to deserialize config: {e}")))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> KeygateResult<()> {
        if self.server.port == 0 {
            return Err(KeygateError::ConfigError(
                "server.port must be greater than 0".to_string(),
            ));
        }

        match self.database.db_type.as_str() {
            "sqlite" | "postgres" => {}
            other => {
                return Err(KeygateError::ConfigError(format!(
                    "database.db_type must be 'sqlite' or 'postgres', got '{other}'"
                )));
            }
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(KeygateError::ConfigError(format!(
                    "logging.level must be one of: trace, debug, info, warn, error. Got '{other}'"
                )));
            }
        }

        if self.client.check_interval == 0 {
            return Err(KeygateError::ConfigError(
                "client.check_interval must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Get the global configuration.
///
/// This loads the configuration on first access and caches it.
/// Returns an error if configuration loading or validation fails.
pub fn get_config() -> KeygateResult<&'static KeygateConfig> {
    // Check if already initialized
    if let Some(config) = CONFIG.get() {
        return Ok(config);
    }

    // Load and validate configuration
    let config = KeygateConfig::load()?;
    config.validate()?;

    // Try to set it (ignore if another thread beat us)
    let _ = CONFIG.set(config.clone());

    // Return the stored config (either ours or another thread's)
    Ok(CONFIG.get().expect("config was just set"))
}

/// Initialize configuration explicitly.
///
/// Call this early in your application to catch configuration errors.
/// Returns the validated configuration.
pub fn init_config() -> KeygateResult<&'static KeygateConfig> {
    get_config()
}

/// Retrieve the server URL the client SDK should talk to.
///
/// Precedence:
/// 1. `KEYGATE_SERVER_URL` environment variable
/// 2. `client.server_url` from config
pub fn get_server_url() -> String {
    if let Ok(url) = env::var("KEYGATE_SERVER_URL") {
        return url;
    }

    get_config()
        .map(|c| c.client.server_url.clone())
        .unwrap_or_else(|_| ClientConfig::default().server_url)
}

/// Retrieve the client re-validation interval in seconds.
pub fn get_check_interval() -> u64 {
    get_config().map(|c| c.client.check_interval).unwrap_or(3600)
}

/// Check whether the request logging middleware is enabled.
pub fn is_logging_enabled() -> bool {
    get_config().map(|c| c.logging.enabled).unwrap_or(true)
}
