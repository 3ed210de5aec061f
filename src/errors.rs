use thiserror::Error;

/// Crate-wide error type for infrastructure failures.
///
/// Business outcomes of registry operations (not found, duplicate key,
/// device mismatch, ...) live in `server::registry::RegistryError`; this
/// enum covers the plumbing around them.
#[derive(Debug, Error)]
pub enum KeygateError {
    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("server error: {0}")]
    ServerError(String),
}

pub type KeygateResult<T> = Result<T, KeygateError>;
