use chrono::{NaiveDate, NaiveDateTime};
use sqlx::{query, query_as, FromRow};
use std::sync::Arc;
use tracing::error;

#[cfg(feature = "sqlite")]
use sqlx::SqlitePool;

#[cfg(feature = "postgres")]
use sqlx::PgPool;

use crate::config::DatabaseConfig;
use crate::errors::{KeygateError, KeygateResult};
use crate::license::{License, LicenseStatus};

/// A license row as stored in the `licenses` table.
///
/// This mirrors the table schema; the domain type is `license::License`.
/// Keeping the raw row separate means the store never leaks its string
/// status representation past this module.
#[derive(Debug, Clone, FromRow)]
pub struct LicenseRow {
    pub id: String,
    pub license_key: String,
    pub expiry_date: NaiveDate,
    pub allowed_machine_id: Option<String>,
    pub status: String,
    pub created_at: NaiveDateTime,
    pub last_check: Option<NaiveDateTime>,
    pub zalo_id: Option<String>,
    pub activation_note: Option<String>,
}

impl From<LicenseRow> for License {
    fn from(row: LicenseRow) -> Self {
        License {
            id: row.id,
            license_key: row.license_key,
            expiry_date: row.expiry_date,
            allowed_machine_id: row.allowed_machine_id,
            status: LicenseStatus::from(row.status.as_str()),
            created_at: row.created_at,
            last_check: row.last_check,
            zalo_id: row.zalo_id,
            activation_note: row.activation_note,
        }
    }
}

impl From<&License> for LicenseRow {
    fn from(license: &License) -> Self {
        LicenseRow {
            id: license.id.clone(),
            license_key: license.license_key.clone(),
            expiry_date: license.expiry_date,
            allowed_machine_id: license.allowed_machine_id.clone(),
            status: license.status.as_str().to_string(),
            created_at: license.created_at,
            last_check: license.last_check,
            zalo_id: license.zalo_id.clone(),
            activation_note: license.activation_note.clone(),
        }
    }
}

/// Unified database abstraction over SQLite and Postgres.
///
/// Available variants depend on enabled features:
/// - `sqlite` feature enables `Database::SQLite`
/// - `postgres` feature enables `Database::Postgres`
#[derive(Debug, Clone)]
pub enum Database {
    #[cfg(feature = "sqlite")]
    SQLite(SqlitePool),
    #[cfg(feature = "postgres")]
    Postgres(PgPool),
}

impl Database {
    /// Open a connection pool for the configured backend.
    pub async fn connect(config: &DatabaseConfig) -> KeygateResult<Arc<Self>> {
        match config.db_type.as_str() {
            #[cfg(feature = "sqlite")]
            "sqlite" => {
                let pool = SqlitePool::connect(&config.sqlite_url).await.map_err(|e| {
                    error!("Failed to connect to SQLite: {e}");
                    KeygateError::ServerError(format!("failed to connect to SQLite: {e}"))
                })?;

                Ok(Arc::new(Database::SQLite(pool)))
            }
            #[cfg(not(feature = "sqlite"))]
            "sqlite" => Err(KeygateError::ConfigError(
                "SQLite support not compiled in. Enable the 'sqlite' feature.".to_string(),
            )),
            #[cfg(feature = "postgres")]
            "postgres" => {
                let pool = PgPool::connect(&config.postgres_url).await.map_err(|e| {
                    error!("Failed to connect to PostgreSQL: {e}");
                    KeygateError::ServerError(format!("failed to connect to PostgreSQL: {e}"))
                })?;

                Ok(Arc::new(Database::Postgres(pool)))
            }
            #[cfg(not(feature = "postgres"))]
            "postgres" => Err(KeygateError::ConfigError(
                "PostgreSQL support not compiled in. Enable the 'postgres' feature.".to_string(),
            )),
            other => Err(KeygateError::ConfigError(format!(
                "unsupported database type: {other}"
            ))),
        }
    }

    /// Create the `licenses` table if it does not exist yet.
    ///
    /// Called once at startup. Single table, keyed by unique `license_key`
    /// with a secondary immutable `id`.
    pub async fn init_schema(&self) -> KeygateResult<()> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                query(
                    r#"
                    CREATE TABLE IF NOT EXISTS licenses (
                        id                 TEXT PRIMARY KEY,
                        license_key        TEXT NOT NULL UNIQUE,
                        expiry_date        DATE NOT NULL,
                        allowed_machine_id TEXT,
                        status             TEXT NOT NULL DEFAULT 'ACTIVE',
                        created_at         TIMESTAMP NOT NULL,
                        last_check         TIMESTAMP,
                        zalo_id            TEXT,
                        activation_note    TEXT
                    )
                    "#,
                )
                .execute(pool)
                .await
                .map_err(|e| {
                    error!("SQLite init_schema failed: {e}");
                    KeygateError::ServerError(format!("database error: {e}"))
                })?;
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                query(
                    r#"
                    CREATE TABLE IF NOT EXISTS licenses (
                        id                 TEXT PRIMARY KEY,
                        license_key        TEXT NOT NULL UNIQUE,
                        expiry_date        DATE NOT NULL,
                        allowed_machine_id TEXT,
                        status             TEXT NOT NULL DEFAULT 'ACTIVE',
                        created_at         TIMESTAMP NOT NULL,
                        last_check         TIMESTAMP,
                        zalo_id            TEXT,
                        activation_note    TEXT
                    )
                    "#,
                )
                .execute(pool)
                .await
                .map_err(|e| {
                    error!("Postgres init_schema failed: {e}");
                    KeygateError::ServerError(format!("database error: {e}"))
                })?;
            }
        }

        Ok(())
    }

    /// Insert a newly created license.
    ///
    /// The caller is responsible for checking key uniqueness first; a
    /// constraint violation still surfaces as a `ServerError`.
    pub async fn insert_license(&self, license: &License) -> KeygateResult<()> {
        let row = LicenseRow::from(license);

        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                query(
                    r#"
                    INSERT INTO licenses (
                        id,
                        license_key,
                        expiry_date,
                        allowed_machine_id,
                        status,
                        created_at,
                        last_check,
                        zalo_id,
                        activation_note
                    )
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(&row.id)
                .bind(&row.license_key)
                .bind(row.expiry_date)
                .bind(&row.allowed_machine_id)
                .bind(&row.status)
                .bind(row.created_at)
                .bind(row.last_check)
                .bind(&row.zalo_id)
                .bind(&row.activation_note)
                .execute(pool)
                .await
                .map_err(|e| {
                    error!("SQLite insert_license failed: {e}");
                    KeygateError::ServerError(format!("database error: {e}"))
                })?;
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                query(
                    r#"
                    INSERT INTO licenses (
                        id,
                        license_key,
                        expiry_date,
                        allowed_machine_id,
                        status,
                        created_at,
                        last_check,
                        zalo_id,
                        activation_note
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                    "#,
                )
                .bind(&row.id)
                .bind(&row.license_key)
                .bind(row.expiry_date)
                .bind(&row.allowed_machine_id)
                .bind(&row.status)
                .bind(row.created_at)
                .bind(row.last_check)
                .bind(&row.zalo_id)
                .bind(&row.activation_note)
                .execute(pool)
                .await
                .map_err(|e| {
                    error!("Postgres insert_license failed: {e}");
                    KeygateError::ServerError(format!("database error: {e}"))
                })?;
            }
        }

        Ok(())
    }

    /// Fetch a license by its key.
    ///
    /// Returns:
    /// - `Ok(Some(License))` if found
    /// - `Ok(None)` if not found
    /// - `Err(KeygateError::ServerError)` on DB failure
    pub async fn get_by_key(&self, license_key: &str) -> KeygateResult<Option<License>> {
        let row = match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                query_as::<_, LicenseRow>("SELECT * FROM licenses WHERE license_key = ?")
                    .bind(license_key)
                    .fetch_optional(pool)
                    .await
                    .map_err(|e| {
                        error!("SQLite get_by_key failed: {e}");
                        KeygateError::ServerError(format!("database error: {e}"))
                    })?
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                query_as::<_, LicenseRow>("SELECT * FROM licenses WHERE license_key = $1")
                    .bind(license_key)
                    .fetch_optional(pool)
                    .await
                    .map_err(|e| {
                        error!("Postgres get_by_key failed: {e}");
                        KeygateError::ServerError(format!("database error: {e}"))
                    })?
            }
        };

        Ok(row.map(License::from))
    }

    /// Check whether a license key is already taken.
    pub async fn key_exists(&self, license_key: &str) -> KeygateResult<bool> {
        Ok(self.get_by_key(license_key).await?.is_some())
    }

    /// Write back the mutable fields of a license, keyed by `license_key`.
    ///
    /// `id`, `license_key` and `created_at` are immutable and never updated.
    pub async fn update_license(&self, license: &License) -> KeygateResult<bool> {
        let row = LicenseRow::from(license);

        let rows_affected = match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query(
                r#"
                UPDATE licenses SET
                    expiry_date        = ?,
                    allowed_machine_id = ?,
                    status             = ?,
                    last_check         = ?,
                    zalo_id            = ?,
                    activation_note    = ?
                WHERE license_key = ?
                "#,
            )
            .bind(row.expiry_date)
            .bind(&row.allowed_machine_id)
            .bind(&row.status)
            .bind(row.last_check)
            .bind(&row.zalo_id)
            .bind(&row.activation_note)
            .bind(&row.license_key)
            .execute(pool)
            .await
            .map_err(|e| {
                error!("SQLite update_license failed: {e}");
                KeygateError::ServerError(format!("database error: {e}"))
            })?
            .rows_affected(),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query(
                r#"
                UPDATE licenses SET
                    expiry_date        = $1,
                    allowed_machine_id = $2,
                    status             = $3,
                    last_check         = $4,
                    zalo_id            = $5,
                    activation_note    = $6
                WHERE license_key = $7
                "#,
            )
            .bind(row.expiry_date)
            .bind(&row.allowed_machine_id)
            .bind(&row.status)
            .bind(row.last_check)
            .bind(&row.zalo_id)
            .bind(&row.activation_note)
            .bind(&row.license_key)
            .execute(pool)
            .await
            .map_err(|e| {
                error!("Postgres update_license failed: {e}");
                KeygateError::ServerError(format!("database error: {e}"))
            })?
            .rows_affected(),
        };

        Ok(rows_affected > 0)
    }

    /// Permanently remove a license.
    ///
    /// Returns:
    /// - `Ok(true)` if a row was deleted
    /// - `Ok(false)` if no matching row was found
    pub async fn delete_by_key(&self, license_key: &str) -> KeygateResult<bool> {
        let rows_affected = match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query("DELETE FROM licenses WHERE license_key = ?")
                .bind(license_key)
                .execute(pool)
                .await
                .map_err(|e| {
                    error!("SQLite delete_by_key failed: {e}");
                    KeygateError::ServerError(format!("database error: {e}"))
                })?
                .rows_affected(),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query("DELETE FROM licenses WHERE license_key = $1")
                .bind(license_key)
                .execute(pool)
                .await
                .map_err(|e| {
                    error!("Postgres delete_by_key failed: {e}");
                    KeygateError::ServerError(format!("database error: {e}"))
                })?
                .rows_affected(),
        };

        Ok(rows_affected > 0)
    }

    /// Fetch every license, ordered by creation time. Full scan, used by
    /// the admin bulk export.
    pub async fn list_all(&self) -> KeygateResult<Vec<License>> {
        let rows = match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                query_as::<_, LicenseRow>("SELECT * FROM licenses ORDER BY created_at")
                    .fetch_all(pool)
                    .await
                    .map_err(|e| {
                        error!("SQLite list_all failed: {e}");
                        KeygateError::ServerError(format!("database error: {e}"))
                    })?
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                query_as::<_, LicenseRow>("SELECT * FROM licenses ORDER BY created_at")
                    .fetch_all(pool)
                    .await
                    .map_err(|e| {
                        error!("Postgres list_all failed: {e}");
                        KeygateError::ServerError(format!("database error: {e}"))
                    })?
            }
        };

        Ok(rows.into_iter().map(License::from).collect())
    }
}
