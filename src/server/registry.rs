//! The License Registry: owns the license state machine and enforces all
//! transition preconditions.
//!
//! Every operation is a single record read-modify-write against the store.
//! Timestamps are passed in by the caller so tests can pin the clock; the
//! HTTP layer always passes `Utc::now()`.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use thiserror::Error;
use tracing::info;

use crate::errors::KeygateError;
use crate::license::{evaluate, Binding, Decision, License, LicenseStatus};
use crate::server::database::Database;

/// Business outcomes of registry operations.
///
/// All variants are expected, recoverable-by-caller conditions; `Store`
/// wraps infrastructure failures bubbling up from the database.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("license not found")]
    NotFound,

    #[error("license key already exists")]
    DuplicateKey,

    #[error("license has expired")]
    Expired,

    /// The license carries a non-active status (`EXPIRED`, `BLOCKED`, or an
    /// admin-set value outside the machine-written set).
    #[error("license is {0}")]
    NotActive(LicenseStatus),

    #[error("machine id mismatch")]
    MachineMismatch,

    #[error(transparent)]
    Store(#[from] KeygateError),
}

/// The registry over a shared store handle. Cheap to clone.
#[derive(Clone)]
pub struct Registry {
    db: Arc<Database>,
}

impl Registry {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    /// Issue a new license: status `ACTIVE`, unbound, `created_at = now`.
    ///
    /// Fails with `DuplicateKey` if the key is already taken. Input
    /// presence and date format are checked at the HTTP boundary.
    pub async fn create(
        &self,
        license_key: &str,
        expiry_date: NaiveDate,
        zalo_id: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<License, RegistryError> {
        if self.db.key_exists(license_key).await? {
            return Err(RegistryError::DuplicateKey);
        }

        let license = License::new(license_key, expiry_date, zalo_id, now);
        self.db.insert_license(&license).await?;

        info!(
            "Created license license_key={} expiry_date={}",
            license.license_key, license.expiry_date
        );

        Ok(license)
    }

    /// Bind a license to a machine, or confirm an existing binding.
    ///
    /// Idempotent for the same machine id. A different machine id is
    /// rejected without touching the record; the lazy expiry flip is
    /// persisted before rejection when the date has passed.
    pub async fn activate(
        &self,
        license_key: &str,
        machine_id: &str,
        now: DateTime<Utc>,
    ) -> Result<License, RegistryError> {
        let mut license = self
            .db
            .get_by_key(license_key)
            .await?
            .ok_or(RegistryError::NotFound)?;

        self.check_usable(&mut license, machine_id, now, Binding::MayBind)
            .await?;

        license.allowed_machine_id = Some(machine_id.to_string());
        license.last_check = Some(now.naive_utc());
        license.activation_note = Some(activation_note(machine_id));
        self.db.update_license(&license).await?;

        info!(
            "Activated license license_key={} machine_id={}",
            license.license_key, machine_id
        );

        Ok(license)
    }

    /// Confirm a license is still usable from its bound machine.
    ///
    /// Never binds: an unbound license mismatches every machine id. On
    /// success only `last_check` is updated.
    pub async fn validate(
        &self,
        license_key: &str,
        machine_id: &str,
        now: DateTime<Utc>,
    ) -> Result<License, RegistryError> {
        let mut license = self
            .db
            .get_by_key(license_key)
            .await?
            .ok_or(RegistryError::NotFound)?;

        self.check_usable(&mut license, machine_id, now, Binding::MustMatch)
            .await?;

        license.last_check = Some(now.naive_utc());
        self.db.update_license(&license).await?;

        Ok(license)
    }

    /// Push the expiry date out by `days_to_add` and force status `ACTIVE`.
    ///
    /// The baseline is `max(expiry_date, today)`: reviving an expired
    /// license starts the new period from today, never from the stale
    /// date. Negative values are accepted and shorten the license.
    pub async fn extend(
        &self,
        license_key: &str,
        days_to_add: i64,
        now: DateTime<Utc>,
    ) -> Result<NaiveDate, RegistryError> {
        let mut license = self
            .db
            .get_by_key(license_key)
            .await?
            .ok_or(RegistryError::NotFound)?;

        let today = now.date_naive();
        let baseline = if license.expiry_date >= today {
            license.expiry_date
        } else {
            today
        };

        license.expiry_date = baseline + Duration::days(days_to_add);
        license.status = LicenseStatus::Active;
        self.db.update_license(&license).await?;

        info!(
            "Extended license license_key={} days={} new_expiry_date={}",
            license.license_key, days_to_add, license.expiry_date
        );

        Ok(license.expiry_date)
    }

    /// Admin override for lost or replaced devices: unconditionally rebind
    /// the license and force status `ACTIVE`, bypassing the mismatch check.
    pub async fn relicense(
        &self,
        license_key: &str,
        new_machine_id: &str,
    ) -> Result<String, RegistryError> {
        let mut license = self
            .db
            .get_by_key(license_key)
            .await?
            .ok_or(RegistryError::NotFound)?;

        license.allowed_machine_id = Some(new_machine_id.to_string());
        license.status = LicenseStatus::Active;
        self.db.update_license(&license).await?;

        info!(
            "Re-licensed license_key={} new_machine_id={}",
            license.license_key, new_machine_id
        );

        Ok(new_machine_id.to_string())
    }

    /// Permanently remove a license. No soft delete.
    pub async fn delete(&self, license_key: &str) -> Result<(), RegistryError> {
        if !self.db.delete_by_key(license_key).await? {
            return Err(RegistryError::NotFound);
        }

        info!("Deleted license license_key={license_key}");

        Ok(())
    }

    /// Every license, full field set, for bulk export. No pagination.
    pub async fn list_all(&self) -> Result<Vec<License>, RegistryError> {
        Ok(self.db.list_all().await?)
    }

    /// Run the shared usability check, persisting the lazy
    /// `ACTIVE -> EXPIRED` flip the first time an overdue date is seen.
    async fn check_usable(
        &self,
        license: &mut License,
        machine_id: &str,
        now: DateTime<Utc>,
        binding: Binding,
    ) -> Result<(), RegistryError> {
        match evaluate(license, machine_id, now.date_naive(), binding) {
            Decision::Usable => Ok(()),
            Decision::Expired => {
                if license.status != LicenseStatus::Expired {
                    license.status = LicenseStatus::Expired;
                    self.db.update_license(license).await?;
                }
                Err(RegistryError::Expired)
            }
            Decision::NotActive(status) => Err(RegistryError::NotActive(status)),
            Decision::MachineMismatch => Err(RegistryError::MachineMismatch),
        }
    }
}

/// Note recorded on the license at activation time.
fn activation_note(machine_id: &str) -> String {
    let prefix: String = machine_id.chars().take(10).collect();
    format!("Activated ID: {prefix}...")
}
