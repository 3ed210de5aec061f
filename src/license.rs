//! The license entity and its transition rules.
//!
//! This module is pure domain logic: no persistence, no HTTP. The store
//! speaks raw rows (`server::database::LicenseRow`) and converts to and
//! from the types here; handlers only ever see `License` values.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use uuid::Uuid;

/// Lifecycle status of a license.
///
/// Only `Active` and `Expired` are written by the registry itself.
/// Administrators may set other values (e.g. `BLOCKED`) directly in the
/// store; those round-trip through `Other` and are rejected by activation
/// and validation like any non-active status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LicenseStatus {
    Active,
    Expired,
    Blocked,
    Other(String),
}

impl LicenseStatus {
    pub fn as_str(&self) -> &str {
        match self {
            LicenseStatus::Active => "ACTIVE",
            LicenseStatus::Expired => "EXPIRED",
            LicenseStatus::Blocked => "BLOCKED",
            LicenseStatus::Other(s) => s.as_str(),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, LicenseStatus::Active)
    }
}

impl From<&str> for LicenseStatus {
    fn from(s: &str) -> Self {
        match s {
            "ACTIVE" => LicenseStatus::Active,
            "EXPIRED" => LicenseStatus::Expired,
            "BLOCKED" => LicenseStatus::Blocked,
            other => LicenseStatus::Other(other.to_string()),
        }
    }
}

impl fmt::Display for LicenseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A license record.
///
/// `license_key` is the client-facing lookup key and is immutable after
/// creation, as is the opaque `id`. `allowed_machine_id` is set on first
/// activation and only changes again through an admin re-license or delete.
#[derive(Debug, Clone, PartialEq)]
pub struct License {
    pub id: String,
    pub license_key: String,
    pub expiry_date: NaiveDate,
    pub allowed_machine_id: Option<String>,
    pub status: LicenseStatus,
    pub created_at: NaiveDateTime,
    pub last_check: Option<NaiveDateTime>,
    pub zalo_id: Option<String>,
    pub activation_note: Option<String>,
}

impl License {
    /// Build a fresh, unbound license: status `ACTIVE`, no machine, no checks.
    pub fn new(
        license_key: impl Into<String>,
        expiry_date: NaiveDate,
        zalo_id: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            license_key: license_key.into(),
            expiry_date,
            allowed_machine_id: None,
            status: LicenseStatus::Active,
            created_at: now.naive_utc(),
            last_check: None,
            zalo_id,
            activation_note: None,
        }
    }

    /// A license is valid only while `today <= expiry_date`.
    pub fn is_expired_on(&self, today: NaiveDate) -> bool {
        self.expiry_date < today
    }
}

/// Whether an evaluation may bind an unbound license to the caller's machine.
///
/// Activation uses `MayBind`: an unset `allowed_machine_id` (or an exact
/// match) is acceptable. Validation uses `MustMatch`: the machine must
/// already be bound and identical, so a never-activated license always
/// mismatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    MayBind,
    MustMatch,
}

/// Outcome of the usability check shared by activation and validation.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Usable,
    Expired,
    NotActive(LicenseStatus),
    MachineMismatch,
}

/// Decide whether `license` is usable from `machine_id` as of `today`.
///
/// Checks run in a fixed order: expiry first, then status, then machine
/// binding. On `Expired` the caller is expected to persist the lazy
/// `ACTIVE -> EXPIRED` flip; re-running the check afterwards still yields
/// `Expired`, so the transition is idempotent.
pub fn evaluate(license: &License, machine_id: &str, today: NaiveDate, binding: Binding) -> Decision {
    if license.is_expired_on(today) {
        return Decision::Expired;
    }

    if !license.status.is_active() {
        return Decision::NotActive(license.status.clone());
    }

    let matches = match binding {
        Binding::MayBind => license
            .allowed_machine_id
            .as_deref()
            .map_or(true, |bound| bound == machine_id),
        Binding::MustMatch => license.allowed_machine_id.as_deref() == Some(machine_id),
    };

    if matches {
        Decision::Usable
    } else {
        Decision::MachineMismatch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn license(expiry: NaiveDate, machine: Option<&str>, status: LicenseStatus) -> License {
        let mut l = License::new("KEY1", expiry, None, Utc::now());
        l.allowed_machine_id = machine.map(String::from);
        l.status = status;
        l
    }

    #[test]
    fn status_round_trips_unknown_values() {
        assert_eq!(LicenseStatus::from("ACTIVE"), LicenseStatus::Active);
        assert_eq!(LicenseStatus::from("EXPIRED"), LicenseStatus::Expired);
        assert_eq!(LicenseStatus::from("BLOCKED"), LicenseStatus::Blocked);

        let odd = LicenseStatus::from("SUSPENDED");
        assert_eq!(odd, LicenseStatus::Other("SUSPENDED".to_string()));
        assert_eq!(odd.as_str(), "SUSPENDED");
        assert!(!odd.is_active());
    }

    #[test]
    fn new_license_starts_active_and_unbound() {
        let l = License::new("KEY1", date(2099, 1, 1), Some("zalo".into()), Utc::now());
        assert_eq!(l.status, LicenseStatus::Active);
        assert!(l.allowed_machine_id.is_none());
        assert!(l.last_check.is_none());
        assert!(!l.id.is_empty());
    }

    #[test]
    fn expiry_is_inclusive_of_the_last_day() {
        let l = license(date(2025, 6, 15), None, LicenseStatus::Active);
        assert!(!l.is_expired_on(date(2025, 6, 15)));
        assert!(l.is_expired_on(date(2025, 6, 16)));
    }

    #[test]
    fn expiry_wins_over_every_other_check() {
        let l = license(date(2025, 1, 1), Some("M1"), LicenseStatus::Blocked);
        assert_eq!(
            evaluate(&l, "M2", date(2025, 2, 1), Binding::MustMatch),
            Decision::Expired
        );
        assert_eq!(
            evaluate(&l, "M2", date(2025, 2, 1), Binding::MayBind),
            Decision::Expired
        );
    }

    #[test]
    fn non_active_status_is_rejected_regardless_of_machine() {
        let l = license(date(2099, 1, 1), Some("M1"), LicenseStatus::Blocked);
        assert_eq!(
            evaluate(&l, "M1", date(2025, 1, 1), Binding::MustMatch),
            Decision::NotActive(LicenseStatus::Blocked)
        );

        let l = license(date(2099, 1, 1), Some("M1"), LicenseStatus::Other("PAUSED".into()));
        assert_eq!(
            evaluate(&l, "M1", date(2025, 1, 1), Binding::MayBind),
            Decision::NotActive(LicenseStatus::Other("PAUSED".into()))
        );
    }

    #[test]
    fn may_bind_accepts_unbound_or_same_machine() {
        let unbound = license(date(2099, 1, 1), None, LicenseStatus::Active);
        assert_eq!(
            evaluate(&unbound, "M1", date(2025, 1, 1), Binding::MayBind),
            Decision::Usable
        );

        let bound = license(date(2099, 1, 1), Some("M1"), LicenseStatus::Active);
        assert_eq!(
            evaluate(&bound, "M1", date(2025, 1, 1), Binding::MayBind),
            Decision::Usable
        );
        assert_eq!(
            evaluate(&bound, "M2", date(2025, 1, 1), Binding::MayBind),
            Decision::MachineMismatch
        );
    }

    #[test]
    fn must_match_never_accepts_an_unbound_license() {
        let unbound = license(date(2099, 1, 1), None, LicenseStatus::Active);
        assert_eq!(
            evaluate(&unbound, "M1", date(2025, 1, 1), Binding::MustMatch),
            Decision::MachineMismatch
        );

        let bound = license(date(2099, 1, 1), Some("M1"), LicenseStatus::Active);
        assert_eq!(
            evaluate(&bound, "M1", date(2025, 1, 1), Binding::MustMatch),
            Decision::Usable
        );
        assert_eq!(
            evaluate(&bound, "M2", date(2025, 1, 1), Binding::MustMatch),
            Decision::MachineMismatch
        );
    }
}
