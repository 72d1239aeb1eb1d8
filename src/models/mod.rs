//! Validated domain objects.
//!
//! DESIGN
//! ======
//! Every response type is deserialized through a private wire struct and
//! converted with `TryFrom`, so malformed payloads fail at the service
//! boundary instead of reaching rendering code. Request payloads are plain
//! `Serialize` structs with an explicit `validate` step.

pub mod auth;
pub mod dashboard;
pub mod diagnosis;
pub mod ids;
pub mod patient;
pub mod profile;
pub mod record;

pub use auth::AuthNotice;
pub use dashboard::{ActivityPoint, DashboardStats, high_risk_count};
pub use diagnosis::{Confidence, Diagnosis, DiagnosisStatus, Explanation, LesionBox, Severity};
pub use ids::{DiagnosisId, PatientId, RecordId, UserId};
pub use patient::{Patient, PatientCreate, PatientUpdate, RiskLevel};
pub use profile::{Profile, ProfileUpdate};
pub use record::{Record, RecordCreate, RecordUpdate};

use time::Date;
use time::macros::format_description;

/// Parse a `YYYY-MM-DD` calendar date. A trailing time component
/// (`2024-03-01T09:30:00Z`) is ignored.
///
/// # Errors
///
/// Returns a description of the problem when the date is malformed.
pub fn parse_date(raw: &str) -> Result<Date, String> {
    let day = raw.trim().split(['T', ' ']).next().unwrap_or_default();
    Date::parse(day, format_description!("[year]-[month]-[day]")).map_err(|e| format!("{raw:?}: {e}"))
}

#[must_use]
pub fn format_date(date: Date) -> String {
    date.format(format_description!("[year]-[month]-[day]")).unwrap_or_else(|_| date.to_string())
}

/// Today in UTC, the reference point for derived ages.
#[must_use]
pub fn today() -> Date {
    time::OffsetDateTime::now_utc().date()
}

pub(crate) fn serialize_date<S>(date: &Date, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&format_date(*date))
}

pub(crate) fn serialize_opt_date<S>(date: &Option<Date>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match date {
        Some(date) => serializer.serialize_str(&format_date(*date)),
        None => serializer.serialize_none(),
    }
}

/// Empty strings from form-style backends mean "not set".
pub(crate) fn blank_to_none(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_owned()).filter(|v| !v.is_empty())
}

/// First non-blank value among the wire names for one field, in order.
pub(crate) fn first_text<const N: usize>(candidates: [Option<String>; N]) -> Option<String> {
    candidates.into_iter().find_map(blank_to_none)
}
