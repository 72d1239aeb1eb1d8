//! Patient demographics and the derived age/risk columns.

use std::fmt;

use serde::{Deserialize, Serialize};
use time::Date;

use super::{PatientId, blank_to_none, parse_date, serialize_date, serialize_opt_date};
use crate::error::ApiError;

/// Age at or above which a patient is shown as high risk.
pub const HIGH_RISK_AGE: u32 = 60;

/// Presentational risk badge derived from age. Not a clinical rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    High,
}

impl RiskLevel {
    #[must_use]
    pub fn from_age(age: u32) -> Self {
        if age >= HIGH_RISK_AGE { Self::High } else { Self::Low }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::High => "High",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whole years between `dob` and `today`, zero for future dates.
#[must_use]
pub fn age_on(dob: Date, today: Date) -> u32 {
    let mut years = today.year() - dob.year();
    if (u8::from(today.month()), today.day()) < (u8::from(dob.month()), dob.day()) {
        years -= 1;
    }
    u32::try_from(years).unwrap_or(0)
}

/// A patient as returned by `GET /patients/{id}/`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PatientWire")]
pub struct Patient {
    pub id: PatientId,
    pub first_name: String,
    pub last_name: String,
    #[serde(serialize_with = "serialize_date")]
    pub date_of_birth: Date,
    pub gender: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub blood_type: Option<String>,
    pub allergies: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    /// Date of the latest clinical visit, if any.
    #[serde(serialize_with = "serialize_opt_date")]
    pub last_visit: Option<Date>,
}

impl Patient {
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_owned()
    }

    #[must_use]
    pub fn age_on(&self, today: Date) -> u32 {
        age_on(self.date_of_birth, today)
    }

    #[must_use]
    pub fn risk_on(&self, today: Date) -> RiskLevel {
        RiskLevel::from_age(self.age_on(today))
    }

    /// Zero-padded id as shown in tables, e.g. `#0007`.
    #[must_use]
    pub fn display_id(&self) -> String {
        format!("#{:04}", self.id.0)
    }
}

#[derive(Deserialize)]
struct PatientWire {
    id: PatientId,
    first_name: String,
    last_name: String,
    date_of_birth: String,
    #[serde(default)]
    gender: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    phone: Option<String>,
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    blood_type: Option<String>,
    #[serde(default)]
    allergies: Option<String>,
    #[serde(default)]
    emergency_contact_name: Option<String>,
    #[serde(default)]
    emergency_contact_phone: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    updated_at: Option<String>,
    #[serde(default)]
    last_visit: Option<String>,
}

impl TryFrom<PatientWire> for Patient {
    type Error = String;

    fn try_from(wire: PatientWire) -> Result<Self, Self::Error> {
        let date_of_birth = parse_date(&wire.date_of_birth).map_err(|e| format!("date_of_birth {e}"))?;
        let last_visit = blank_to_none(wire.last_visit)
            .map(|raw| parse_date(&raw).map_err(|e| format!("last_visit {e}")))
            .transpose()?;
        Ok(Self {
            id: wire.id,
            first_name: wire.first_name.trim().to_owned(),
            last_name: wire.last_name.trim().to_owned(),
            date_of_birth,
            gender: blank_to_none(wire.gender).unwrap_or_default(),
            email: blank_to_none(wire.email),
            phone: blank_to_none(wire.phone),
            address: blank_to_none(wire.address),
            blood_type: blank_to_none(wire.blood_type),
            allergies: blank_to_none(wire.allergies),
            emergency_contact_name: blank_to_none(wire.emergency_contact_name),
            emergency_contact_phone: blank_to_none(wire.emergency_contact_phone),
            created_at: blank_to_none(wire.created_at),
            updated_at: blank_to_none(wire.updated_at),
            last_visit,
        })
    }
}

/// Body of `POST /patients/` and `PUT /patients/{id}/`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PatientCreate {
    pub first_name: String,
    pub last_name: String,
    #[serde(serialize_with = "serialize_date")]
    pub date_of_birth: Date,
    pub gender: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blood_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allergies: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emergency_contact_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emergency_contact_phone: Option<String>,
}

impl PatientCreate {
    #[must_use]
    pub fn new(first_name: &str, last_name: &str, date_of_birth: Date, gender: &str) -> Self {
        Self {
            first_name: first_name.trim().to_owned(),
            last_name: last_name.trim().to_owned(),
            date_of_birth,
            gender: gender.trim().to_owned(),
            email: None,
            phone: None,
            address: None,
            blood_type: None,
            allergies: None,
            emergency_contact_name: None,
            emergency_contact_phone: None,
        }
    }

    /// # Errors
    ///
    /// Returns [`ApiError::Invalid`] when a required field is blank or the
    /// email has no `@`.
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.first_name.trim().is_empty() || self.last_name.trim().is_empty() {
            return Err(ApiError::Invalid("first and last name are required".to_owned()));
        }
        if self.gender.trim().is_empty() {
            return Err(ApiError::Invalid("gender is required".to_owned()));
        }
        if self.date_of_birth > super::today() {
            return Err(ApiError::Invalid("date of birth is in the future".to_owned()));
        }
        validate_email(self.email.as_deref())
    }
}

/// Body of `PATCH /patients/{id}/`. Only set fields are sent.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct PatientUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "serialize_opt_date")]
    pub date_of_birth: Option<Date>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blood_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allergies: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emergency_contact_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emergency_contact_phone: Option<String>,
}

impl PatientUpdate {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// # Errors
    ///
    /// Returns [`ApiError::Invalid`] for an empty patch, a blanked-out
    /// required field, or a malformed email.
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.is_empty() {
            return Err(ApiError::Invalid("nothing to update".to_owned()));
        }
        for (name, value) in [("first_name", &self.first_name), ("last_name", &self.last_name), ("gender", &self.gender)] {
            if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
                return Err(ApiError::Invalid(format!("{name} cannot be blank")));
            }
        }
        validate_email(self.email.as_deref())
    }
}

fn validate_email(email: Option<&str>) -> Result<(), ApiError> {
    match email {
        Some(email) if !email.contains('@') => Err(ApiError::Invalid(format!("{email:?} is not an email address"))),
        _ => Ok(()),
    }
}

#[cfg(test)]
#[path = "patient_test.rs"]
mod tests;
