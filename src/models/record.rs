//! Clinical visit records. Their lifecycle is independent of AI diagnoses.

use serde::{Deserialize, Serialize};
use time::Date;

use super::{PatientId, RecordId, UserId, blank_to_none, parse_date, serialize_opt_date};
use crate::error::ApiError;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RecordWire")]
pub struct Record {
    pub id: RecordId,
    pub patient: PatientId,
    pub created_by: Option<UserId>,
    pub record_type: String,
    pub title: String,
    pub description: Option<String>,
    pub diagnosis: Option<String>,
    pub prescription: Option<String>,
    pub notes: Option<String>,
    #[serde(serialize_with = "serialize_opt_date")]
    pub visit_date: Option<Date>,
    #[serde(serialize_with = "serialize_opt_date")]
    pub follow_up_date: Option<Date>,
    pub attachments: Vec<serde_json::Value>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

#[derive(Deserialize)]
struct RecordWire {
    id: RecordId,
    patient: PatientId,
    #[serde(default)]
    created_by: Option<UserId>,
    #[serde(default)]
    record_type: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    diagnosis: Option<String>,
    #[serde(default)]
    prescription: Option<String>,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    visit_date: Option<String>,
    #[serde(default)]
    follow_up_date: Option<String>,
    #[serde(default)]
    attachments: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    updated_at: Option<String>,
}

impl TryFrom<RecordWire> for Record {
    type Error = String;

    fn try_from(wire: RecordWire) -> Result<Self, Self::Error> {
        let parse_opt = |field: &str, raw: Option<String>| {
            blank_to_none(raw)
                .map(|r| parse_date(&r).map_err(|e| format!("{field} {e}")))
                .transpose()
        };
        Ok(Self {
            id: wire.id,
            patient: wire.patient,
            created_by: wire.created_by,
            record_type: blank_to_none(wire.record_type).unwrap_or_else(|| "general".to_owned()),
            title: blank_to_none(wire.title).unwrap_or_default(),
            description: blank_to_none(wire.description),
            diagnosis: blank_to_none(wire.diagnosis),
            prescription: blank_to_none(wire.prescription),
            notes: blank_to_none(wire.notes),
            visit_date: parse_opt("visit_date", wire.visit_date)?,
            follow_up_date: parse_opt("follow_up_date", wire.follow_up_date)?,
            attachments: wire.attachments.unwrap_or_default(),
            created_at: blank_to_none(wire.created_at),
            updated_at: blank_to_none(wire.updated_at),
        })
    }
}

/// Body of `POST /records/` and `PUT /records/{id}/`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RecordCreate {
    pub patient: PatientId,
    pub record_type: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnosis: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prescription: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "serialize_opt_date")]
    pub visit_date: Option<Date>,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "serialize_opt_date")]
    pub follow_up_date: Option<Date>,
}

impl RecordCreate {
    #[must_use]
    pub fn new(patient: PatientId, record_type: &str, title: &str) -> Self {
        Self {
            patient,
            record_type: record_type.trim().to_owned(),
            title: title.trim().to_owned(),
            description: None,
            diagnosis: None,
            prescription: None,
            notes: None,
            visit_date: None,
            follow_up_date: None,
        }
    }

    /// # Errors
    ///
    /// Returns [`ApiError::Invalid`] for a blank title/type or a follow-up
    /// scheduled before the visit.
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.title.trim().is_empty() {
            return Err(ApiError::Invalid("record title is required".to_owned()));
        }
        if self.record_type.trim().is_empty() {
            return Err(ApiError::Invalid("record type is required".to_owned()));
        }
        check_follow_up(self.visit_date, self.follow_up_date)
    }
}

/// Body of `PATCH /records/{id}/`.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RecordUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnosis: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prescription: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "serialize_opt_date")]
    pub visit_date: Option<Date>,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "serialize_opt_date")]
    pub follow_up_date: Option<Date>,
}

impl RecordUpdate {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// # Errors
    ///
    /// Returns [`ApiError::Invalid`] for an empty patch or a blanked title.
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.is_empty() {
            return Err(ApiError::Invalid("nothing to update".to_owned()));
        }
        if self.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(ApiError::Invalid("title cannot be blank".to_owned()));
        }
        check_follow_up(self.visit_date, self.follow_up_date)
    }
}

fn check_follow_up(visit: Option<Date>, follow_up: Option<Date>) -> Result<(), ApiError> {
    match (visit, follow_up) {
        (Some(visit), Some(follow_up)) if follow_up < visit => {
            Err(ApiError::Invalid("follow-up date precedes the visit".to_owned()))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
#[path = "record_test.rs"]
mod tests;
