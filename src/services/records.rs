//! Clinical record CRUD.

use crate::error::ApiError;
use crate::models::{PatientId, Record, RecordCreate, RecordId, RecordUpdate};
use crate::net::client::Access;
use crate::net::{ApiClient, Query};
use crate::table::SortOrder;

/// Server-side filters for `GET /records/`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordQuery {
    pub patient: Option<PatientId>,
    pub record_type: Option<String>,
    pub search: Option<String>,
    /// Backend field name, e.g. `visit_date`.
    pub sort_by: Option<String>,
    pub order: Option<SortOrder>,
}

impl RecordQuery {
    #[must_use]
    pub fn params(&self) -> Query {
        Query::new()
            .with_opt("patient_id", self.patient)
            .with_opt("record_type", self.record_type.as_deref())
            .with_opt("search", self.search.as_deref())
            .with_opt("sort_by", self.sort_by.as_deref())
            .with_opt("order", self.order)
    }
}

impl ApiClient {
    /// # Errors
    ///
    /// Returns an error if the request fails or a row fails validation.
    pub async fn list_records(&self, query: &RecordQuery) -> Result<Vec<Record>, ApiError> {
        self.get_list("/records/", &query.params()).await
    }

    /// # Errors
    ///
    /// Returns an error if the request fails; 404 for unknown ids.
    pub async fn get_record(&self, id: RecordId) -> Result<Record, ApiError> {
        self.get(&format!("/records/{id}/"), &Query::new()).await
    }

    /// # Errors
    ///
    /// Returns [`ApiError::Invalid`] before sending, or the backend's
    /// field errors.
    pub async fn create_record(&self, record: &RecordCreate) -> Result<Record, ApiError> {
        record.validate()?;
        self.post("/records/", record, Access::Protected).await
    }

    /// # Errors
    ///
    /// Returns [`ApiError::Invalid`] for an empty or inconsistent patch.
    pub async fn update_record(&self, id: RecordId, update: &RecordUpdate) -> Result<Record, ApiError> {
        update.validate()?;
        self.patch(&format!("/records/{id}/"), update).await
    }

    /// # Errors
    ///
    /// Returns [`ApiError::Invalid`] before sending, or the backend's
    /// field errors.
    pub async fn replace_record(&self, id: RecordId, record: &RecordCreate) -> Result<Record, ApiError> {
        record.validate()?;
        self.put(&format!("/records/{id}/"), record).await
    }

    /// # Errors
    ///
    /// Returns an error if the backend refuses the delete.
    pub async fn delete_record(&self, id: RecordId) -> Result<(), ApiError> {
        self.delete(&format!("/records/{id}/")).await
    }
}

#[cfg(test)]
#[path = "records_test.rs"]
mod tests;
