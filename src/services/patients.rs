//! Patient CRUD.

use crate::error::ApiError;
use crate::models::{Patient, PatientCreate, PatientId, PatientUpdate, Record};
use crate::net::client::Access;
use crate::net::{ApiClient, Query};
use crate::table::{SortKey, SortOrder};

/// Server-side filters for `GET /patients/`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatientQuery {
    pub search: Option<String>,
    pub min_age: Option<u32>,
    pub max_age: Option<u32>,
    pub sort_by: Option<SortKey>,
    pub order: Option<SortOrder>,
}

impl PatientQuery {
    #[must_use]
    pub fn params(&self) -> Query {
        Query::new()
            .with_opt("search", self.search.as_deref())
            .with_opt("min_age", self.min_age)
            .with_opt("max_age", self.max_age)
            .with_opt("sort_by", self.sort_by)
            .with_opt("order", self.order)
    }
}

impl ApiClient {
    /// # Errors
    ///
    /// Returns an error if the request fails or a row fails validation.
    pub async fn list_patients(&self, query: &PatientQuery) -> Result<Vec<Patient>, ApiError> {
        self.get_list("/patients/", &query.params()).await
    }

    /// # Errors
    ///
    /// Returns an error if the request fails; 404 for unknown ids.
    pub async fn get_patient(&self, id: PatientId) -> Result<Patient, ApiError> {
        self.get(&format!("/patients/{id}/"), &Query::new()).await
    }

    /// # Errors
    ///
    /// Returns [`ApiError::Invalid`] before sending, or the backend's
    /// field errors.
    pub async fn create_patient(&self, patient: &PatientCreate) -> Result<Patient, ApiError> {
        patient.validate()?;
        self.post("/patients/", patient, Access::Protected).await
    }

    /// Partial update. Sending the same patch twice leaves the same state.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Invalid`] for an empty or malformed patch.
    pub async fn update_patient(&self, id: PatientId, update: &PatientUpdate) -> Result<Patient, ApiError> {
        update.validate()?;
        self.patch(&format!("/patients/{id}/"), update).await
    }

    /// Full replacement of every editable field.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Invalid`] before sending, or the backend's
    /// field errors.
    pub async fn replace_patient(&self, id: PatientId, patient: &PatientCreate) -> Result<Patient, ApiError> {
        patient.validate()?;
        self.put(&format!("/patients/{id}/"), patient).await
    }

    /// # Errors
    ///
    /// Returns an error if the backend refuses the delete.
    pub async fn delete_patient(&self, id: PatientId) -> Result<(), ApiError> {
        self.delete(&format!("/patients/{id}/")).await
    }

    /// Visit history for one patient, optionally narrowed to a record type.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or a record fails validation.
    pub async fn patient_records(&self, id: PatientId, record_type: Option<&str>) -> Result<Vec<Record>, ApiError> {
        let query = Query::new().with_opt("record_type", record_type);
        self.get_list(&format!("/patients/{id}/records/"), &query).await
    }
}

#[cfg(test)]
#[path = "patients_test.rs"]
mod tests;
