//! AI scan upload, diagnosis retrieval and explainability overlays.

use std::path::Path;

use reqwest::multipart::{Form, Part};
use tracing::info;

use crate::error::ApiError;
use crate::models::{Diagnosis, DiagnosisId, Explanation, PatientId};
use crate::net::{ApiClient, Query};
use crate::poll::DiagnosisSource;

impl ApiClient {
    /// Upload a radiograph from disk for analysis.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Invalid`] if the file cannot be read or is not
    /// an image, otherwise the backend's rejection.
    pub async fn upload_scan(&self, patient: PatientId, path: &Path) -> Result<Diagnosis, ApiError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ApiError::Invalid(format!("cannot read {}: {e}", path.display())))?;
        let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("scan").to_owned();
        self.upload_scan_bytes(patient, &file_name, bytes).await
    }

    /// Multipart `POST /ai/upload/` with `image` and `patient_id` parts.
    /// The returned diagnosis is usually still pending.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Invalid`] for empty or non-image payloads.
    pub async fn upload_scan_bytes(
        &self,
        patient: PatientId,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<Diagnosis, ApiError> {
        if bytes.is_empty() {
            return Err(ApiError::Invalid(format!("{file_name} is empty")));
        }
        let mime = mime_guess::from_path(file_name)
            .first()
            .filter(|m| m.type_() == mime_guess::mime::IMAGE)
            .ok_or_else(|| ApiError::Invalid(format!("{file_name} is not a supported image type")))?;
        let size = bytes.len();
        let part = Part::bytes(bytes)
            .file_name(file_name.to_owned())
            .mime_str(mime.essence_str())
            .map_err(|e| ApiError::Invalid(e.to_string()))?;
        let form = Form::new().part("image", part).text("patient_id", patient.to_string());

        let diagnosis: Diagnosis = self.post_form("/ai/upload/", form).await?;
        info!(%patient, diagnosis = %diagnosis.id, size, "scan uploaded");
        Ok(diagnosis)
    }

    /// # Errors
    ///
    /// Returns an error if the request fails or the payload is invalid.
    pub async fn get_diagnosis(&self, id: DiagnosisId) -> Result<Diagnosis, ApiError> {
        self.get(&format!("/ai/diagnosis/{id}/"), &Query::new()).await
    }

    /// Recent scans across all patients, newest first as the backend sends
    /// them.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or a row fails validation.
    pub async fn list_diagnoses(&self) -> Result<Vec<Diagnosis>, ApiError> {
        self.get_list("/ai/diagnosis/all/", &Query::new()).await
    }

    /// # Errors
    ///
    /// Returns an error if the backend refuses the delete.
    pub async fn delete_diagnosis(&self, id: DiagnosisId) -> Result<(), ApiError> {
        self.delete(&format!("/ai/diagnosis/{id}/delete/")).await
    }

    /// Full explainability heat-map for a completed diagnosis.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or carries no image.
    pub async fn explain(&self, id: DiagnosisId) -> Result<Explanation, ApiError> {
        self.get(&format!("/ai/explain/{id}/"), &Query::new()).await
    }

    /// Cheaper, lower-resolution variant of [`ApiClient::explain`].
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or carries no image.
    pub async fn quick_explain(&self, id: DiagnosisId) -> Result<Explanation, ApiError> {
        self.get(&format!("/ai/explain/quick/{id}/"), &Query::new()).await
    }
}

#[async_trait::async_trait]
impl DiagnosisSource for ApiClient {
    async fn fetch_diagnosis(&self, id: DiagnosisId) -> Result<Diagnosis, ApiError> {
        self.get_diagnosis(id).await
    }
}

#[cfg(test)]
#[path = "diagnoses_test.rs"]
mod tests;
