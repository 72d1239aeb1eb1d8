//! Avatar uploads to the public storage bucket.
//!
//! The bucket speaks the Supabase storage REST dialect: objects are written
//! with `POST /storage/v1/object/{bucket}/{key}` (upsert enabled) and read
//! back from `/storage/v1/object/public/{bucket}/{key}`.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::{ClientConfig, StorageConfig};
use crate::error::ApiError;
use crate::models::UserId;

#[derive(Debug, Clone)]
pub struct AvatarStorage {
    http: reqwest::Client,
    config: StorageConfig,
}

impl AvatarStorage {
    /// # Errors
    ///
    /// Returns [`ApiError::Storage`] when the bucket is not configured or
    /// the HTTP client cannot be built.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ApiError> {
        let storage = config.storage.clone().ok_or_else(|| {
            ApiError::Storage("set DENTALSCOPE_STORAGE_URL and DENTALSCOPE_STORAGE_KEY to enable avatars".to_owned())
        })?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeouts.request_secs))
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()
            .map_err(|e| ApiError::Storage(e.to_string()))?;
        Ok(Self { http, config: storage })
    }

    /// `<user_id>/<uuid>.<ext>`, with the extension taken from `file_name`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Invalid`] unless `file_name` names an image.
    pub fn object_key(user: UserId, file_name: &str) -> Result<String, ApiError> {
        let ext = std::path::Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .filter(|e| mime_guess::from_ext(e).first().is_some_and(|m| m.type_() == mime_guess::mime::IMAGE))
            .ok_or_else(|| ApiError::Invalid(format!("{file_name} is not an image")))?;
        Ok(format!("{user}/{}.{ext}", Uuid::new_v4()))
    }

    #[must_use]
    pub fn public_url(&self, key: &str) -> String {
        format!("{}/storage/v1/object/public/{}/{key}", self.config.url, self.config.bucket)
    }

    /// Write (or overwrite) `key` and return its public URL.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Storage`] if the bucket rejects the upload.
    pub async fn upload(&self, key: &str, bytes: Vec<u8>) -> Result<String, ApiError> {
        let content_type = mime_guess::from_path(key).first_or_octet_stream();
        let url = format!("{}/storage/v1/object/{}/{key}", self.config.url, self.config.bucket);
        debug!(key, size = bytes.len(), "uploading avatar");

        let response = self
            .http
            .post(&url)
            .header(AUTHORIZATION, format!("Bearer {}", self.config.key))
            .header("apikey", &self.config.key)
            .header("x-upsert", "true")
            .header(CONTENT_TYPE, content_type.essence_str())
            .body(bytes)
            .send()
            .await
            .map_err(|e| ApiError::Storage(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ApiError::Storage(storage_message(status.as_u16(), &text)));
        }

        let public = self.public_url(key);
        info!(key, "avatar stored");
        Ok(public)
    }
}

fn storage_message(status: u16, body: &str) -> String {
    let detail = serde_json::from_str::<Value>(body).ok().and_then(|v| {
        ["message", "error"].iter().find_map(|k| v.get(*k).and_then(Value::as_str).map(str::to_owned))
    });
    match detail {
        Some(detail) => format!("{status}: {detail}"),
        None if body.trim().is_empty() => format!("bucket returned {status}"),
        None => format!("{status}: {}", body.trim()),
    }
}

#[cfg(test)]
#[path = "storage_test.rs"]
mod tests;
