//! Per-resource REST wrappers.
//!
//! SYSTEM CONTEXT
//! ==============
//! Each submodule adds an `impl ApiClient` block for one backend resource
//! (auth, patients, records, AI diagnoses, profile, dashboard). Methods
//! validate caller input, make exactly one request, and return validated
//! `models` types. `storage` is the exception: it talks to the avatar
//! bucket rather than the dashboard backend.

pub mod auth;
pub mod dashboard;
pub mod diagnoses;
pub mod patients;
pub mod profile;
pub mod records;
pub mod storage;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ApiError;
use crate::net::{ApiClient, Query};

impl ApiClient {
    /// GET a collection. Accepts a bare array or a paginated
    /// `{"results": [...]}` envelope.
    pub(crate) async fn get_list<T: DeserializeOwned>(&self, path: &str, query: &Query) -> Result<Vec<T>, ApiError> {
        let body: Value = self.get(path, query).await?;
        let items = match body {
            Value::Object(mut map) if map.contains_key("results") => map.remove("results").unwrap_or_default(),
            other => other,
        };
        serde_json::from_value(items).map_err(|e| ApiError::Decode(format!("{path}: {e}")))
    }
}
