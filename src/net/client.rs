//! Typed REST client for the dashboard backend.
//!
//! SYSTEM CONTEXT
//! ==============
//! Every service module adds methods to [`ApiClient`]; they all funnel into
//! [`ApiClient::execute`], which attaches the bearer token, sends one
//! request, and turns the response into either JSON or an [`ApiError`].
//!
//! ERROR HANDLING
//! ==============
//! Non-2xx responses go through [`normalize_error`]. A 401 additionally
//! invalidates the shared [`AuthContext`] so the owner can route back to
//! login. There are no retries here; each call is a single round trip.

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::multipart::Form;
use reqwest::{Method, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use super::Query;
use crate::config::ClientConfig;
use crate::error::{ApiError, normalize_error};
use crate::session::AuthContext;

// =============================================================================
// CLIENT
// =============================================================================

/// Cheap to clone; clones share the connection pool and auth context.
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    auth: Arc<AuthContext>,
}

/// Whether a call needs a signed-in session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Access {
    /// Attach the token if present (login, register, password reset).
    Public,
    /// Refuse to send without a token.
    Protected,
}

pub(crate) enum Payload {
    Empty,
    Json(Value),
    Form(Form),
}

impl ApiClient {
    /// # Errors
    ///
    /// Returns [`ApiError::Transport`] if the HTTP client cannot be built.
    pub fn new(config: &ClientConfig, auth: Arc<AuthContext>) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeouts.request_secs))
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        Ok(Self { http, base_url: config.api_url.trim_end_matches('/').to_owned(), auth })
    }

    #[must_use]
    pub fn auth(&self) -> &Arc<AuthContext> {
        &self.auth
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for a backend path such as `/patients/7/`.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        }
    }

    // =========================================================================
    // VERBS
    // =========================================================================

    pub(crate) async fn get<T: DeserializeOwned>(&self, path: &str, query: &Query) -> Result<T, ApiError> {
        let body = self.execute(Method::GET, path, query, Payload::Empty, Access::Protected).await?;
        decode(path, body)
    }

    pub(crate) async fn post<T, B>(&self, path: &str, body: &B, access: Access) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let payload = Payload::Json(serde_json::to_value(body)?);
        let body = self.execute(Method::POST, path, &Query::new(), payload, access).await?;
        decode(path, body)
    }

    /// POST whose response body is irrelevant (logout, password reset).
    pub(crate) async fn post_unit<B>(&self, path: &str, body: &B, access: Access) -> Result<Option<Value>, ApiError>
    where
        B: Serialize + ?Sized,
    {
        let payload = Payload::Json(serde_json::to_value(body)?);
        self.execute(Method::POST, path, &Query::new(), payload, access).await
    }

    pub(crate) async fn put<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let payload = Payload::Json(serde_json::to_value(body)?);
        let body = self.execute(Method::PUT, path, &Query::new(), payload, Access::Protected).await?;
        decode(path, body)
    }

    pub(crate) async fn patch<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let payload = Payload::Json(serde_json::to_value(body)?);
        let body = self.execute(Method::PATCH, path, &Query::new(), payload, Access::Protected).await?;
        decode(path, body)
    }

    /// DELETE; any success status counts, with or without a body.
    pub(crate) async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.execute(Method::DELETE, path, &Query::new(), Payload::Empty, Access::Protected)
            .await
            .map(|_| ())
    }

    pub(crate) async fn post_form<T: DeserializeOwned>(&self, path: &str, form: Form) -> Result<T, ApiError> {
        let body = self.execute(Method::POST, path, &Query::new(), Payload::Form(form), Access::Protected).await?;
        decode(path, body)
    }

    // =========================================================================
    // EXECUTION
    // =========================================================================

    /// Send one request. `Ok(None)` means a success response without a
    /// JSON body.
    pub(crate) async fn execute(
        &self,
        method: Method,
        path: &str,
        query: &Query,
        payload: Payload,
        access: Access,
    ) -> Result<Option<Value>, ApiError> {
        let token = match access {
            Access::Protected => Some(self.auth.require()?),
            Access::Public => self.auth.bearer(),
        };

        let url = format!("{}{}", self.endpoint(path), query.encode());
        let mut request = self.http.request(method.clone(), url);
        if let Some(token) = token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        request = match payload {
            Payload::Empty => request,
            Payload::Json(body) => request.json(&body),
            Payload::Form(form) => request.multipart(form),
        };

        let started = Instant::now();
        debug!(%method, path, "api request");
        let response = request.send().await?;
        let status = response.status().as_u16();
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        debug!(%method, path, status, elapsed_ms, "api response");

        self.handle_response(response).await
    }

    async fn handle_response(&self, response: Response) -> Result<Option<Value>, ApiError> {
        let status = response.status();
        let is_json = is_json_response(&response);
        let text = response.text().await?;

        let body = if is_json && !text.trim().is_empty() {
            match serde_json::from_str::<Value>(&text) {
                Ok(value) => Some(value),
                Err(e) if status.is_success() => return Err(e.into()),
                Err(_) => None,
            }
        } else {
            None
        };

        if status.is_success() {
            return Ok(body);
        }

        let error = normalize_error(status.as_u16(), status.canonical_reason().unwrap_or_default(), body.as_ref());
        if matches!(error, ApiError::Unauthorized { .. }) {
            warn!("backend rejected the session token");
            self.auth.invalidate();
        }
        Err(error)
    }
}

fn is_json_response(response: &Response) -> bool {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("application/json") || ct.contains("+json"))
}

fn decode<T: DeserializeOwned>(path: &str, body: Option<Value>) -> Result<T, ApiError> {
    let body = body.ok_or_else(|| ApiError::Decode(format!("{path}: expected a JSON response body")))?;
    serde_json::from_value(body).map_err(|e| ApiError::Decode(format!("{path}: {e}")))
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
