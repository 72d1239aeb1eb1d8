//! Error taxonomy shared by every service call.
//!
//! DESIGN
//! ======
//! Transport failures, non-2xx responses and schema violations all surface
//! as one [`ApiError`]. Backend error bodies come in several shapes (plain
//! string, `{"error": ..}`, `{"detail": ..}`, or field → messages maps);
//! [`normalize_error`] folds them into a single human-readable message and
//! keeps the field map for forms that highlight individual inputs.
//!
//! Session expiry is decided by HTTP 401 only. Message text is never
//! inspected for words like "token".

use std::fmt;

use serde_json::Value;

use crate::session::SessionError;

const FALLBACK_MESSAGE: &str = "An error occurred";

/// Field-level validation messages, one entry per rejected field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(Vec<(String, Vec<String>)>);

impl FieldErrors {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Messages for one field, if the backend reported any.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.iter().find(|(name, _)| name == field).map(|(_, msgs)| msgs.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(name, msgs)| (name.as_str(), msgs.as_slice()))
    }

    fn from_object(map: &serde_json::Map<String, Value>) -> Self {
        Self(map.iter().map(|(k, v)| (k.clone(), field_messages(v))).collect())
    }
}

impl fmt::Display for FieldErrors {
    /// `email: already exists; phone: too short, invalid`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (field, msgs)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{field}: {}", msgs.join(", "))?;
        }
        Ok(())
    }
}

/// Errors produced by backend calls.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request never produced a response (DNS, connect, timeout).
    #[error("network request failed: {0}")]
    Transport(String),

    /// The backend answered with a non-success status.
    #[error("{message}")]
    Http { status: u16, message: String, fields: Option<FieldErrors> },

    /// The backend rejected the bearer token (HTTP 401).
    #[error("session expired: {message}")]
    Unauthorized { message: String },

    /// The response body did not match the expected schema.
    #[error("unexpected response: {0}")]
    Decode(String),

    /// A protected call was attempted without a session.
    #[error("not signed in")]
    MissingSession,

    /// Caller-supplied input was rejected before any request was sent.
    #[error("invalid input: {0}")]
    Invalid(String),

    #[error("session store failed: {0}")]
    Session(#[from] SessionError),

    /// Avatar bucket upload failed or is not configured.
    #[error("avatar storage failed: {0}")]
    Storage(String),
}

impl ApiError {
    /// Whether repeating the same request may succeed.
    #[must_use]
    pub fn retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Http { status: 408 | 429 | 500..=599, .. })
    }

    /// Whether the caller should send the user back to the login screen.
    #[must_use]
    pub fn is_session_expired(&self) -> bool {
        matches!(self, Self::Unauthorized { .. } | Self::MissingSession)
    }

    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Unauthorized { .. } => Some(401),
            _ => None,
        }
    }

    #[must_use]
    pub fn fields(&self) -> Option<&FieldErrors> {
        match self {
            Self::Http { fields, .. } => fields.as_ref(),
            _ => None,
        }
    }

    /// Text for a transient notification. Field errors win over the joined
    /// message because they name the offending input.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Http { fields: Some(fields), message, .. } if !fields.is_empty() => {
                let rendered = fields.to_string();
                if rendered.is_empty() { message.clone() } else { rendered }
            }
            Self::Http { message, .. } => message.clone(),
            Self::Unauthorized { .. } | Self::MissingSession => "Your session has expired. Please sign in again.".to_owned(),
            Self::Transport(_) => "Could not reach the server. Check your connection and try again.".to_owned(),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::Decode(error.to_string())
        } else {
            Self::Transport(error.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(error: serde_json::Error) -> Self {
        Self::Decode(error.to_string())
    }
}

/// Turn a non-success response into an [`ApiError`].
///
/// `body` is `None` when the response carried no JSON payload.
#[must_use]
pub fn normalize_error(status: u16, status_text: &str, body: Option<&Value>) -> ApiError {
    let (message, fields) = match body {
        None | Some(Value::Null) => (non_empty_or(status_text, FALLBACK_MESSAGE), None),
        Some(Value::String(text)) => (non_empty_or(text, FALLBACK_MESSAGE), None),
        Some(Value::Object(map)) => {
            if let Some(text) = map.get("error").and_then(scalar_text) {
                (text, None)
            } else if let Some(text) = map.get("detail").and_then(scalar_text) {
                (text, None)
            } else {
                let joined = map
                    .values()
                    .flat_map(value_messages)
                    .collect::<Vec<_>>()
                    .join(" ");
                let fields = FieldErrors::from_object(map);
                (non_empty_or(&joined, FALLBACK_MESSAGE), Some(fields).filter(|f| !f.is_empty()))
            }
        }
        Some(other) => (non_empty_or(&value_messages(other).join(" "), FALLBACK_MESSAGE), None),
    };

    if status == 401 {
        return ApiError::Unauthorized { message };
    }
    ApiError::Http { status, message, fields }
}

fn non_empty_or(text: &str, fallback: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() { fallback.to_owned() } else { trimmed.to_owned() }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn field_messages(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().flat_map(value_messages).collect(),
        other => value_messages(other),
    }
}

/// Flatten one field's value: arrays are joined element-wise, nested
/// objects contribute their own messages.
fn value_messages(value: &Value) -> Vec<String> {
    match value {
        Value::Null => Vec::new(),
        Value::String(s) => vec![s.clone()],
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().flat_map(value_messages).collect();
            if parts.is_empty() { Vec::new() } else { vec![parts.join(" ")] }
        }
        Value::Object(map) => map.values().flat_map(value_messages).collect(),
        other => vec![other.to_string()],
    }
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
