//! Authentication request/response bodies.

use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::session::Session;

#[derive(Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// `POST /auth/login/` response. Extra fields (user info) are ignored.
#[derive(Clone, Deserialize)]
pub struct TokenPair {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
}

impl TryFrom<TokenPair> for Session {
    type Error = ApiError;

    fn try_from(pair: TokenPair) -> Result<Self, Self::Error> {
        if pair.access.trim().is_empty() {
            return Err(ApiError::Decode("login response carried an empty access token".to_owned()));
        }
        Ok(Session { access: pair.access, refresh: pair.refresh.filter(|r| !r.is_empty()) })
    }
}

#[derive(Clone, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub password2: String,
}

impl RegisterRequest {
    /// # Errors
    ///
    /// Returns [`ApiError::Invalid`] when fields are blank or the two
    /// passwords differ.
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.username.trim().is_empty() || self.email.trim().is_empty() {
            return Err(ApiError::Invalid("username and email are required".to_owned()));
        }
        if !self.email.contains('@') {
            return Err(ApiError::Invalid(format!("{:?} is not an email address", self.email)));
        }
        check_passwords(&self.password, &self.password2)
    }
}

#[derive(Clone, Serialize)]
pub struct PasswordResetRequest {
    pub email: String,
}

#[derive(Clone, Serialize)]
pub struct PasswordResetConfirm {
    pub password: String,
    pub password2: String,
}

impl PasswordResetConfirm {
    /// # Errors
    ///
    /// Returns [`ApiError::Invalid`] when the passwords are empty or differ.
    pub fn validate(&self) -> Result<(), ApiError> {
        check_passwords(&self.password, &self.password2)
    }
}

#[derive(Clone, Serialize)]
pub struct LogoutRequest {
    pub refresh: String,
}

fn check_passwords(password: &str, confirm: &str) -> Result<(), ApiError> {
    if password.is_empty() {
        return Err(ApiError::Invalid("password is required".to_owned()));
    }
    if password != confirm {
        return Err(ApiError::Invalid("passwords do not match".to_owned()));
    }
    Ok(())
}

/// Acknowledgement text from register / password-reset endpoints.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuthNotice {
    pub message: Option<String>,
}

impl AuthNotice {
    /// Pull `message` or `detail` out of whatever the backend sent.
    #[must_use]
    pub fn from_body(body: Option<&serde_json::Value>) -> Self {
        use serde_json::Value;
        let message = match body {
            Some(Value::String(text)) => Some(text.clone()),
            Some(Value::Object(map)) => ["message", "detail", "status"]
                .iter()
                .find_map(|key| map.get(*key).and_then(Value::as_str))
                .map(str::to_owned),
            _ => None,
        };
        Self { message: message.filter(|m| !m.trim().is_empty()) }
    }
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
