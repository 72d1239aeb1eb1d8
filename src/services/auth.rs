//! Sign-in, registration, password reset and sign-out.

use tracing::{debug, info};

use crate::error::ApiError;
use crate::models::auth::{
    AuthNotice, LoginRequest, LogoutRequest, PasswordResetConfirm, PasswordResetRequest, RegisterRequest, TokenPair,
};
use crate::net::ApiClient;
use crate::net::client::Access;
use crate::session::Session;

impl ApiClient {
    /// Exchange credentials for a token pair and adopt it as the session.
    ///
    /// # Errors
    ///
    /// Returns the backend's rejection, or a store error if the session
    /// cannot be persisted.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, ApiError> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(ApiError::Invalid("email and password are required".to_owned()));
        }
        let body = LoginRequest { email: email.to_owned(), password: password.to_owned() };
        let pair: TokenPair = self.post("/auth/login/", &body, Access::Public).await?;
        let session = Session::try_from(pair)?;
        self.auth().establish(session.clone())?;
        info!("signed in");
        Ok(session)
    }

    /// # Errors
    ///
    /// Returns [`ApiError::Invalid`] before sending if the form is
    /// inconsistent, otherwise the backend's field errors.
    pub async fn register(&self, request: &RegisterRequest) -> Result<AuthNotice, ApiError> {
        request.validate()?;
        let body = self.post_unit("/auth/register/", request, Access::Public).await?;
        Ok(AuthNotice::from_body(body.as_ref()))
    }

    /// # Errors
    ///
    /// Returns an error if the email is blank or the backend rejects it.
    pub async fn request_password_reset(&self, email: &str) -> Result<AuthNotice, ApiError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(ApiError::Invalid("email is required".to_owned()));
        }
        let body = PasswordResetRequest { email: email.to_owned() };
        let body = self.post_unit("/auth/password-reset/", &body, Access::Public).await?;
        Ok(AuthNotice::from_body(body.as_ref()))
    }

    /// Complete a reset with the token from the emailed link.
    ///
    /// # Errors
    ///
    /// Returns an error for a malformed token, mismatched passwords, or a
    /// backend rejection (expired token).
    pub async fn confirm_password_reset(
        &self,
        token: &str,
        confirm: &PasswordResetConfirm,
    ) -> Result<AuthNotice, ApiError> {
        let token = token.trim();
        if token.is_empty() || !token.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')) {
            return Err(ApiError::Invalid("reset token is malformed".to_owned()));
        }
        confirm.validate()?;
        let path = format!("/auth/password-reset/{token}/");
        let body = self.post_unit(&path, confirm, Access::Public).await?;
        Ok(AuthNotice::from_body(body.as_ref()))
    }

    /// Revoke the refresh token server-side and drop the local session.
    /// The local session is cleared even when the backend call fails, and
    /// the invalidation hook fires exactly once.
    pub async fn logout(&self) {
        let mut already_cleared = false;
        if let Some(refresh) = self.auth().session().and_then(|s| s.refresh) {
            let body = LogoutRequest { refresh };
            if let Err(e) = self.post_unit("/auth/logout/", &body, Access::Public).await {
                // A 401 has already invalidated the session in the client.
                already_cleared = matches!(e, ApiError::Unauthorized { .. });
                debug!(error = %e, "logout request failed; clearing session anyway");
            }
        }
        if !already_cleared {
            self.auth().invalidate();
        }
        info!("signed out");
    }
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
