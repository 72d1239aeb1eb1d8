//! The signed-in clinician's profile and avatar.

use std::path::Path;

use super::storage::AvatarStorage;
use crate::error::ApiError;
use crate::models::{Profile, ProfileUpdate, UserId};
use crate::net::{ApiClient, Query};

impl ApiClient {
    /// # Errors
    ///
    /// Returns an error if the request fails or the payload is invalid.
    pub async fn get_profile(&self) -> Result<Profile, ApiError> {
        self.get("/accounts/profile/", &Query::new()).await
    }

    /// # Errors
    ///
    /// Returns [`ApiError::Invalid`] for an empty patch, otherwise the
    /// backend's field errors.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<Profile, ApiError> {
        update.validate()?;
        self.patch("/accounts/profile/", update).await
    }

    /// Upload `path` to the avatar bucket, then point the profile at it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is unreadable or not an image, the
    /// bucket rejects it, or the profile patch fails.
    pub async fn set_avatar(&self, storage: &AvatarStorage, user: UserId, path: &Path) -> Result<Profile, ApiError> {
        let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        let key = AvatarStorage::object_key(user, file_name)?;
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ApiError::Invalid(format!("cannot read {}: {e}", path.display())))?;
        let avatar_url = storage.upload(&key, bytes).await?;
        self.update_profile(&ProfileUpdate { avatar_url: Some(avatar_url), ..ProfileUpdate::default() }).await
    }
}

#[cfg(test)]
#[path = "profile_test.rs"]
mod tests;
