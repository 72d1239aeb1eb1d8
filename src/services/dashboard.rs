//! Dashboard summary figures.

use crate::error::ApiError;
use crate::models::{ActivityPoint, DashboardStats};
use crate::net::{ApiClient, Query};

pub const MAX_ACTIVITY_DAYS: u32 = 365;

impl ApiClient {
    /// # Errors
    ///
    /// Returns an error if the request fails or the payload is invalid.
    pub async fn dashboard_stats(&self) -> Result<DashboardStats, ApiError> {
        self.get("/dashboard/stats/", &Query::new()).await
    }

    /// Scans per day over the last `days` days.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Invalid`] unless `1 <= days <= 365`.
    pub async fn scans_activity(&self, days: u32) -> Result<Vec<ActivityPoint>, ApiError> {
        if days == 0 || days > MAX_ACTIVITY_DAYS {
            return Err(ApiError::Invalid(format!("days must be between 1 and {MAX_ACTIVITY_DAYS}")));
        }
        self.get_list("/dashboard/scans-activity/", &Query::new().with("days", days)).await
    }
}

#[cfg(test)]
#[path = "dashboard_test.rs"]
mod tests;
