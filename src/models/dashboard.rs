//! Dashboard summary payloads.

use serde::{Deserialize, Serialize};
use time::Date;

use super::{Patient, RiskLevel, first_text};

/// `GET /dashboard/stats/` payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    #[serde(default)]
    pub total_patients: u64,
    #[serde(default)]
    pub total_records: u64,
    #[serde(default)]
    pub patients_this_month: u64,
    #[serde(default)]
    pub records_this_month: u64,
    #[serde(default)]
    pub recent_patients: Vec<Patient>,
    #[serde(default)]
    pub recent_visits: Vec<Patient>,
}

/// One bar of `GET /dashboard/scans-activity/?days=N`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ActivityWire")]
pub struct ActivityPoint {
    /// Day label (`Mon`) or ISO date, as the backend sends it.
    pub name: String,
    pub scans: u64,
}

#[derive(Deserialize)]
struct ActivityWire {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    day: Option<String>,
    #[serde(default)]
    scans: Option<u64>,
    #[serde(default)]
    count: Option<u64>,
}

impl TryFrom<ActivityWire> for ActivityPoint {
    type Error = String;

    fn try_from(wire: ActivityWire) -> Result<Self, Self::Error> {
        let name = first_text([wire.name, wire.date, wire.day]).ok_or("activity point has no label")?;
        let scans = wire.scans.or(wire.count).ok_or_else(|| format!("activity point {name} has no scan count"))?;
        Ok(Self { name, scans })
    }
}

/// Patients shown with a high-risk badge on `today`.
#[must_use]
pub fn high_risk_count(patients: &[Patient], today: Date) -> usize {
    patients.iter().filter(|p| p.risk_on(today) == RiskLevel::High).count()
}

#[cfg(test)]
#[path = "dashboard_test.rs"]
mod tests;
