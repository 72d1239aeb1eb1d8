//! Patient table: filtering, sorting and pagination over fetched rows.
//!
//! DESIGN
//! ======
//! The backend accepts the same filters as query parameters, so a
//! [`PatientFilter`] can either be sent with the list request
//! ([`PatientFilter::to_query`]) or applied locally to an already-fetched
//! page ([`PatientFilter::apply`]). Pagination is always local.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use time::Date;

use crate::error::ApiError;
use crate::models::{Patient, RiskLevel, format_date};
use crate::services::patients::PatientQuery;

pub const PAGE_SIZES: [usize; 4] = [5, 10, 15, 20];
pub const DEFAULT_PAGE_SIZE: usize = 10;

// =============================================================================
// SORTING
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    FirstName,
    LastName,
    DateOfBirth,
    LastVisit,
}

impl SortKey {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FirstName => "first_name",
            Self::LastName => "last_name",
            Self::DateOfBirth => "date_of_birth",
            Self::LastVisit => "last_visit",
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "first_name" => Ok(Self::FirstName),
            "last_name" => Ok(Self::LastName),
            "date_of_birth" | "dob" => Ok(Self::DateOfBirth),
            "last_visit" => Ok(Self::LastVisit),
            other => Err(ApiError::Invalid(format!("unknown sort key {other:?}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(Self::Asc),
            "desc" | "descending" => Ok(Self::Desc),
            other => Err(ApiError::Invalid(format!("unknown sort order {other:?}"))),
        }
    }
}

// =============================================================================
// FILTER
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatientFilter {
    pub search: Option<String>,
    pub min_age: Option<u32>,
    pub max_age: Option<u32>,
    pub sort_by: Option<SortKey>,
    pub order: Option<SortOrder>,
}

impl PatientFilter {
    /// # Errors
    ///
    /// Returns [`ApiError::Invalid`] when the age range is inverted.
    pub fn validate(&self) -> Result<(), ApiError> {
        match (self.min_age, self.max_age) {
            (Some(min), Some(max)) if min > max => {
                Err(ApiError::Invalid(format!("minimum age {min} exceeds maximum age {max}")))
            }
            _ => Ok(()),
        }
    }

    #[must_use]
    pub fn to_query(&self) -> PatientQuery {
        PatientQuery {
            search: self.search.clone(),
            min_age: self.min_age,
            max_age: self.max_age,
            sort_by: self.sort_by,
            order: self.order,
        }
    }

    /// Whether `patient` passes the search term and age range.
    #[must_use]
    pub fn matches(&self, patient: &Patient, today: Date) -> bool {
        let age = patient.age_on(today);
        if self.min_age.is_some_and(|min| age < min) || self.max_age.is_some_and(|max| age > max) {
            return false;
        }
        let Some(needle) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) else {
            return true;
        };
        let needle = needle.to_lowercase();
        let display_id = patient.display_id();
        [
            Some(patient.full_name()),
            patient.email.clone(),
            patient.phone.clone(),
            Some(display_id),
        ]
        .into_iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(&needle))
    }

    /// Filter then sort. Without a sort key the input order is kept.
    #[must_use]
    pub fn apply<'a>(&self, patients: &'a [Patient], today: Date) -> Vec<&'a Patient> {
        let mut rows: Vec<&Patient> = patients.iter().filter(|p| self.matches(p, today)).collect();
        if let Some(key) = self.sort_by {
            let desc = self.order == Some(SortOrder::Desc);
            rows.sort_by(|a, b| {
                let ordering = compare(a, b, key).then_with(|| a.id.0.cmp(&b.id.0));
                if desc { ordering.reverse() } else { ordering }
            });
        }
        rows
    }
}

fn compare(a: &Patient, b: &Patient, key: SortKey) -> Ordering {
    match key {
        SortKey::FirstName => a.first_name.to_lowercase().cmp(&b.first_name.to_lowercase()),
        SortKey::LastName => a.last_name.to_lowercase().cmp(&b.last_name.to_lowercase()),
        SortKey::DateOfBirth => a.date_of_birth.cmp(&b.date_of_birth),
        // Never-visited patients sort after everyone else.
        SortKey::LastVisit => match (a.last_visit, b.last_visit) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
    }
}

// =============================================================================
// PAGINATION
// =============================================================================

/// One-based page cursor over a locally held row set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    page: usize,
    page_size: usize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self { page: 1, page_size: DEFAULT_PAGE_SIZE }
    }
}

impl Pagination {
    /// # Errors
    ///
    /// Returns [`ApiError::Invalid`] for a size outside [`PAGE_SIZES`].
    pub fn new(page_size: usize) -> Result<Self, ApiError> {
        check_page_size(page_size)?;
        Ok(Self { page: 1, page_size })
    }

    #[must_use]
    pub fn page(&self) -> usize {
        self.page
    }

    #[must_use]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    #[must_use]
    pub fn total_pages(&self, total: usize) -> usize {
        total.div_ceil(self.page_size).max(1)
    }

    /// Jump to `page`, clamped into `1..=total_pages`.
    pub fn set_page(&mut self, page: usize, total: usize) {
        self.page = page.clamp(1, self.total_pages(total));
    }

    /// Change rows per page and return to the first page.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Invalid`] for a size outside [`PAGE_SIZES`].
    pub fn set_page_size(&mut self, page_size: usize) -> Result<(), ApiError> {
        check_page_size(page_size)?;
        self.page_size = page_size;
        self.page = 1;
        Ok(())
    }

    pub fn next(&mut self, total: usize) {
        self.set_page(self.page + 1, total);
    }

    pub fn prev(&mut self) {
        self.page = self.page.saturating_sub(1).max(1);
    }

    #[must_use]
    pub fn has_next(&self, total: usize) -> bool {
        self.page < self.total_pages(total)
    }

    #[must_use]
    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    /// Rows on the current page. A page past the end (rows shrank after a
    /// filter) yields the last page.
    #[must_use]
    pub fn slice<'a, T>(&self, rows: &'a [T]) -> &'a [T] {
        let page = self.page.min(self.total_pages(rows.len()));
        let start = (page - 1) * self.page_size;
        let end = (start + self.page_size).min(rows.len());
        rows.get(start..end).unwrap_or_default()
    }

    /// `11–20 of 42`; `0–0 of 0` for an empty table.
    #[must_use]
    pub fn range_label(&self, total: usize) -> String {
        let page = self.page.min(self.total_pages(total));
        let start = (page - 1) * self.page_size;
        format!("{}–{} of {total}", (start + 1).min(total), (start + self.page_size).min(total))
    }
}

fn check_page_size(page_size: usize) -> Result<(), ApiError> {
    if PAGE_SIZES.contains(&page_size) {
        Ok(())
    } else {
        Err(ApiError::Invalid(format!("page size must be one of {PAGE_SIZES:?}, got {page_size}")))
    }
}

// =============================================================================
// ROWS
// =============================================================================

/// Rendered table row with derived columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatientRow {
    pub id: String,
    pub name: String,
    pub age: u32,
    pub gender: String,
    pub last_visit: Option<String>,
    pub risk: RiskLevel,
}

impl PatientRow {
    #[must_use]
    pub fn from_patient(patient: &Patient, today: Date) -> Self {
        let age = patient.age_on(today);
        Self {
            id: patient.display_id(),
            name: patient.full_name(),
            age,
            gender: patient.gender.clone(),
            last_visit: patient.last_visit.map(format_date),
            risk: RiskLevel::from_age(age),
        }
    }
}

#[cfg(test)]
#[path = "table_test.rs"]
mod tests;
