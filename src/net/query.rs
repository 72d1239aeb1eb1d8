//! Query-string builder for list endpoints.

use reqwest::Url;

/// Ordered `key=value` pairs. Empty values are dropped on insert so
/// callers can pass optional filters straight through.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pairs: Vec<(&'static str, String)>,
}

impl Query {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pair unless the value renders empty.
    #[must_use]
    pub fn with(mut self, key: &'static str, value: impl ToString) -> Self {
        let value = value.to_string();
        if !value.trim().is_empty() {
            self.pairs.push((key, value));
        }
        self
    }

    #[must_use]
    pub fn with_opt<T: ToString>(self, key: &'static str, value: Option<T>) -> Self {
        match value {
            Some(value) => self.with(key, value),
            None => self,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// `?a=1&b=x%20y`, or an empty string when no pairs survived.
    #[must_use]
    pub fn encode(&self) -> String {
        if self.is_empty() {
            return String::new();
        }
        let Ok(mut url) = Url::parse("http://query.invalid/") else {
            return String::new();
        };
        url.query_pairs_mut().extend_pairs(self.pairs.iter().map(|(k, v)| (*k, v.as_str())));
        url.query().map(|q| format!("?{q}")).unwrap_or_default()
    }
}

#[cfg(test)]
#[path = "query_test.rs"]
mod tests;
