//! HTTP plumbing shared by every service.
//!
//! `client` owns the reqwest connection pool, bearer attachment and
//! response normalization; `query` builds filter query strings.

pub mod client;
pub mod query;

pub use client::ApiClient;
pub use query::Query;
