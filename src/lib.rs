//! Dentalscope: typed client for the caries-diagnosis dashboard backend.
//!
//! SYSTEM CONTEXT
//! ==============
//! The backend owns authentication, patient/record CRUD and the AI analysis
//! pipeline. This crate is the thin client over it: `services` wrap each
//! REST resource, `poll` follows a diagnosis until the analysis finishes,
//! and `overlay` maps detected lesion boxes onto a displayed radiograph.
//!
//! DATA FLOW
//! =========
//! caller → service → `net::ApiClient` → backend → JSON → validated
//! `models` type → caller. Nothing is cached between calls.

pub mod config;
pub mod error;
pub mod models;
pub mod net;
pub mod overlay;
pub mod poll;
pub mod services;
pub mod session;
pub mod table;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use config::ClientConfig;
pub use error::ApiError;
pub use net::ApiClient;
pub use session::{AuthContext, Session};
