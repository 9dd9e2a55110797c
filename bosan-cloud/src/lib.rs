//! bosan-cloud — BOSAN membership onboarding service
//!
//! Long-running service that:
//! - Ingests member spreadsheets (bulk import with dedup + migration)
//! - Provisions inactive member records with activation tokens
//! - Dispatches rate-limited invitation emails via SES
//! - Activates member accounts from emailed tokens

pub mod api;
pub mod config;
pub mod db;
pub mod mail;
pub mod pipeline;
pub mod state;
pub mod util;

pub use config::Config;
pub use state::AppState;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
