//! Shared types for the BOSAN portal backend
//!
//! Common types used across crates: the unified error system, the member
//! domain model, and small time utilities.

pub mod error;
pub mod models;
pub mod util;

// Re-exports
pub use serde::{Deserialize, Serialize};

pub use error::{ApiResponse, AppError, AppResult, ErrorCode};
pub use models::member::{Member, NewMember, Role};
