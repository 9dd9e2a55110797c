//! Member domain model
//!
//! A `Member` is the durable record produced by the onboarding pipeline:
//! created inactive with a fresh activation token, mutated by the
//! invitation dispatcher, and activated once the member sets a password.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;
use uuid::Uuid;
use validator::Validate;

/// Email shape check. Deliberately matches the legacy portal's pattern so
/// previously accepted addresses keep importing cleanly.
pub static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\w+([\.-]?\w+)*@\w+([\.-]?\w+)*(\.\w{2,3})+$").expect("email regex")
});

/// Canonical call-up number shape: letters, digits and hyphens only
/// (e.g. `CALL-131`, or a bare legacy number like `2041`).
pub static CALL_UP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z0-9-]+$").expect("call-up regex"));

/// Member role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
    Moderator,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::Moderator => "moderator",
        }
    }

    /// Parse a stored role string; unknown values fall back to `User`.
    pub fn from_str_or_default(s: &str) -> Self {
        match s {
            "admin" => Role::Admin,
            "moderator" => Role::Moderator,
            _ => Role::User,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted member record.
///
/// The activation token and password hash are write-only: they are never
/// serialized into API responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub id: Uuid,
    /// Canonical uppercase call-up number (`CALL-131`). Legacy rows may
    /// still hold a bare digit string until the format migration runs.
    pub call_up_number: String,
    /// The previous system's optional identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legacy_id: Option<String>,
    pub name: String,
    pub full_name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elevation_year: Option<i32>,
    pub debit_balance: f64,
    pub is_active: bool,
    #[serde(skip_serializing, default)]
    pub activation_token: Option<String>,
    /// Milliseconds since the Unix epoch.
    #[serde(skip_serializing, default)]
    pub activation_token_expires_at: Option<i64>,
    pub invitation_sent: bool,
    /// Reason of the last failed invitation dispatch, empty when none.
    pub last_error: String,
    #[serde(skip_serializing, default)]
    pub hashed_password: Option<String>,
    pub role: Role,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Member {
    /// Whether the member currently holds a usable activation token.
    pub fn has_valid_token(&self, now_millis: i64) -> bool {
        self.activation_token.is_some()
            && self
                .activation_token_expires_at
                .is_some_and(|exp| exp > now_millis)
    }
}

/// A member record ready for insertion, produced by the provisioner from a
/// validated, deduplicated spreadsheet row.
///
/// The `Validate` impl is the schema-level check used by the fallback
/// insert path; the dynamic current-year ceiling on `elevation_year` is
/// enforced earlier, at ingest, where errors carry row numbers.
#[derive(Clone, Validate)]
pub struct NewMember {
    #[validate(
        length(min = 1, message = "Call-up Number is required"),
        regex(
            path = *CALL_UP_RE,
            message = "Call-up Number can only contain letters, numbers, and hyphens"
        )
    )]
    pub call_up_number: String,
    pub legacy_id: Option<String>,
    #[validate(length(
        min = 2,
        max = 100,
        message = "Name must be between 2 and 100 characters"
    ))]
    pub name: String,
    #[validate(length(
        min = 2,
        max = 200,
        message = "Full Name must be between 2 and 200 characters"
    ))]
    pub full_name: String,
    #[validate(regex(path = *EMAIL_RE, message = "Please enter a valid email address"))]
    pub email: String,
    #[validate(range(min = 1900, message = "Elevation year cannot be before 1900"))]
    pub elevation_year: Option<i32>,
    #[validate(range(min = 0.0, message = "Debit balance cannot be negative"))]
    pub debit_balance: f64,
    pub activation_token: String,
    pub activation_token_expires_at: i64,
    pub is_active: bool,
    pub invitation_sent: bool,
    pub last_error: String,
    pub role: Role,
}

// The activation token is a secret; keep it out of Debug output.
impl fmt::Debug for NewMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewMember")
            .field("call_up_number", &self.call_up_number)
            .field("legacy_id", &self.legacy_id)
            .field("name", &self.name)
            .field("full_name", &self.full_name)
            .field("email", &self.email)
            .field("elevation_year", &self.elevation_year)
            .field("debit_balance", &self.debit_balance)
            .field("activation_token", &"<redacted>")
            .field("role", &self.role)
            .finish()
    }
}
