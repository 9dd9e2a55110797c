//! Member persistence
//!
//! [`MemberStore`] is the seam between the onboarding pipeline and the
//! database. The production backend is [`PgMemberStore`]; integration tests
//! run the pipeline against an in-memory implementation.

use std::collections::HashSet;

use async_trait::async_trait;
use serde::Serialize;
use sqlx::prelude::FromRow;
use uuid::Uuid;
use validator::Validate;

use shared::{AppError, Member, NewMember};

pub mod postgres;

pub use postgres::PgMemberStore;

/// Errors surfaced by a member store backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    #[error("{0}")]
    Conflict(String),
    /// The record failed schema validation on the fallback insert path.
    #[error("{0}")]
    Invalid(String),
    /// The backend could not be reached or the query failed.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => AppError::conflict(msg),
            StoreError::Invalid(msg) => AppError::validation(msg),
            StoreError::Unavailable(msg) => AppError::database(msg),
        }
    }
}

/// Schema-level check run before the fallback insert path.
pub fn schema_validate(member: &NewMember) -> Result<(), StoreError> {
    member.validate().map_err(|errs| {
        let mut parts: Vec<String> = Vec::new();
        for (field, errors) in errs.field_errors() {
            for e in errors.iter() {
                match &e.message {
                    Some(m) => parts.push(m.to_string()),
                    None => parts.push(format!("{field} is invalid")),
                }
            }
        }
        parts.sort();
        StoreError::Invalid(parts.join(", "))
    })
}

/// A stored record still holding a legacy digit-only call-up number.
#[derive(Debug, Clone, FromRow)]
pub struct LegacyCallUp {
    pub id: Uuid,
    pub call_up_number: String,
}

/// Candidate identity values collected from one import batch, used for a
/// single bulk duplicate-existence query.
#[derive(Debug, Default)]
pub struct CandidateKeys {
    /// Canonicalized call-up numbers.
    pub call_ups: Vec<String>,
    /// Digit parts of the call-up numbers (`CALL-131` -> `131`).
    pub call_up_digits: Vec<String>,
    /// Lowercased emails.
    pub emails: Vec<String>,
    pub names: Vec<String>,
}

/// Identity values that already exist in the store.
#[derive(Debug, Default)]
pub struct ExistingMatches {
    pub call_ups: HashSet<String>,
    /// Digit parts of stored call-up numbers, so `131` matches `CALL-131`
    /// in either direction.
    pub call_up_digits: HashSet<String>,
    pub emails: HashSet<String>,
    pub names: HashSet<String>,
}

impl ExistingMatches {
    /// Record one stored identity row.
    pub fn add(&mut self, call_up_number: &str, email: &str, name: &str) {
        if let Some(digits) = crate::pipeline::dedup::digit_part(call_up_number) {
            self.call_up_digits.insert(digits);
        }
        self.call_ups.insert(call_up_number.to_string());
        self.emails.insert(email.to_lowercase());
        self.names.insert(name.to_string());
    }
}

/// Projection of a member awaiting an invitation.
#[derive(Debug, Clone, FromRow)]
pub struct PendingMember {
    pub id: Uuid,
    pub name: String,
    pub full_name: String,
    pub email: String,
    pub activation_token: Option<String>,
    pub activation_token_expires_at: Option<i64>,
}

impl PendingMember {
    /// Whether the member currently holds a usable activation token.
    pub fn has_valid_token(&self, now_millis: i64) -> bool {
        self.activation_token.is_some()
            && self
                .activation_token_expires_at
                .is_some_and(|exp| exp > now_millis)
    }
}

/// Aggregate member counts for the stats endpoints.
#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberStats {
    pub total: i64,
    pub active: i64,
    pub inactive: i64,
    pub invites_sent: i64,
    pub pending_invites: i64,
    /// Rows still holding a pre-canonicalization digit-only call-up number.
    pub legacy_numeric: i64,
}

/// Persistence operations needed by the onboarding pipeline.
#[async_trait]
pub trait MemberStore: Send + Sync {
    /// All rows whose call-up number is a bare digit string.
    async fn list_legacy_numeric(&self) -> Result<Vec<LegacyCallUp>, StoreError>;

    /// Rewrite one call-up number to its canonical form.
    async fn rewrite_call_up_number(&self, id: Uuid, canonical: &str) -> Result<(), StoreError>;

    /// Bulk existence check for an import batch.
    async fn find_existing(&self, keys: &CandidateKeys) -> Result<ExistingMatches, StoreError>;

    /// Direct insert. Uniqueness is still enforced by the backend, so two
    /// concurrent imports cannot both win the same identity.
    async fn insert_raw(&self, member: &NewMember) -> Result<Uuid, StoreError>;

    /// Fallback insert path: schema validation first, then insert.
    async fn insert_validated(&self, member: &NewMember) -> Result<Uuid, StoreError>;

    /// Members eligible for an invitation: inactive, with an email, and
    /// (unless `force_resend`) not yet sent one. `ids` narrows the sweep to
    /// specific members.
    async fn find_pending(
        &self,
        ids: Option<&[Uuid]>,
        force_resend: bool,
    ) -> Result<Vec<PendingMember>, StoreError>;

    /// Persist a freshly generated activation token.
    async fn set_activation_token(
        &self,
        id: Uuid,
        token: &str,
        expires_at: i64,
    ) -> Result<(), StoreError>;

    /// Record the outcome of one invitation send attempt.
    async fn record_dispatch_outcome(
        &self,
        id: Uuid,
        invitation_sent: bool,
        last_error: &str,
    ) -> Result<(), StoreError>;

    async fn stats(&self) -> Result<MemberStats, StoreError>;

    /// Look up a member by an unexpired activation token.
    async fn find_by_activation_token(
        &self,
        token: &str,
        now_millis: i64,
    ) -> Result<Option<Member>, StoreError>;

    /// Activate a member: set the password hash, clear the token.
    async fn activate(&self, id: Uuid, hashed_password: &str) -> Result<(), StoreError>;
}
