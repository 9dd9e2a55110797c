//! Member provisioning
//!
//! Turns validated rows into stored member records: normalization, defaults,
//! a fresh activation token, then a two-path insert. The direct insert is
//! tried first; if it is rejected, the row goes through schema validation
//! for a precise error and one more attempt before being reported as failed.

use serde::Serialize;
use uuid::Uuid;

use shared::{NewMember, Role};

use crate::db::{MemberStore, StoreError};
use crate::pipeline::dedup::canonical_call_up;
use crate::pipeline::ingest::ValidRow;
use crate::util::generate_activation_token;

/// A member created by this import.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertedMember {
    pub id: Uuid,
    pub call_up_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legacy_id: Option<String>,
    pub name: String,
    pub full_name: String,
    pub email: String,
}

/// A row that passed dedup but was rejected by the store.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedInsert {
    pub call_up_number: String,
    pub name: String,
    pub email: String,
    pub error: String,
}

/// Outcome of inserting one candidate.
#[derive(Debug)]
pub enum InsertOutcome {
    /// Direct insert succeeded.
    FastPath(InsertedMember),
    /// Direct insert was rejected; the schema-validated retry succeeded.
    ValidatedPath(InsertedMember),
    Failed(FailedInsert),
}

/// Inserts from one import batch.
#[derive(Debug, Default)]
pub struct ProvisionReport {
    pub inserted: Vec<InsertedMember>,
    pub failed: Vec<FailedInsert>,
}

/// Build the member record for one validated row.
///
/// Normalization: call-up number is canonicalized and uppercased, email is
/// lowercased, names are trimmed. New members start inactive with a fresh
/// activation token and a zero balance unless the sheet says otherwise.
pub fn transform(row: &ValidRow) -> NewMember {
    let (activation_token, activation_token_expires_at) = generate_activation_token();
    NewMember {
        call_up_number: canonical_call_up(&row.call_up_number).to_uppercase(),
        legacy_id: row.legacy_id.clone(),
        name: row.name.trim().to_string(),
        full_name: row.full_name.trim().to_string(),
        email: row.email.trim().to_lowercase(),
        elevation_year: row.elevation_year,
        debit_balance: row.debit_balance.unwrap_or(0.0),
        activation_token,
        activation_token_expires_at,
        is_active: false,
        invitation_sent: false,
        last_error: String::new(),
        role: Role::User,
    }
}

/// Insert one candidate, falling back to the schema-validated path.
pub async fn try_insert(store: &dyn MemberStore, member: &NewMember) -> InsertOutcome {
    let inserted = |id: Uuid| InsertedMember {
        id,
        call_up_number: member.call_up_number.clone(),
        legacy_id: member.legacy_id.clone(),
        name: member.name.clone(),
        full_name: member.full_name.clone(),
        email: member.email.clone(),
    };

    let first_err = match store.insert_raw(member).await {
        Ok(id) => return InsertOutcome::FastPath(inserted(id)),
        Err(e) => e,
    };

    // Conflicts are final: retrying an insert that hit a unique index
    // cannot succeed, and the constraint message is already precise.
    if let StoreError::Conflict(msg) = &first_err {
        return InsertOutcome::Failed(FailedInsert {
            call_up_number: member.call_up_number.clone(),
            name: member.name.clone(),
            email: member.email.clone(),
            error: msg.clone(),
        });
    }

    tracing::warn!(
        call_up_number = %member.call_up_number,
        error = %first_err,
        "Direct insert failed, retrying through schema validation"
    );

    match store.insert_validated(member).await {
        Ok(id) => InsertOutcome::ValidatedPath(inserted(id)),
        Err(second_err) => InsertOutcome::Failed(FailedInsert {
            call_up_number: member.call_up_number.clone(),
            name: member.name.clone(),
            email: member.email.clone(),
            error: second_err.to_string(),
        }),
    }
}

/// Insert every candidate, isolating per-row failures.
pub async fn provision_members(
    store: &dyn MemberStore,
    candidates: &[(usize, NewMember)],
) -> ProvisionReport {
    let mut report = ProvisionReport::default();

    for (_, member) in candidates {
        match try_insert(store, member).await {
            InsertOutcome::FastPath(m) | InsertOutcome::ValidatedPath(m) => {
                report.inserted.push(m);
            }
            InsertOutcome::Failed(f) => {
                tracing::warn!(
                    call_up_number = %f.call_up_number,
                    error = %f.error,
                    "Member insert failed"
                );
                report.failed.push(f);
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> ValidRow {
        ValidRow {
            row_number: 2,
            call_up_number: "131".into(),
            name: "  A. Bello  ".into(),
            full_name: "Abubakar Bello, SAN".into(),
            email: "A.Bello@Example.ORG".into(),
            legacy_id: Some("L-77".into()),
            elevation_year: Some(2004),
            debit_balance: None,
        }
    }

    #[test]
    fn test_transform_normalizes() {
        let m = transform(&row());
        assert_eq!(m.call_up_number, "CALL-131");
        assert_eq!(m.name, "A. Bello");
        assert_eq!(m.email, "a.bello@example.org");
        assert_eq!(m.debit_balance, 0.0);
        assert!(!m.is_active);
        assert!(!m.invitation_sent);
        assert_eq!(m.activation_token.len(), 64);
    }

    #[test]
    fn test_transform_issues_distinct_tokens() {
        let a = transform(&row());
        let b = transform(&row());
        assert_ne!(a.activation_token, b.activation_token);
    }
}
