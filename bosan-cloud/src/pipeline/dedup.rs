//! Call-up number canonicalization and duplicate resolution
//!
//! Call-up numbers below 1000 are stored as `CALL-<n>`; larger numbers stay
//! bare. Rows imported before this convention may still hold digit-only
//! values, so every import first migrates those, then checks incoming rows
//! against stored identities in both formats.

use serde::Serialize;

use shared::NewMember;

use crate::db::{CandidateKeys, ExistingMatches, MemberStore};

/// Extract the first run of digits from a call-up number.
/// `CALL-131` and `131` both yield `131`.
pub fn digit_part(s: &str) -> Option<String> {
    let start = s.find(|c: char| c.is_ascii_digit())?;
    let rest = &s[start..];
    let end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    Some(rest[..end].to_string())
}

/// Canonical storage form of a call-up number.
///
/// Digit-only values below 1000 become `CALL-<n>`; digit-only values of
/// 1000 or more are stored as their bare decimal form. Anything already
/// carrying non-digit characters is returned unchanged.
pub fn canonical_call_up(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_digit()) {
        return trimmed.to_string();
    }
    match trimmed.parse::<i64>() {
        Ok(n) if n < 1000 => format!("CALL-{n}"),
        Ok(n) => n.to_string(),
        Err(_) => trimmed.to_string(),
    }
}

/// Result of the pre-import format migration.
#[derive(Debug, Clone, Copy, Default)]
pub struct MigrationOutcome {
    pub performed: bool,
    pub migrated_count: u64,
}

/// Rewrite stored digit-only call-up numbers to canonical form.
///
/// Runs before every import. Failures never abort the import: an
/// unreachable store is logged and the import proceeds, and the unique
/// indexes still hold the line on duplicates.
pub async fn migrate_call_up_numbers(store: &dyn MemberStore) -> MigrationOutcome {
    let rows = match store.list_legacy_numeric().await {
        Ok(rows) => rows,
        Err(e) => {
            tracing::warn!(error = %e, "Call-up number migration skipped");
            return MigrationOutcome::default();
        }
    };

    let mut migrated_count = 0u64;
    for row in rows {
        let canonical = canonical_call_up(&row.call_up_number);
        if canonical == row.call_up_number {
            continue;
        }
        match store.rewrite_call_up_number(row.id, &canonical).await {
            Ok(()) => {
                tracing::info!(
                    from = %row.call_up_number,
                    to = %canonical,
                    "Migrated call-up number"
                );
                migrated_count += 1;
            }
            Err(e) => {
                tracing::warn!(
                    id = %row.id,
                    from = %row.call_up_number,
                    error = %e,
                    "Failed to migrate call-up number"
                );
            }
        }
    }

    if migrated_count > 0 {
        tracing::info!(count = migrated_count, "Call-up number migration complete");
    }

    MigrationOutcome {
        performed: migrated_count > 0,
        migrated_count,
    }
}

/// One import row skipped because it matched an existing member.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedRecord {
    /// Spreadsheet row number (header is row 1).
    pub row_index: usize,
    pub call_up_number: String,
    pub name: String,
    pub email: String,
    pub reasons: Vec<String>,
}

/// Outcome of checking an import batch against stored members.
#[derive(Debug, Default)]
pub struct DedupOutcome {
    pub unique: Vec<(usize, NewMember)>,
    pub skipped: Vec<SkippedRecord>,
    /// Set when the existence check itself failed and the import continued
    /// on the unique indexes alone.
    pub warning: Option<String>,
}

/// Split candidates into new members and duplicates of stored ones.
///
/// Matching is bidirectional on the digit part, so an incoming `131`
/// collides with a stored `CALL-131` and vice versa. If the existence
/// query fails, every candidate is treated as unique and a warning is
/// attached; the unique indexes catch any real duplicates at insert time.
pub async fn resolve_duplicates(
    store: &dyn MemberStore,
    candidates: Vec<(usize, NewMember)>,
) -> DedupOutcome {
    let mut keys = CandidateKeys::default();
    for (_, m) in &candidates {
        keys.call_ups.push(m.call_up_number.clone());
        if let Some(digits) = digit_part(&m.call_up_number) {
            keys.call_up_digits.push(digits);
        }
        keys.emails.push(m.email.to_lowercase());
        keys.names.push(m.name.clone());
    }

    let (existing, warning) = match store.find_existing(&keys).await {
        Ok(existing) => (existing, None),
        Err(e) => {
            tracing::warn!(error = %e, "Duplicate existence check failed");
            (
                ExistingMatches::default(),
                Some(
                    "Some duplicate checking may have been incomplete due to database format differences"
                        .to_string(),
                ),
            )
        }
    };

    let mut outcome = DedupOutcome {
        warning,
        ..DedupOutcome::default()
    };

    for (row_number, member) in candidates {
        let mut reasons = Vec::new();

        let call_up_hit = existing.call_ups.contains(&member.call_up_number)
            || digit_part(&member.call_up_number)
                .is_some_and(|d| existing.call_up_digits.contains(&d));
        if call_up_hit {
            reasons.push("Call-up Number already exists".to_string());
        }
        if existing.emails.contains(&member.email.to_lowercase()) {
            reasons.push("Email already exists".to_string());
        }
        if existing.names.contains(&member.name) {
            reasons.push("Name already exists".to_string());
        }

        if reasons.is_empty() {
            outcome.unique.push((row_number, member));
        } else {
            outcome.skipped.push(SkippedRecord {
                row_index: row_number,
                call_up_number: member.call_up_number.clone(),
                name: member.name.clone(),
                email: member.email.clone(),
                reasons,
            });
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digit_part() {
        assert_eq!(digit_part("CALL-131").as_deref(), Some("131"));
        assert_eq!(digit_part("131").as_deref(), Some("131"));
        assert_eq!(digit_part("SAN-2004-X9").as_deref(), Some("2004"));
        assert_eq!(digit_part("no digits"), None);
    }

    #[test]
    fn test_canonical_call_up() {
        assert_eq!(canonical_call_up("131"), "CALL-131");
        assert_eq!(canonical_call_up("0131"), "CALL-131");
        assert_eq!(canonical_call_up("999"), "CALL-999");
        assert_eq!(canonical_call_up("1000"), "1000");
        assert_eq!(canonical_call_up("2041"), "2041");
        assert_eq!(canonical_call_up("CALL-131"), "CALL-131");
        assert_eq!(canonical_call_up("  131 "), "CALL-131");
    }

    #[test]
    fn test_canonical_is_idempotent() {
        for raw in ["131", "1000", "CALL-7", "A-99"] {
            let once = canonical_call_up(raw);
            assert_eq!(canonical_call_up(&once), once);
        }
    }
}
