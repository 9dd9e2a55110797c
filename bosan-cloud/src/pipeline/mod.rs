//! Bulk onboarding pipeline
//!
//! Import stages, in order: format migration of stored call-up numbers,
//! transformation of validated rows, duplicate resolution against stored
//! members, then per-row provisioning. Invitation dispatch runs separately
//! (or immediately after an import, when requested).

use serde::Serialize;

use crate::db::MemberStore;

pub mod dedup;
pub mod dispatch;
pub mod ingest;
pub mod provision;

use dedup::SkippedRecord;
use dispatch::SweepReport;
use provision::{FailedInsert, InsertedMember};

/// How many validation errors are quoted verbatim in a partial-success
/// report; the rest are only counted.
const VALIDATION_SAMPLE: usize = 10;

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub total_processed: usize,
    pub successfully_added: usize,
    pub skipped_duplicates: usize,
    pub failed: usize,
    pub migration_performed: bool,
    pub migrated_count: u64,
}

/// Full JSON report of one import.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub success: bool,
    pub message: String,
    pub summary: ImportSummary,
    pub inserted_users: Vec<InsertedMember>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped_records: Vec<SkippedRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped_message: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed_inserts: Vec<FailedInsert>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_message: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub validation_warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_validation_errors: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate_check_warning: Option<String>,
    pub invites_sent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invite_results: Option<SweepReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invite_error: Option<String>,
}

/// Run the import pipeline over validated rows.
///
/// `validation_warnings` are the per-row errors from ingest; rows that
/// produced them are already gone, but the report still accounts for them.
/// Invitation dispatch is not part of this function: the HTTP handler
/// attaches sweep results afterwards when `sendInvites` is requested.
pub async fn run_import(
    store: &dyn MemberStore,
    rows: Vec<ingest::ValidRow>,
    validation_warnings: Vec<String>,
) -> ImportReport {
    let migration = dedup::migrate_call_up_numbers(store).await;

    let candidates: Vec<(usize, shared::NewMember)> = rows
        .iter()
        .map(|row| (row.row_number, provision::transform(row)))
        .collect();
    let total_processed = candidates.len() + count_invalid_rows(&validation_warnings);

    let resolved = dedup::resolve_duplicates(store, candidates).await;
    let report = provision::provision_members(store, &resolved.unique).await;

    let summary = ImportSummary {
        total_processed,
        successfully_added: report.inserted.len(),
        skipped_duplicates: resolved.skipped.len(),
        failed: report.failed.len(),
        migration_performed: migration.performed,
        migrated_count: migration.migrated_count,
    };

    let message = format!(
        "Import completed: {} users added, {} skipped, {} failed",
        summary.successfully_added, summary.skipped_duplicates, summary.failed
    );
    tracing::info!(
        added = summary.successfully_added,
        skipped = summary.skipped_duplicates,
        failed = summary.failed,
        "{message}"
    );

    let total_validation_errors =
        (!validation_warnings.is_empty()).then_some(validation_warnings.len());

    ImportReport {
        success: true,
        message,
        summary,
        inserted_users: report.inserted,
        skipped_message: (!resolved.skipped.is_empty())
            .then(|| "Some records were skipped because they already exist".into()),
        skipped_records: resolved.skipped,
        failed_message: (!report.failed.is_empty())
            .then(|| "Some records could not be inserted".into()),
        failed_inserts: report.failed,
        validation_warnings: validation_warnings
            .into_iter()
            .take(VALIDATION_SAMPLE)
            .collect(),
        total_validation_errors,
        duplicate_check_warning: resolved.warning,
        invites_sent: false,
        invite_results: None,
        invite_error: None,
    }
}

/// Each invalid row contributes at least one warning; warnings sharing a
/// row prefix are counted once.
fn count_invalid_rows(warnings: &[String]) -> usize {
    let mut rows: Vec<&str> = warnings
        .iter()
        .filter_map(|w| w.split(':').next())
        .collect();
    rows.sort_unstable();
    rows.dedup();
    rows.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_invalid_rows_dedups_by_row() {
        let warnings = vec![
            "Row 3: Invalid email format".to_string(),
            "Row 3: Name is required".to_string(),
            "Row 7: Invalid elevation year".to_string(),
        ];
        assert_eq!(count_invalid_rows(&warnings), 2);
        assert_eq!(count_invalid_rows(&[]), 0);
    }
}
