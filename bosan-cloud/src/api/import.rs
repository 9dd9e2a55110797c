//! Bulk member import endpoint

use axum::Json;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use serde_json::json;

use shared::{AppError, ErrorCode};

use crate::api::sanitize_error;
use crate::db::MemberStore;
use crate::pipeline::dispatch::{PacingPolicy, SweepOptions, run_sweep};
use crate::pipeline::ingest::{self, REQUIRED_HEADERS};
use crate::pipeline::{ImportReport, run_import};
use crate::state::AppState;

/// Form field names accepted for the spreadsheet upload.
const FILE_FIELDS: [&str; 3] = ["file", "excel", "excelFile"];

struct ImportForm {
    file: Option<(String, Vec<u8>)>,
    send_invites: bool,
    batch_size: Option<usize>,
    seen_fields: Vec<String>,
}

async fn read_form(mut multipart: Multipart) -> Result<ImportForm, AppError> {
    let mut form = ImportForm {
        file: None,
        send_invites: true,
        batch_size: None,
        seen_fields: Vec::new(),
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::invalid_request(format!("Malformed multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        form.seen_fields.push(name.clone());

        if FILE_FIELDS.contains(&name.as_str()) {
            let file_name = field.file_name().unwrap_or("upload").to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::invalid_request(format!("Failed to read upload: {e}")))?;
            form.file = Some((file_name, bytes.to_vec()));
        } else if name == "sendInvites" {
            let value = field.text().await.unwrap_or_default();
            form.send_invites = value != "false";
        } else if name == "batchSize" {
            let value = field.text().await.unwrap_or_default();
            form.batch_size = value.trim().parse().ok();
        }
    }

    Ok(form)
}

/// POST /api/members/import
///
/// Multipart upload of a member spreadsheet. Runs the whole pipeline and,
/// unless `sendInvites=false`, dispatches invitations to the members just
/// created before returning the combined report.
pub async fn import_members(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ImportReport>, AppError> {
    let multipart = multipart.map_err(|e| {
        AppError::invalid_request(format!("Expected multipart form data: {e}"))
            .with_hint("Submit the spreadsheet as a multipart/form-data upload")
    })?;

    let form = read_form(multipart).await?;

    let Some((file_name, bytes)) = form.file else {
        return Err(AppError::new(ErrorCode::NoFileProvided)
            .with_detail("availableFields", form.seen_fields)
            .with_hint(format!(
                "Upload the spreadsheet in a form field named one of: {}",
                FILE_FIELDS.join(", ")
            )));
    };

    tracing::info!(
        file = %file_name,
        size = bytes.len(),
        send_invites = form.send_invites,
        "Import upload received"
    );

    let grid = ingest::read_grid(&bytes, &file_name)?;
    let rows = ingest::parse_rows(&grid)?;
    let (valid, warnings) = ingest::validate_rows(rows)?;

    let mut report = run_import(&state.store, valid, warnings).await;

    if form.send_invites && !report.inserted_users.is_empty() {
        match &state.mailer {
            None => {
                tracing::warn!("Import requested invitations but mail transport is not configured");
                report.invite_error = Some(ErrorCode::MailConfigMissing.message().to_string());
            }
            Some(mailer) => {
                let opts = SweepOptions {
                    member_ids: Some(report.inserted_users.iter().map(|m| m.id).collect()),
                    force_resend: false,
                    pacing: match form.batch_size {
                        Some(n) => PacingPolicy::default().with_batch_size(n),
                        None => PacingPolicy::default(),
                    },
                };
                match run_sweep(&state.store, mailer.as_ref(), &state.base_url, &opts).await {
                    Ok(sweep) => {
                        report.invites_sent = true;
                        report.invite_results = Some(sweep);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Post-import invitation sweep failed");
                        report.invite_error =
                            Some(sanitize_error(e, state.is_development()).message);
                    }
                }
            }
        }
    }

    Ok(Json(report))
}

/// GET /api/members/import
///
/// Import status: required columns plus a snapshot of the member table.
pub async fn import_info(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let stats = state
        .store
        .stats()
        .await
        .map_err(|e| sanitize_error(e.into(), state.is_development()))?;
    Ok(Json(json!({
        "status": "operational",
        "endpoint": "/api/members/import",
        "requiredColumns": REQUIRED_HEADERS,
        "optionalColumns": ["legacyId", "elevationYear", "debitBalance"],
        "acceptedFileTypes": [".xlsx", ".xls"],
        "databaseInfo": {
            "totalMembers": stats.total,
            "legacyNumericCallUps": stats.legacy_numeric,
            "autoMigrationEnabled": true,
        },
    })))
}
