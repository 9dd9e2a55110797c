//! Invitation sweep endpoint

use axum::Json;
use axum::extract::State;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use shared::{AppError, ErrorCode};

use crate::api::sanitize_error;
use crate::db::MemberStore;
use crate::pipeline::dispatch::{PacingPolicy, SweepOptions, SweepReport, run_sweep};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SendInvitesRequest {
    /// Restrict the sweep to these members; sweeps all pending when absent.
    pub user_ids: Option<Vec<Uuid>>,
    /// Re-send to members already marked as invited.
    pub force_resend: bool,
    pub batch_size: Option<usize>,
}

/// POST /api/members/send-invites
///
/// Body is optional; an empty POST sweeps every pending invitation.
pub async fn send_invites(
    State(state): State<AppState>,
    body: Option<Json<SendInvitesRequest>>,
) -> Result<Json<SweepReport>, AppError> {
    let Some(mailer) = &state.mailer else {
        return Err(AppError::new(ErrorCode::MailConfigMissing)
            .with_hint("Set MAIL_FROM to a verified SES sender address"));
    };

    let req = body.map(|Json(r)| r).unwrap_or_default();

    let opts = SweepOptions {
        member_ids: req.user_ids,
        force_resend: req.force_resend,
        pacing: match req.batch_size {
            Some(n) => PacingPolicy::default().with_batch_size(n),
            None => PacingPolicy::default(),
        },
    };

    let report = run_sweep(&state.store, mailer.as_ref(), &state.base_url, &opts)
        .await
        .map_err(|e| sanitize_error(e, state.is_development()))?;
    Ok(Json(report))
}

/// GET /api/members/send-invites
///
/// Invitation statistics and usage notes.
pub async fn invite_stats(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let stats = state
        .store
        .stats()
        .await
        .map_err(|e| sanitize_error(e.into(), state.is_development()))?;
    Ok(Json(json!({
        "status": "operational",
        "endpoint": "/api/members/send-invites",
        "stats": stats,
        "usage": {
            "userIds": "optional array of member ids to restrict the sweep",
            "forceResend": "set true to re-send to already-invited members",
            "batchSize": "members per batch (default 10)",
        },
    })))
}
