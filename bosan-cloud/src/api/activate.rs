//! Account activation endpoint

use axum::Json;
use axum::extract::State;
use serde::Deserialize;
use serde_json::json;

use shared::util::now_millis;
use shared::{AppError, ErrorCode};

use crate::api::sanitize_error;
use crate::db::MemberStore;
use crate::state::AppState;
use crate::util::hash_password;

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Deserialize)]
pub struct ActivateRequest {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub password: String,
}

/// POST /api/activate
///
/// Consume an emailed activation token: set the member's password, mark
/// the account active, and clear the token.
pub async fn activate_account(
    State(state): State<AppState>,
    Json(req): Json<ActivateRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    if req.token.is_empty() || req.password.is_empty() {
        return Err(AppError::invalid_request("Missing token or password"));
    }
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::with_message(
            ErrorCode::PasswordTooShort,
            format!("Password must be at least {MIN_PASSWORD_LEN} characters"),
        ));
    }

    let member = state
        .store
        .find_by_activation_token(&req.token, now_millis())
        .await
        .map_err(|e| sanitize_error(e.into(), state.is_development()))?
        .ok_or_else(|| {
            AppError::with_message(
                ErrorCode::ActivationTokenInvalid,
                "Invalid or expired activation token",
            )
        })?;

    let hashed =
        hash_password(&req.password).map_err(|e| sanitize_error(e, state.is_development()))?;
    state
        .store
        .activate(member.id, &hashed)
        .await
        .map_err(|e| sanitize_error(e.into(), state.is_development()))?;

    tracing::info!(member_id = %member.id, "Account activated");

    Ok(Json(json!({
        "success": true,
        "message": "Account activated successfully",
    })))
}
