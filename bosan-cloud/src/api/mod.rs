//! API routes for bosan-cloud

pub mod activate;
pub mod health;
pub mod import;
pub mod invites;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use shared::AppError;
use shared::error::ErrorCategory;

use crate::state::AppState;

/// Uploaded spreadsheets are capped at 10 MiB.
const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Create the service router
pub fn router(state: AppState) -> Router {
    let import = Router::new()
        .route(
            "/api/members/import",
            post(import::import_members).get(import::import_info),
        )
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES));

    Router::new()
        .route("/health", get(health::health_check))
        .merge(import)
        .route(
            "/api/members/send-invites",
            post(invites::send_invites).get(invites::invite_stats),
        )
        .route("/api/activate", post(activate::activate_account))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Strip technical detail from system errors before they reach a client.
///
/// In development the original message passes through unchanged; anywhere
/// else a 500-class error is reduced to its stock message. The full detail
/// is still logged when the error is rendered into a response.
pub(crate) fn sanitize_error(err: AppError, development: bool) -> AppError {
    if development || err.code.category() != ErrorCategory::System {
        err
    } else {
        AppError::new(err.code)
    }
}
