//! Invitation dispatch
//!
//! Sweeps pending members and emails each one an activation link. Sends are
//! strictly sequential with jittered pauses between members and a longer
//! pause between batches, to stay under provider rate limits. One bad
//! address never stops the sweep.

use std::time::Duration;

use rand::Rng;
use serde::Serialize;
use uuid::Uuid;

use shared::AppError;
use shared::util::now_millis;

use crate::db::{MemberStore, PendingMember};
use crate::mail::template::{INVITATION_SUBJECT, activation_email};
use crate::mail::{MailError, MailTransport};
use crate::util::generate_activation_token;

/// Hard ceiling on a single send, including the transport's own retries.
const SEND_TIMEOUT: Duration = Duration::from_secs(60);

/// Pause ranges between sends. Defaults: 2-3s between members, 5-10s
/// between batches of 10.
#[derive(Debug, Clone)]
pub struct PacingPolicy {
    pub per_item: (Duration, Duration),
    pub per_batch: (Duration, Duration),
    pub batch_size: usize,
}

impl Default for PacingPolicy {
    fn default() -> Self {
        Self {
            per_item: (Duration::from_secs(2), Duration::from_secs(3)),
            per_batch: (Duration::from_secs(5), Duration::from_secs(10)),
            batch_size: 10,
        }
    }
}

impl PacingPolicy {
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    fn item_pause(&self) -> Duration {
        jitter(self.per_item)
    }

    fn batch_pause(&self) -> Duration {
        jitter(self.per_batch)
    }
}

fn jitter((min, max): (Duration, Duration)) -> Duration {
    let min_ms = min.as_millis() as u64;
    let max_ms = max.as_millis() as u64;
    if max_ms <= min_ms {
        return min;
    }
    Duration::from_millis(rand::thread_rng().gen_range(min_ms..=max_ms))
}

/// What to sweep and how fast.
#[derive(Debug, Clone, Default)]
pub struct SweepOptions {
    /// Restrict the sweep to these members (used right after an import).
    pub member_ids: Option<Vec<Uuid>>,
    /// Include members already marked as invited.
    pub force_resend: bool,
    pub pacing: PacingPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchStatus {
    /// Email delivered and recorded.
    Success,
    /// Email delivered but the outcome could not be recorded.
    Warning,
    Failed,
}

/// Per-member outcome in the sweep report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchResult {
    pub email: String,
    pub status: DispatchStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepSummary {
    pub successful: usize,
    pub warnings: usize,
    pub failed: usize,
}

/// Full report of one invitation sweep.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub success: bool,
    pub sent: usize,
    pub total: usize,
    pub results: Vec<DispatchResult>,
    pub summary: SweepSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Run one invitation sweep.
pub async fn run_sweep(
    store: &dyn MemberStore,
    mailer: &dyn MailTransport,
    base_url: &str,
    opts: &SweepOptions,
) -> Result<SweepReport, AppError> {
    let pending = store
        .find_pending(opts.member_ids.as_deref(), opts.force_resend)
        .await?;

    if pending.is_empty() {
        return Ok(SweepReport {
            success: true,
            sent: 0,
            total: 0,
            results: Vec::new(),
            summary: SweepSummary::default(),
            message: Some("No users found matching criteria".into()),
        });
    }

    let total = pending.len();
    tracing::info!(total = total, force_resend = opts.force_resend, "Starting invitation sweep");

    let mut results: Vec<DispatchResult> = Vec::with_capacity(total);
    let batches: Vec<&[PendingMember]> = pending.chunks(opts.pacing.batch_size).collect();
    let batch_count = batches.len();

    for (batch_idx, batch) in batches.into_iter().enumerate() {
        for member in batch {
            results.push(dispatch_one(store, mailer, base_url, member).await);
            let pause = opts.pacing.item_pause();
            tokio::time::sleep(pause).await;
        }
        if batch_idx + 1 < batch_count {
            let pause = opts.pacing.batch_pause();
            tracing::debug!(batch = batch_idx + 1, pause_ms = pause.as_millis() as u64, "Batch complete");
            tokio::time::sleep(pause).await;
        }
    }

    let summary = SweepSummary {
        successful: results
            .iter()
            .filter(|r| r.status == DispatchStatus::Success)
            .count(),
        warnings: results
            .iter()
            .filter(|r| r.status == DispatchStatus::Warning)
            .count(),
        failed: results
            .iter()
            .filter(|r| r.status == DispatchStatus::Failed)
            .count(),
    };
    let sent = summary.successful + summary.warnings;

    tracing::info!(
        sent = sent,
        failed = summary.failed,
        total = total,
        "Invitation sweep complete"
    );

    Ok(SweepReport {
        success: true,
        sent,
        total,
        results,
        summary,
        message: None,
    })
}

/// Send one invitation, refreshing the activation token first if it is
/// missing or expired.
async fn dispatch_one(
    store: &dyn MemberStore,
    mailer: &dyn MailTransport,
    base_url: &str,
    member: &PendingMember,
) -> DispatchResult {
    let failed = |reason: Option<String>, error: Option<String>| DispatchResult {
        email: member.email.clone(),
        status: DispatchStatus::Failed,
        reason,
        error,
        message: None,
    };

    let token = if member.has_valid_token(now_millis()) {
        member.activation_token.clone().unwrap_or_default()
    } else {
        let had_token = member.activation_token.is_some();
        let (token, expires_at) = generate_activation_token();
        if let Err(e) = store.set_activation_token(member.id, &token, expires_at).await {
            let reason = if had_token {
                "Failed to update expired token"
            } else {
                "Failed to generate activation token"
            };
            tracing::warn!(email = %member.email, error = %e, "{reason}");
            return failed(Some(reason.into()), Some(e.to_string()));
        }
        token
    };

    let link = format!("{base_url}/activate?token={token}");
    let html = activation_email(&member.full_name, &link);

    let send_result = match tokio::time::timeout(
        SEND_TIMEOUT,
        mailer.send(&member.email, INVITATION_SUBJECT, &html),
    )
    .await
    {
        Ok(result) => result,
        Err(_) => Err(MailError::Timeout),
    };

    match send_result {
        Ok(()) => match store.record_dispatch_outcome(member.id, true, "").await {
            Ok(()) => DispatchResult {
                email: member.email.clone(),
                status: DispatchStatus::Success,
                reason: None,
                error: None,
                message: None,
            },
            Err(e) => {
                tracing::warn!(email = %member.email, error = %e, "Sent but failed to record outcome");
                DispatchResult {
                    email: member.email.clone(),
                    status: DispatchStatus::Warning,
                    reason: None,
                    error: None,
                    message: Some("Email sent but failed to update database".into()),
                }
            }
        },
        Err(e) => {
            tracing::warn!(email = %member.email, error = %e, "Invitation send failed");
            let err_text = e.to_string();
            if let Err(db_err) = store
                .record_dispatch_outcome(member.id, false, &err_text)
                .await
            {
                tracing::warn!(email = %member.email, error = %db_err, "Failed to record send failure");
            }
            failed(None, Some(err_text))
        }
    }
}
