//! Outbound mail
//!
//! [`MailTransport`] is the seam between the invitation dispatcher and the
//! actual delivery mechanism. Production uses [`SesTransport`]; tests use a
//! recording mock.

use async_trait::async_trait;

pub mod ses;
pub mod template;

pub use ses::SesTransport;

/// Errors surfaced by a mail transport.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    /// Delivery failed after all retry attempts.
    #[error("Failed to send email: {0}")]
    Send(String),
    /// The send did not complete within the dispatcher's time budget.
    #[error("Email send timed out")]
    Timeout,
}

/// One-message email delivery. Implementations own their retry policy.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), MailError>;
}
