//! SES-backed mail transport

use async_trait::async_trait;
use aws_sdk_sesv2::Client as SesClient;
use aws_sdk_sesv2::types::{Body, Content, Destination, EmailContent, Message};

use super::template::html_to_text;
use super::{MailError, MailTransport};

const MAX_ATTEMPTS: u32 = 3;

/// Mail transport backed by AWS SESv2.
///
/// Retries failed sends with exponential backoff before giving up; callers
/// see a single success or failure per message.
#[derive(Clone)]
pub struct SesTransport {
    ses: SesClient,
    from: String,
}

impl SesTransport {
    pub fn new(ses: SesClient, from: String) -> Self {
        Self { ses, from }
    }

    async fn send_once(&self, to: &str, subject: &str, html_body: &str) -> Result<(), MailError> {
        let subject = Content::builder()
            .data(subject)
            .build()
            .map_err(|e| MailError::Send(e.to_string()))?;

        let body = Body::builder()
            .html(
                Content::builder()
                    .data(html_body)
                    .build()
                    .map_err(|e| MailError::Send(e.to_string()))?,
            )
            .text(
                Content::builder()
                    .data(html_to_text(html_body))
                    .build()
                    .map_err(|e| MailError::Send(e.to_string()))?,
            )
            .build();

        let message = Message::builder().subject(subject).body(body).build();

        self.ses
            .send_email()
            .from_email_address(&self.from)
            .destination(Destination::builder().to_addresses(to).build())
            .content(EmailContent::builder().simple(message).build())
            .send()
            .await
            .map_err(|e| MailError::Send(e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl MailTransport for SesTransport {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), MailError> {
        let mut last_err = None;
        for attempt in 1..=MAX_ATTEMPTS {
            match self.send_once(to, subject, html_body).await {
                Ok(()) => {
                    tracing::info!(to = to, attempt = attempt, "Invitation email sent");
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(
                        to = to,
                        attempt = attempt,
                        error = %e,
                        "Email send attempt failed"
                    );
                    last_err = Some(e);
                    if attempt < MAX_ATTEMPTS {
                        let backoff = std::time::Duration::from_secs(1 << attempt);
                        tokio::time::sleep(backoff).await;
                    }
                }
            }
        }
        Err(last_err.unwrap_or_else(|| MailError::Send("unknown send failure".into())))
    }
}
