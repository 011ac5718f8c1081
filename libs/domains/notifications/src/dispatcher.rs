//! Notification dispatcher
//!
//! Maps an operation code to its template and hands the rendered message to
//! the mail gateway. Exactly one send attempt per call.

use crate::error::{NotificationError, NotificationResult};
use crate::providers::{EmailContent, EmailProvider, SentEmail};
use crate::templates::TemplateEngine;
use domain_user_events::Operation;
use metrics::counter;
use std::sync::Arc;
use tracing::{info, warn};

/// Sends the notification email for a user lifecycle operation.
#[derive(Clone)]
pub struct NotificationDispatcher {
    provider: Arc<dyn EmailProvider>,
    templates: TemplateEngine,
}

impl NotificationDispatcher {
    pub fn new(provider: Arc<dyn EmailProvider>) -> NotificationResult<Self> {
        Ok(Self {
            provider,
            templates: TemplateEngine::new()?,
        })
    }

    pub fn with_templates(provider: Arc<dyn EmailProvider>, templates: TemplateEngine) -> Self {
        Self {
            provider,
            templates,
        }
    }

    pub fn provider(&self) -> &Arc<dyn EmailProvider> {
        &self.provider
    }

    /// Render and send the email for `operation` to `email`.
    ///
    /// `operation` is matched case-insensitively. Unknown codes fail with
    /// [`NotificationError::UnknownOperation`] before anything is sent; a
    /// gateway failure comes back as [`NotificationError::MailDelivery`] and
    /// is not retried here.
    pub async fn dispatch(&self, operation: &str, email: &str) -> NotificationResult<SentEmail> {
        let parsed: Operation = operation.parse().map_err(|_| {
            warn!(operation = %operation, to = %email, "No template for operation");
            NotificationError::UnknownOperation(operation.to_string())
        })?;

        let rendered = self.templates.render(parsed, email)?;
        let content = EmailContent {
            to_email: email.to_string(),
            subject: rendered.subject,
            text_body: rendered.text,
            html_body: rendered.html,
        };

        // Whatever the gateway reports, the caller sees a delivery failure
        let sent = match self.provider.send(&content).await {
            Ok(sent) => sent,
            Err(NotificationError::MailDelivery(reason)) => {
                return Err(self.delivery_failed(parsed, email, reason));
            }
            Err(e) => return Err(self.delivery_failed(parsed, email, e.to_string())),
        };

        counter!(
            "notifications_sent_total",
            "operation" => parsed.as_ref().to_string(),
            "provider" => self.provider.name()
        )
        .increment(1);

        info!(
            operation = %parsed,
            to = %email,
            provider = self.provider.name(),
            message_id = ?sent.message_id,
            "Notification sent"
        );

        Ok(sent)
    }

    fn delivery_failed(
        &self,
        operation: Operation,
        email: &str,
        reason: String,
    ) -> NotificationError {
        counter!(
            "notifications_failed_total",
            "operation" => operation.as_ref().to_string(),
            "provider" => self.provider.name()
        )
        .increment(1);

        warn!(
            operation = %operation,
            to = %email,
            provider = self.provider.name(),
            error = %reason,
            "Notification delivery failed"
        );

        NotificationError::MailDelivery(reason)
    }
}
