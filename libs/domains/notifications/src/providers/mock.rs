//! Capturing email provider for tests and local runs without an SMTP server

use super::{EmailContent, EmailProvider, SentEmail};
use crate::error::{NotificationError, NotificationResult};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Email provider that records every message instead of sending it.
///
/// Clones share the same outbox, so a test can keep one handle and give the
/// other to the code under test.
#[derive(Clone, Default)]
pub struct MockSmtpProvider {
    sent_emails: Arc<Mutex<Vec<EmailContent>>>,
    failure_message: Option<String>,
}

impl MockSmtpProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// A provider whose every send fails with `message`
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            sent_emails: Arc::new(Mutex::new(Vec::new())),
            failure_message: Some(message.into()),
        }
    }

    pub async fn sent_emails(&self) -> Vec<EmailContent> {
        self.sent_emails.lock().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent_emails.lock().await.len()
    }

    pub async fn clear(&self) {
        self.sent_emails.lock().await.clear();
    }

    /// Check if an email was sent to a specific address
    pub async fn was_sent_to(&self, email: &str) -> bool {
        self.sent_emails
            .lock()
            .await
            .iter()
            .any(|e| e.to_email == email)
    }
}

#[async_trait]
impl EmailProvider for MockSmtpProvider {
    async fn send(&self, email: &EmailContent) -> NotificationResult<SentEmail> {
        if let Some(message) = &self.failure_message {
            return Err(NotificationError::MailDelivery(message.clone()));
        }

        let mut sent = self.sent_emails.lock().await;
        sent.push(email.clone());

        Ok(SentEmail {
            message_id: Some(format!("mock-{}", sent.len())),
            accepted: true,
        })
    }

    fn name(&self) -> &'static str {
        "mock"
    }

    async fn health_check(&self) -> NotificationResult<bool> {
        Ok(self.failure_message.is_none())
    }
}
