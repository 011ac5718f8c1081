//! Email provider implementations.
//!
//! This module contains the `EmailProvider` trait (the mail gateway) and
//! its implementations.

mod mock;
mod smtp;

pub use mock::MockSmtpProvider;
pub use smtp::{SmtpConfig, SmtpProvider};

use crate::error::NotificationResult;
use async_trait::async_trait;

/// Represents a sent email with provider-specific message ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    /// Provider-specific message ID for tracking.
    pub message_id: Option<String>,
    /// Whether the email was accepted for delivery.
    pub accepted: bool,
}

/// Email content ready for sending.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmailContent {
    /// Recipient email address.
    pub to_email: String,
    /// Email subject.
    pub subject: String,
    /// Plain text body content.
    pub text_body: String,
    /// HTML body content.
    pub html_body: String,
}

/// Trait for email sending providers.
///
/// A send is a single attempt: implementations report failure and leave any
/// retry decision to the caller.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmailProvider: Send + Sync {
    /// Send an email.
    async fn send(&self, email: &EmailContent) -> NotificationResult<SentEmail>;

    /// Get the provider name for logging.
    fn name(&self) -> &'static str;

    /// Check if the provider is healthy/configured.
    async fn health_check(&self) -> NotificationResult<bool>;
}
