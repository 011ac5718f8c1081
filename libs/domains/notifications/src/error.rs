//! Error types for the notifications domain.

use domain_user_events::CodecError;
use stream_worker::StreamError;
use thiserror::Error;

/// Result type for notification operations.
pub type NotificationResult<T> = Result<T, NotificationError>;

/// Errors that can occur in the notifications domain.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// The event could not be decoded.
    #[error(transparent)]
    Malformed(#[from] CodecError),

    /// Decoded, but no template exists for this operation code.
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    /// The mail gateway failed to transmit the message.
    #[error("Mail delivery failed: {0}")]
    MailDelivery(String),

    /// Template rendering error.
    #[error("Template rendering error: {0}")]
    TemplateError(String),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl NotificationError {
    /// Short label used for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            NotificationError::Malformed(_) => "malformed",
            NotificationError::UnknownOperation(_) => "unknown_operation",
            NotificationError::MailDelivery(_) => "mail_delivery",
            NotificationError::TemplateError(_) => "template",
            NotificationError::InvalidEmail(_) => "invalid_email",
            NotificationError::ConfigError(_) => "config",
        }
    }
}

impl From<handlebars::RenderError> for NotificationError {
    fn from(err: handlebars::RenderError) -> Self {
        NotificationError::TemplateError(err.to_string())
    }
}

impl From<core_config::ConfigError> for NotificationError {
    fn from(err: core_config::ConfigError) -> Self {
        NotificationError::ConfigError(err.to_string())
    }
}

/// Every notification failure is final for the message that caused it.
impl From<NotificationError> for StreamError {
    fn from(err: NotificationError) -> Self {
        StreamError::permanent(err.to_string())
    }
}
