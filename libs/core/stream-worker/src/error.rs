//! Stream error types and error categorization
//!
//! Errors are categorized so callers can tell what to do with them:
//! - **Transient**: broker hiccups, worth another attempt after a backoff
//! - **Permanent**: the entry itself is bad, never attempted again

use thiserror::Error;

/// Category of error for determining retry behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Temporary failure - retry with exponential backoff (100ms-5s)
    Transient,
    /// Unrecoverable error - report and move on
    Permanent,
}

impl ErrorCategory {
    /// Get the base delay in milliseconds for this error category
    pub fn base_delay_ms(&self) -> u64 {
        match self {
            ErrorCategory::Transient => 100,
            ErrorCategory::Permanent => 0,
        }
    }

    /// Get the maximum delay in milliseconds for this error category
    pub fn max_delay_ms(&self) -> u64 {
        match self {
            ErrorCategory::Transient => 5_000,
            ErrorCategory::Permanent => 0,
        }
    }

    /// Calculate exponential backoff delay for given retry count
    pub fn backoff_delay_ms(&self, retry_count: u32) -> u64 {
        if *self == ErrorCategory::Permanent {
            return 0;
        }

        let base = self.base_delay_ms();
        let max = self.max_delay_ms();
        let delay = base.saturating_mul(2u64.saturating_pow(retry_count));
        delay.min(max)
    }

    /// Label used in logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Transient => "transient",
            ErrorCategory::Permanent => "permanent",
        }
    }
}

/// Stream processing errors
#[derive(Error, Debug)]
pub enum StreamError {
    /// Redis connection or command error
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Broker error not tied to a Redis command (in-memory broker, closed channel)
    #[error("Broker error: {0}")]
    Broker(String),

    /// Consumer group does not exist on the stream
    #[error("Consumer group '{group}' missing on stream '{stream}'")]
    NoGroup { stream: String, group: String },

    /// Message processing failed
    #[error("Processing error: {message}")]
    Processing {
        message: String,
        category: ErrorCategory,
    },

    /// Handler panicked while processing a message
    #[error("Processor panicked: {0}")]
    Panicked(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl StreamError {
    /// Create a transient processing error
    pub fn transient(message: impl Into<String>) -> Self {
        StreamError::Processing {
            message: message.into(),
            category: ErrorCategory::Transient,
        }
    }

    /// Create a permanent processing error
    pub fn permanent(message: impl Into<String>) -> Self {
        StreamError::Processing {
            message: message.into(),
            category: ErrorCategory::Permanent,
        }
    }

    /// Get the error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            StreamError::Redis(_) => ErrorCategory::Transient,
            StreamError::Broker(_) => ErrorCategory::Transient,
            StreamError::NoGroup { .. } => ErrorCategory::Transient,
            StreamError::Processing { category, .. } => *category,
            StreamError::Panicked(_) => ErrorCategory::Permanent,
            StreamError::Config(_) => ErrorCategory::Permanent,
        }
    }

    /// Whether another attempt is allowed after `attempt` attempts out of `max_attempts`
    pub fn should_retry(&self, attempt: u32, max_attempts: u32) -> bool {
        self.category() == ErrorCategory::Transient && attempt < max_attempts
    }

    /// Get the backoff delay for retry
    pub fn backoff_delay_ms(&self, retry_count: u32) -> u64 {
        self.category().backoff_delay_ms(retry_count)
    }

    /// The consumer group was deleted or never created
    pub fn is_nogroup_error(&self) -> bool {
        match self {
            StreamError::NoGroup { .. } => true,
            StreamError::Redis(e) => e.to_string().contains("NOGROUP"),
            _ => false,
        }
    }

    /// Lost or refused connection to the broker
    pub fn is_connection_error(&self) -> bool {
        match self {
            StreamError::Redis(e) => {
                e.is_connection_refusal() || e.is_connection_dropped() || e.is_io_error()
            }
            _ => false,
        }
    }

    /// Command timed out (not a BLOCK timeout, which yields an empty read)
    pub fn is_timeout(&self) -> bool {
        match self {
            StreamError::Redis(e) => e.is_timeout(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_calculation() {
        // Transient: 100ms, 200ms, 400ms, ... capped at 5s
        assert_eq!(ErrorCategory::Transient.backoff_delay_ms(0), 100);
        assert_eq!(ErrorCategory::Transient.backoff_delay_ms(1), 200);
        assert_eq!(ErrorCategory::Transient.backoff_delay_ms(2), 400);
        assert_eq!(ErrorCategory::Transient.backoff_delay_ms(10), 5_000);
        assert_eq!(ErrorCategory::Transient.backoff_delay_ms(u32::MAX), 5_000);

        assert_eq!(ErrorCategory::Permanent.backoff_delay_ms(0), 0);
    }

    #[test]
    fn test_should_retry() {
        let transient = StreamError::transient("broker busy");
        assert!(transient.should_retry(1, 3));
        assert!(!transient.should_retry(3, 3));

        let permanent = StreamError::permanent("bad payload");
        assert!(!permanent.should_retry(0, 3));
    }

    #[test]
    fn test_nogroup_detection() {
        let err = StreamError::NoGroup {
            stream: "user-events".to_string(),
            group: "notification-group".to_string(),
        };
        assert!(err.is_nogroup_error());
        assert!(!StreamError::Broker("closed".to_string()).is_nogroup_error());
    }

    #[test]
    fn test_category_labels() {
        assert_eq!(StreamError::Panicked("boom".into()).category().as_str(), "permanent");
        assert_eq!(StreamError::Broker("x".into()).category().as_str(), "transient");
    }
}
