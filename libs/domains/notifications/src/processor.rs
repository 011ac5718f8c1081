//! User event processor for stream workers.
//!
//! Decodes each `user-events` entry and dispatches the matching notification.
//! Every failure is returned as a permanent error: the worker reports it,
//! acknowledges the entry and moves on to the next one.

use crate::dispatcher::NotificationDispatcher;
use crate::error::NotificationError;
use async_trait::async_trait;
use domain_user_events::decode;
use stream_worker::{StreamError, StreamMessage, StreamProcessor};
use tracing::{info, warn};

/// Stream processor that turns user events into emails.
#[derive(Clone)]
pub struct UserEventProcessor {
    dispatcher: NotificationDispatcher,
}

impl UserEventProcessor {
    pub fn new(dispatcher: NotificationDispatcher) -> Self {
        Self { dispatcher }
    }

    pub fn dispatcher(&self) -> &NotificationDispatcher {
        &self.dispatcher
    }
}

#[async_trait]
impl StreamProcessor for UserEventProcessor {
    async fn process(&self, message: &StreamMessage) -> Result<(), StreamError> {
        let event = decode(&message.payload).map_err(|e| {
            warn!(
                stream_id = %message.stream_id,
                error = %e,
                "Dropping malformed user event"
            );
            NotificationError::from(e)
        })?;

        info!(
            stream_id = %message.stream_id,
            operation = %event.operation,
            email = %event.email,
            redelivery = message.is_redelivery(),
            "Processing user event"
        );

        self.dispatcher
            .dispatch(&event.operation, &event.email)
            .await?;

        Ok(())
    }

    fn name(&self) -> &'static str {
        "user_event_processor"
    }

    async fn health_check(&self) -> Result<bool, StreamError> {
        self.dispatcher
            .provider()
            .health_check()
            .await
            .map_err(StreamError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::MockSmtpProvider;
    use domain_user_events::{UserEvent, encode};
    use std::sync::Arc;
    use stream_worker::ErrorCategory;

    fn processor(outbox: &MockSmtpProvider) -> UserEventProcessor {
        let dispatcher = NotificationDispatcher::new(Arc::new(outbox.clone())).unwrap();
        UserEventProcessor::new(dispatcher)
    }

    fn message(payload: &[u8]) -> StreamMessage {
        StreamMessage::new("1-0".to_string(), payload.to_vec())
    }

    #[tokio::test]
    async fn test_created_event_sends_email() {
        let outbox = MockSmtpProvider::new();
        let processor = processor(&outbox);

        processor
            .process(&message(&encode(&UserEvent::created("ann@x.com"))))
            .await
            .unwrap();

        let sent = outbox.sent_emails().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "Account created");
    }

    #[tokio::test]
    async fn test_malformed_payload_is_permanent() {
        let outbox = MockSmtpProvider::new();
        let processor = processor(&outbox);

        let err = processor.process(&message(b"not json")).await.unwrap_err();

        assert_eq!(err.category(), ErrorCategory::Permanent);
        assert_eq!(outbox.sent_count().await, 0);
    }

    #[tokio::test]
    async fn test_unknown_operation_is_permanent() {
        let outbox = MockSmtpProvider::new();
        let processor = processor(&outbox);

        let payload = br#"{"operation":"UPDATE","email":"ann@x.com"}"#;
        let err = processor.process(&message(payload)).await.unwrap_err();

        assert_eq!(err.category(), ErrorCategory::Permanent);
        assert!(err.to_string().contains("UPDATE"));
        assert_eq!(outbox.sent_count().await, 0);
    }

    #[tokio::test]
    async fn test_mail_failure_is_permanent() {
        let outbox = MockSmtpProvider::failing("smtp down");
        let processor = processor(&outbox);

        let err = processor
            .process(&message(&encode(&UserEvent::deleted("ann@x.com"))))
            .await
            .unwrap_err();

        assert_eq!(err.category(), ErrorCategory::Permanent);
        assert!(err.to_string().contains("smtp down"));
    }

    #[tokio::test]
    async fn test_health_check_follows_provider() {
        assert!(processor(&MockSmtpProvider::new()).health_check().await.unwrap());
        assert!(!processor(&MockSmtpProvider::failing("down")).health_check().await.unwrap());
    }
}
