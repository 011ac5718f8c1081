//! Event publisher
//!
//! Turns committed user mutations into `UserEvent`s on the `user-events`
//! stream. Publishing is a separate step after the store write; nothing here
//! participates in the store's transaction.

use async_trait::async_trait;
use domain_user_events::{Operation, UserEvent, UserEventStream, encode};
use std::sync::Arc;
use stream_worker::{StreamBroker, StreamError, StreamProducer};
use thiserror::Error;
use tracing::debug;

/// The broker did not accept the event
#[derive(Debug, Error)]
#[error("Failed to publish {operation} event for '{email}': {source}")]
pub struct DeliveryError {
    pub operation: Operation,
    pub email: String,
    #[source]
    pub source: StreamError,
}

/// Publishes user lifecycle events
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, operation: Operation, email: &str) -> Result<(), DeliveryError>;
}

/// `EventPublisher` backed by a stream producer bound to `user-events`
#[derive(Clone)]
pub struct StreamEventPublisher {
    producer: StreamProducer,
}

impl StreamEventPublisher {
    /// Single attempt per event.
    pub fn new(broker: Arc<dyn StreamBroker>) -> Self {
        Self {
            producer: StreamProducer::from_stream_def::<UserEventStream>(broker),
        }
    }

    /// Retry transient broker failures, up to `max_attempts` attempts in total.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.producer = self.producer.with_max_attempts(max_attempts);
        self
    }
}

#[async_trait]
impl EventPublisher for StreamEventPublisher {
    async fn publish(&self, operation: Operation, email: &str) -> Result<(), DeliveryError> {
        let payload = encode(&UserEvent::new(operation, email));

        let stream_id = self
            .producer
            .send(&payload)
            .await
            .map_err(|source| DeliveryError {
                operation,
                email: email.to_string(),
                source,
            })?;

        debug!(
            stream = %self.producer.stream_name(),
            stream_id = %stream_id,
            operation = %operation,
            "Published user event"
        );
        Ok(())
    }
}
