//! Stream consumer
//!
//! Binds a broker to one stream, group and consumer ID so the worker loop
//! doesn't have to thread them through every call.

use crate::broker::StreamBroker;
use crate::config::WorkerConfig;
use crate::error::StreamError;
use crate::event::StreamMessage;
use std::sync::Arc;
use std::time::Duration;

/// Stream consumer for one member of a consumer group
pub struct StreamConsumer {
    broker: Arc<dyn StreamBroker>,
    config: WorkerConfig,
}

impl StreamConsumer {
    /// Create a new StreamConsumer
    pub fn new(broker: Arc<dyn StreamBroker>, config: WorkerConfig) -> Self {
        Self { broker, config }
    }

    /// Get the underlying broker
    pub fn broker(&self) -> Arc<dyn StreamBroker> {
        self.broker.clone()
    }

    pub fn stream_name(&self) -> &str {
        &self.config.stream_name
    }

    pub fn consumer_group(&self) -> &str {
        &self.config.consumer_group
    }

    pub fn consumer_id(&self) -> &str {
        &self.config.consumer_id
    }

    pub fn is_blocking(&self) -> bool {
        self.config.is_blocking()
    }

    /// Create the consumer group if it doesn't exist
    pub async fn ensure_consumer_group(&self) -> Result<(), StreamError> {
        self.broker
            .ensure_group(&self.config.stream_name, &self.config.consumer_group)
            .await
    }

    /// Read messages delivered to this consumer but never acknowledged
    pub async fn read_pending(&self) -> Result<Vec<StreamMessage>, StreamError> {
        self.broker
            .read_pending(
                &self.config.stream_name,
                &self.config.consumer_group,
                &self.config.consumer_id,
                self.config.batch_size,
            )
            .await
    }

    /// Read new messages, blocking up to the configured timeout
    pub async fn read_new(&self) -> Result<Vec<StreamMessage>, StreamError> {
        self.broker
            .read_new(
                &self.config.stream_name,
                &self.config.consumer_group,
                &self.config.consumer_id,
                self.config.batch_size,
                self.config.block_timeout_ms.map(Duration::from_millis),
            )
            .await
    }

    /// Claim entries left pending too long by any consumer of the group.
    ///
    /// Returns nothing when claiming is disabled.
    pub async fn claim_idle(&self) -> Result<Vec<StreamMessage>, StreamError> {
        let Some(idle_ms) = self.config.claim_idle_ms else {
            return Ok(Vec::new());
        };

        self.broker
            .claim_idle(
                &self.config.stream_name,
                &self.config.consumer_group,
                &self.config.consumer_id,
                Duration::from_millis(idle_ms),
                self.config.batch_size,
            )
            .await
    }

    /// Acknowledge a processed message
    pub async fn ack(&self, stream_id: &str) -> Result<(), StreamError> {
        self.broker
            .ack(
                &self.config.stream_name,
                &self.config.consumer_group,
                stream_id,
            )
            .await
    }

    /// Current stream depth
    pub async fn stream_length(&self) -> Result<usize, StreamError> {
        self.broker.stream_length(&self.config.stream_name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStreamBroker;

    #[tokio::test]
    async fn test_consumer_reads_and_acks() {
        let broker = InMemoryStreamBroker::new();
        let config = WorkerConfig::new("orders", "billing")
            .with_consumer_id("c1")
            .with_blocking(None);
        let consumer = StreamConsumer::new(Arc::new(broker.clone()), config);

        consumer.ensure_consumer_group().await.unwrap();
        broker.publish("orders", b"one", 100).await.unwrap();

        let messages = consumer.read_new().await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(consumer.read_pending().await.unwrap().len(), 1);

        consumer.ack(&messages[0].stream_id).await.unwrap();
        assert!(consumer.read_pending().await.unwrap().is_empty());
        assert_eq!(consumer.stream_length().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_claim_disabled() {
        let broker = InMemoryStreamBroker::new();
        broker.ensure_group("orders", "billing").await.unwrap();
        broker.publish("orders", b"one", 100).await.unwrap();
        broker.read_new("orders", "billing", "gone", 10, None).await.unwrap();

        let config = WorkerConfig::new("orders", "billing")
            .with_consumer_id("c1")
            .with_claim_idle_ms(None);
        let consumer = StreamConsumer::new(Arc::new(broker.clone()), config);

        assert!(consumer.claim_idle().await.unwrap().is_empty());
        assert_eq!(broker.pending_count("orders", "billing").await, 1);
    }
}
