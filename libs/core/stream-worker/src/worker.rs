//! Core worker trait and the generic StreamWorker implementation.
//!
//! This module provides:
//! - `StreamProcessor` trait for message handlers
//! - `StreamWorker` struct for running the worker loop

use crate::broker::StreamBroker;
use crate::config::WorkerConfig;
use crate::consumer::StreamConsumer;
use crate::error::{ErrorCategory, StreamError};
use crate::event::StreamMessage;
use crate::metrics::StreamMetrics;
use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time::Instant as TokioInstant;
use tracing::{debug, error, info, warn};

const MAX_BACKOFF_SECS: u64 = 30;

/// Trait for message processors.
///
/// Domain handlers implement this trait to handle entries from the stream.
/// The worker acknowledges every entry once `process` returns, whatever the
/// outcome, so a failing entry is reported once and never redelivered.
///
/// # Example
///
/// ```rust,ignore
/// use stream_worker::{StreamProcessor, StreamError, StreamMessage};
///
/// struct AuditProcessor;
///
/// #[async_trait]
/// impl StreamProcessor for AuditProcessor {
///     async fn process(&self, message: &StreamMessage) -> Result<(), StreamError> {
///         let event = decode(&message.payload)
///             .map_err(|e| StreamError::permanent(e.to_string()))?;
///         audit_log(event);
///         Ok(())
///     }
///
///     fn name(&self) -> &'static str {
///         "audit_processor"
///     }
/// }
/// ```
#[async_trait]
pub trait StreamProcessor: Send + Sync {
    /// Handle a single stream entry.
    async fn process(&self, message: &StreamMessage) -> Result<(), StreamError>;

    /// Get the processor name for logging.
    fn name(&self) -> &'static str;

    /// Health check for the processor.
    ///
    /// Override this to check downstream services. Default: always healthy.
    async fn health_check(&self) -> Result<bool, StreamError> {
        Ok(true)
    }
}

/// Generic stream worker that feeds stream entries to a processor.
///
/// Each worker is one consumer in the group. It:
/// - creates the consumer group if missing
/// - drains its own pending entries on startup
/// - claims entries abandoned by other consumers, at startup and periodically
/// - handles entries strictly one at a time, in delivery order
/// - isolates failures and panics to the entry that caused them
/// - backs off on broker errors and stops on the shutdown signal
pub struct StreamWorker<P>
where
    P: StreamProcessor,
{
    consumer: StreamConsumer,
    processor: Arc<P>,
    config: WorkerConfig,
    metrics: StreamMetrics,
}

impl<P> StreamWorker<P>
where
    P: StreamProcessor + 'static,
{
    /// Create a new stream worker.
    pub fn new(broker: Arc<dyn StreamBroker>, processor: P, config: WorkerConfig) -> Self {
        Self::with_arc_processor(broker, Arc::new(processor), config)
    }

    /// Create a new stream worker with an Arc processor.
    pub fn with_arc_processor(
        broker: Arc<dyn StreamBroker>,
        processor: Arc<P>,
        config: WorkerConfig,
    ) -> Self {
        let consumer = StreamConsumer::new(broker, config.clone());
        let metrics = StreamMetrics::new(config.stream_name.clone(), processor.name());

        Self {
            consumer,
            processor,
            config,
            metrics,
        }
    }

    /// Get a reference to the consumer.
    pub fn consumer(&self) -> &StreamConsumer {
        &self.consumer
    }

    /// Get the processor.
    pub fn processor(&self) -> Arc<P> {
        self.processor.clone()
    }

    /// Processor health plus a broker round-trip.
    pub async fn health_check(&self) -> Result<bool, StreamError> {
        let depth = self.consumer.stream_length().await?;
        self.metrics.stream_depth(depth);
        self.processor.health_check().await
    }

    /// Run the worker loop until the shutdown receiver flips to `true`.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), StreamError> {
        info!(
            consumer_id = %self.config.consumer_id,
            stream = %self.config.stream_name,
            group = %self.config.consumer_group,
            processor = %self.processor.name(),
            "Starting stream worker"
        );

        self.consumer.ensure_consumer_group().await?;

        // Entries delivered to this consumer before a crash are handled first
        match self.drain_pending().await {
            Ok(0) => {}
            Ok(count) => info!(count = count, "Recovered pending messages"),
            Err(e) => warn!(error = %e, "Failed to drain pending messages on startup"),
        }

        // Then whatever consumers that never came back left behind
        if let Err(e) = self.claim_abandoned().await {
            warn!(error = %e, "Failed to claim abandoned messages on startup");
        }

        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);
        let claim_interval = self.config.claim_interval();
        let mut last_claim = TokioInstant::now();
        let is_blocking = self.consumer.is_blocking();

        // Track consecutive errors for exponential backoff
        let mut consecutive_errors: u32 = 0;

        if is_blocking {
            info!(
                block_timeout_ms = ?self.config.block_timeout_ms,
                claim_idle_ms = ?self.config.claim_idle_ms,
                batch_size = %self.config.batch_size,
                "Worker running in BLOCKING mode"
            );
        } else {
            info!(
                poll_interval_ms = %self.config.poll_interval_ms,
                claim_idle_ms = ?self.config.claim_idle_ms,
                batch_size = %self.config.batch_size,
                "Worker running in POLLING mode"
            );
        }

        loop {
            if *shutdown.borrow() {
                info!("Received shutdown signal, stopping worker");
                break;
            }

            // Only the read races the shutdown signal; a message already
            // handed to the processor is always finished and acknowledged.
            let read = tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        info!("Shutdown channel closed, stopping worker");
                        break;
                    }
                    continue;
                }
                read = self.consumer.read_new() => read,
            };

            match read {
                Ok(messages) => {
                    if consecutive_errors > 0 {
                        info!("Broker recovered after {} errors", consecutive_errors);
                        consecutive_errors = 0;
                    }

                    let received = messages.len();
                    for message in &messages {
                        self.process_message(message).await;
                    }

                    // Periodically pick up entries abandoned by other consumers
                    if let Some(interval) = claim_interval
                        && last_claim.elapsed() >= interval
                    {
                        if let Err(e) = self.claim_abandoned().await {
                            debug!(error = %e, "Error claiming abandoned messages");
                        }
                        last_claim = TokioInstant::now();
                    }

                    if received == 0 && !is_blocking {
                        tokio::select! {
                            _ = shutdown.changed() => {}
                            _ = tokio::time::sleep(poll_interval) => {}
                        }
                    }
                }
                Err(e) => {
                    consecutive_errors = consecutive_errors.saturating_add(1);
                    self.metrics.broker_error();

                    let backoff = if e.is_nogroup_error() {
                        warn!("Consumer group missing, recreating...");
                        if let Err(create_err) = self.consumer.ensure_consumer_group().await {
                            error!(error = %create_err, "Failed to recreate consumer group");
                        }
                        Duration::from_secs(1)
                    } else if e.is_timeout() {
                        debug!(error = %e, "Operation timeout, retrying...");
                        Duration::from_secs(1)
                    } else {
                        let backoff_secs = std::cmp::min(
                            2u64.pow(consecutive_errors.min(5)),
                            MAX_BACKOFF_SECS,
                        );
                        let reason = if e.is_connection_error() {
                            "Broker connection lost, backing off"
                        } else {
                            "Broker error, backing off"
                        };
                        warn!(
                            error = %e,
                            broker = %self.consumer.broker().name(),
                            consecutive_errors = %consecutive_errors,
                            backoff_secs = %backoff_secs,
                            "{reason}"
                        );
                        Duration::from_secs(backoff_secs)
                    };

                    tokio::select! {
                        _ = shutdown.changed() => {}
                        _ = tokio::time::sleep(backoff) => {}
                    }
                }
            }
        }

        info!(consumer_id = %self.config.consumer_id, "Stream worker stopped");
        Ok(())
    }

    /// Read one batch of new messages and process them in order.
    ///
    /// Returns how many messages were handled.
    pub async fn process_batch(&self) -> Result<usize, StreamError> {
        let messages = self.consumer.read_new().await?;

        for message in &messages {
            self.process_message(message).await;
        }

        Ok(messages.len())
    }

    /// Re-process entries delivered to this consumer but never acknowledged.
    ///
    /// Stops early if an acknowledgement fails, since the same entries would
    /// come back on the next read.
    pub async fn drain_pending(&self) -> Result<usize, StreamError> {
        let mut total = 0;

        loop {
            let pending = self.consumer.read_pending().await?;
            if pending.is_empty() {
                break;
            }

            let mut all_acked = true;
            for message in &pending {
                warn!(
                    stream_id = %message.stream_id,
                    delivery_count = message.delivery_count,
                    age_ms = message.age_ms(),
                    "Redelivering pending message"
                );
                all_acked &= self.process_message(message).await;
            }
            total += pending.len();

            if !all_acked {
                break;
            }
        }

        Ok(total)
    }

    /// Claim entries left idle on other consumers and process them.
    ///
    /// Keeps claiming until nothing idle is left. Returns how many entries
    /// were taken over.
    pub async fn claim_abandoned(&self) -> Result<usize, StreamError> {
        let mut total = 0;

        loop {
            let claimed = self.consumer.claim_idle().await?;
            if claimed.is_empty() {
                break;
            }

            self.metrics.messages_claimed(claimed.len());
            let mut all_acked = true;
            for message in &claimed {
                warn!(
                    stream_id = %message.stream_id,
                    delivery_count = message.delivery_count,
                    consumer_id = %self.config.consumer_id,
                    "Processing message claimed from another consumer"
                );
                all_acked &= self.process_message(message).await;
            }
            total += claimed.len();

            if !all_acked {
                break;
            }
        }

        if total > 0 {
            info!(count = total, "Claimed abandoned messages");
        }
        Ok(total)
    }

    /// Hand one message to the processor and acknowledge it.
    ///
    /// Errors and panics are reported here and never escape. Returns whether
    /// the acknowledgement went through.
    async fn process_message(&self, message: &StreamMessage) -> bool {
        self.metrics.message_received();
        let start = Instant::now();

        debug!(
            stream_id = %message.stream_id,
            delivery_count = message.delivery_count,
            "Processing message"
        );

        let result = match AssertUnwindSafe(self.processor.process(message))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(panic) => {
                self.metrics.message_panicked();
                Err(StreamError::Panicked(panic_message(panic.as_ref())))
            }
        };

        match result {
            Ok(()) => {
                self.metrics.message_processed(start.elapsed());
                debug!(stream_id = %message.stream_id, "Message processed");
            }
            Err(e) => {
                let category = e.category();
                self.metrics.message_failed(category.as_str());

                match category {
                    ErrorCategory::Permanent => error!(
                        stream_id = %message.stream_id,
                        processor = %self.processor.name(),
                        error = %e,
                        error_category = %category.as_str(),
                        "Message processing failed, dropping"
                    ),
                    ErrorCategory::Transient => warn!(
                        stream_id = %message.stream_id,
                        processor = %self.processor.name(),
                        error = %e,
                        error_category = %category.as_str(),
                        "Message processing failed, dropping"
                    ),
                }
            }
        }

        match self.consumer.ack(&message.stream_id).await {
            Ok(()) => true,
            Err(e) => {
                error!(stream_id = %message.stream_id, error = %e, "Failed to ACK message");
                false
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
