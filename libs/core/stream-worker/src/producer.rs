//! Stream producer for publishing entries
//!
//! Generic producer that any service can use to append encoded payloads to a
//! stream for workers to pick up.
//!
//! # Example
//!
//! ```rust,ignore
//! use stream_worker::{StreamProducer, StreamDef};
//!
//! let producer = StreamProducer::from_stream_def::<UserEventStream>(broker);
//! let stream_id = producer.send(&payload).await?;
//! ```

use crate::broker::StreamBroker;
use crate::error::StreamError;
use crate::registry::StreamDef;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Generic stream producer.
#[derive(Clone)]
pub struct StreamProducer {
    broker: Arc<dyn StreamBroker>,
    stream_name: String,
    max_length: usize,
    max_attempts: u32,
}

impl StreamProducer {
    /// Create a new StreamProducer for a specific stream.
    pub fn new(broker: Arc<dyn StreamBroker>, stream_name: impl Into<String>) -> Self {
        Self {
            broker,
            stream_name: stream_name.into(),
            max_length: 100_000,
            max_attempts: 1,
        }
    }

    /// Create a producer from a `StreamDef` implementation.
    ///
    /// Keeps the stream name and max length consistent with the worker.
    pub fn from_stream_def<S: StreamDef>(broker: Arc<dyn StreamBroker>) -> Self {
        Self {
            broker,
            stream_name: S::STREAM_NAME.to_string(),
            max_length: S::MAX_LENGTH,
            max_attempts: 1,
        }
    }

    /// Set the maximum stream length (MAXLEN ~).
    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    /// Total attempts per send, including the first. Transient failures are
    /// retried with exponential backoff.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Get the stream name.
    pub fn stream_name(&self) -> &str {
        &self.stream_name
    }

    /// Append a payload to the stream.
    ///
    /// Returns the stream entry ID.
    pub async fn send(&self, payload: &[u8]) -> Result<String, StreamError> {
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            match self
                .broker
                .publish(&self.stream_name, payload, self.max_length)
                .await
            {
                Ok(stream_id) => {
                    debug!(
                        stream = %self.stream_name,
                        stream_id = %stream_id,
                        attempt = attempt,
                        "Published entry"
                    );
                    return Ok(stream_id);
                }
                Err(e) if e.should_retry(attempt, self.max_attempts) => {
                    let delay_ms = e.backoff_delay_ms(attempt - 1);
                    warn!(
                        stream = %self.stream_name,
                        error = %e,
                        attempt = attempt,
                        delay_ms = delay_ms,
                        "Publish failed, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Get the current stream length.
    pub async fn stream_length(&self) -> Result<usize, StreamError> {
        self.broker.stream_length(&self.stream_name).await
    }
}
