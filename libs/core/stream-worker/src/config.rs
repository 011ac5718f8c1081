//! Worker configuration
//!
//! This module provides `WorkerConfig` for configuring the stream worker.

use crate::registry::StreamDef;
use std::time::Duration;
use uuid::Uuid;

/// Configuration for the stream worker
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Stream name
    pub stream_name: String,

    /// Consumer group name
    pub consumer_group: String,

    /// Unique consumer ID (auto-generated if not provided)
    pub consumer_id: String,

    /// Batch size for reading messages
    pub batch_size: usize,

    /// Blocking read timeout in milliseconds (None = non-blocking)
    pub block_timeout_ms: Option<u64>,

    /// Poll interval in milliseconds, only used in non-blocking mode
    pub poll_interval_ms: u64,

    /// Pending entries idle this long on any consumer are claimed (None = never claim)
    pub claim_idle_ms: Option<u64>,
}

impl WorkerConfig {
    /// Create a new WorkerConfig from a StreamDef
    pub fn from_stream_def<S: StreamDef>() -> Self {
        Self {
            stream_name: S::STREAM_NAME.to_string(),
            consumer_group: S::CONSUMER_GROUP.to_string(),
            consumer_id: format!("worker-{}", Uuid::new_v4()),
            batch_size: S::BATCH_SIZE,
            block_timeout_ms: Some(S::BLOCK_TIMEOUT_MS),
            poll_interval_ms: 1000,
            claim_idle_ms: Some(S::CLAIM_IDLE_MS),
        }
    }

    /// Create a new WorkerConfig with explicit values
    pub fn new(stream_name: impl Into<String>, consumer_group: impl Into<String>) -> Self {
        Self {
            stream_name: stream_name.into(),
            consumer_group: consumer_group.into(),
            consumer_id: format!("worker-{}", Uuid::new_v4()),
            batch_size: 10,
            block_timeout_ms: Some(5000),
            poll_interval_ms: 1000,
            claim_idle_ms: Some(30_000),
        }
    }

    /// Set the consumer ID
    pub fn with_consumer_id(mut self, id: impl Into<String>) -> Self {
        self.consumer_id = id.into();
        self
    }

    /// Set the batch size
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Set the blocking timeout (None for non-blocking)
    pub fn with_blocking(mut self, timeout_ms: Option<u64>) -> Self {
        self.block_timeout_ms = timeout_ms;
        self
    }

    /// Set the poll interval
    pub fn with_poll_interval_ms(mut self, interval: u64) -> Self {
        self.poll_interval_ms = interval;
        self
    }

    /// Set the idle time after which abandoned entries are claimed (None to disable)
    pub fn with_claim_idle_ms(mut self, idle_ms: Option<u64>) -> Self {
        self.claim_idle_ms = idle_ms;
        self
    }

    /// How often to look for abandoned entries: twice the idle threshold
    pub fn claim_interval(&self) -> Option<Duration> {
        self.claim_idle_ms
            .map(|ms| Duration::from_millis(ms.saturating_mul(2)))
    }

    /// Whether reads block on the broker instead of polling
    pub fn is_blocking(&self) -> bool {
        self.block_timeout_ms.is_some()
    }
}
