//! Prometheus metrics for stream workers
//!
//! Provides observability into worker throughput and failures.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::info;

use crate::error::StreamError;

static METRICS_INSTALLED: OnceCell<()> = OnceCell::new();

/// Install the Prometheus recorder and serve `/metrics` on `addr`.
///
/// Call this once at startup. Subsequent calls are no-ops.
pub fn init_metrics(addr: SocketAddr) -> Result<(), StreamError> {
    METRICS_INSTALLED
        .get_or_try_init(|| {
            PrometheusBuilder::new()
                .with_http_listener(addr)
                .install()
                .map_err(|e| StreamError::Config(format!("metrics exporter: {e}")))?;
            info!(addr = %addr, "Prometheus metrics exporter listening");
            Ok(())
        })
        .map(|_| ())
}

/// Stream worker metrics helper
#[derive(Clone)]
pub struct StreamMetrics {
    /// Stream name for labeling
    stream_name: String,
    /// Processor name for labeling
    processor_name: String,
}

impl StreamMetrics {
    /// Create new StreamMetrics
    pub fn new(stream_name: impl Into<String>, processor_name: impl Into<String>) -> Self {
        Self {
            stream_name: stream_name.into(),
            processor_name: processor_name.into(),
        }
    }

    /// Record a message being received
    pub fn message_received(&self) {
        counter!(
            "stream_worker_messages_received_total",
            "stream" => self.stream_name.clone(),
            "processor" => self.processor_name.clone()
        )
        .increment(1);
    }

    /// Record a message processed successfully
    pub fn message_processed(&self, duration: Duration) {
        counter!(
            "stream_worker_messages_processed_total",
            "stream" => self.stream_name.clone(),
            "processor" => self.processor_name.clone(),
            "status" => "success"
        )
        .increment(1);

        histogram!(
            "stream_worker_message_duration_seconds",
            "stream" => self.stream_name.clone(),
            "processor" => self.processor_name.clone()
        )
        .record(duration.as_secs_f64());
    }

    /// Record a message failing
    pub fn message_failed(&self, category: &str) {
        counter!(
            "stream_worker_messages_processed_total",
            "stream" => self.stream_name.clone(),
            "processor" => self.processor_name.clone(),
            "status" => "failed"
        )
        .increment(1);

        counter!(
            "stream_worker_message_errors_total",
            "stream" => self.stream_name.clone(),
            "processor" => self.processor_name.clone(),
            "category" => category.to_string()
        )
        .increment(1);
    }

    /// Record a processor panic
    pub fn message_panicked(&self) {
        counter!(
            "stream_worker_panics_total",
            "stream" => self.stream_name.clone(),
            "processor" => self.processor_name.clone()
        )
        .increment(1);
    }

    /// Record entries claimed from other consumers
    pub fn messages_claimed(&self, count: usize) {
        counter!(
            "stream_worker_messages_claimed_total",
            "stream" => self.stream_name.clone(),
            "processor" => self.processor_name.clone()
        )
        .increment(count as u64);
    }

    /// Record a broker-level failure in the worker loop
    pub fn broker_error(&self) {
        counter!(
            "stream_worker_broker_errors_total",
            "stream" => self.stream_name.clone()
        )
        .increment(1);
    }

    /// Update stream depth gauge
    pub fn stream_depth(&self, depth: usize) {
        gauge!(
            "stream_worker_stream_depth",
            "stream" => self.stream_name.clone()
        )
        .set(depth as f64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = StreamMetrics::new("user-events", "user_event_processor");
        assert_eq!(metrics.stream_name, "user-events");
        assert_eq!(metrics.processor_name, "user_event_processor");

        // No recorder installed: recording is a no-op
        metrics.message_received();
        metrics.message_failed("permanent");
    }
}
