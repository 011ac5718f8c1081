//! Stream message wrapper
//!
//! Wraps the raw payload of a stream entry with its metadata (ID, timestamp,
//! delivery count). Decoding the payload is the processor's job.

use chrono::{DateTime, Utc};

/// A stream entry as handed to a processor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamMessage {
    /// Stream entry ID (e.g., "1234567890123-0")
    pub stream_id: String,

    /// Opaque payload bytes
    pub payload: Vec<u8>,

    /// When the entry was appended (parsed from the stream ID)
    pub timestamp: DateTime<Utc>,

    /// Number of times this entry has been delivered
    pub delivery_count: u32,
}

impl StreamMessage {
    /// Create a first-delivery message
    pub fn new(stream_id: impl Into<String>, payload: Vec<u8>) -> Self {
        Self::with_delivery_count(stream_id, payload, 1)
    }

    /// Create a message with an explicit delivery count
    pub fn with_delivery_count(
        stream_id: impl Into<String>,
        payload: Vec<u8>,
        delivery_count: u32,
    ) -> Self {
        let stream_id = stream_id.into();
        let timestamp = Self::parse_timestamp(&stream_id);
        Self {
            stream_id,
            payload,
            timestamp,
            delivery_count,
        }
    }

    /// Parse timestamp from a stream ID
    ///
    /// Stream IDs are in format "timestamp_ms-sequence"
    fn parse_timestamp(stream_id: &str) -> DateTime<Utc> {
        stream_id
            .split('-')
            .next()
            .and_then(|ts| ts.parse::<i64>().ok())
            .and_then(DateTime::from_timestamp_millis)
            .unwrap_or_else(Utc::now)
    }

    /// Check if this is a redelivery
    pub fn is_redelivery(&self) -> bool {
        self.delivery_count > 1
    }

    /// Get age in milliseconds
    pub fn age_ms(&self) -> i64 {
        (Utc::now() - self.timestamp).num_milliseconds()
    }
}
