//! Stream registry types and definitions.
//!
//! This module provides:
//! - `StreamDef` trait for domain-specific stream definitions
//! - `MessageKey` enum for the field names written into stream entries

use strum::{AsRefStr, Display, EnumString};

/// Standard message keys used in stream entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(Display, AsRefStr, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum MessageKey {
    /// The encoded event bytes.
    Payload,
}

/// Stream definition trait.
///
/// Each domain implements this trait to pin the stream name and consumer
/// group its producers and workers agree on.
///
/// # Example
///
/// ```rust,ignore
/// use stream_worker::StreamDef;
///
/// pub struct UserEventStream;
///
/// impl StreamDef for UserEventStream {
///     const STREAM_NAME: &'static str = "user-events";
///     const CONSUMER_GROUP: &'static str = "notification-group";
/// }
/// ```
pub trait StreamDef: Send + Sync {
    /// The stream name (e.g., "user-events").
    const STREAM_NAME: &'static str;

    /// The consumer group name for this stream.
    const CONSUMER_GROUP: &'static str;

    /// Maximum stream length before auto-trim (MAXLEN ~).
    /// Default: 100,000 entries.
    const MAX_LENGTH: usize = 100_000;

    /// Entries fetched per read.
    const BATCH_SIZE: usize = 10;

    /// How long a blocking read waits for new entries.
    const BLOCK_TIMEOUT_MS: u64 = 5_000;

    /// How long an entry may stay pending on one consumer before another claims it.
    const CLAIM_IDLE_MS: u64 = 30_000;

    /// Get the stream name.
    fn stream_name() -> &'static str {
        Self::STREAM_NAME
    }

    /// Get the consumer group name.
    fn consumer_group() -> &'static str {
        Self::CONSUMER_GROUP
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_key() {
        assert_eq!(MessageKey::Payload.to_string(), "payload");
        assert_eq!(MessageKey::Payload.as_ref(), "payload");
        assert_eq!("payload".parse::<MessageKey>().unwrap(), MessageKey::Payload);
    }

    struct TestStream;
    impl StreamDef for TestStream {
        const STREAM_NAME: &'static str = "test-stream";
        const CONSUMER_GROUP: &'static str = "test-workers";
    }

    #[test]
    fn test_stream_def_defaults() {
        assert_eq!(TestStream::stream_name(), "test-stream");
        assert_eq!(TestStream::consumer_group(), "test-workers");
        assert_eq!(TestStream::MAX_LENGTH, 100_000);
        assert_eq!(TestStream::BATCH_SIZE, 10);
        assert_eq!(TestStream::BLOCK_TIMEOUT_MS, 5_000);
        assert_eq!(TestStream::CLAIM_IDLE_MS, 30_000);
    }
}
