//! Broker abstraction over durable streams with consumer groups
//!
//! `StreamBroker` is the seam between producers/consumers and the actual
//! transport. `RedisStreamBroker` talks to Redis Streams; the in-memory
//! broker in `memory` mirrors the same group semantics for tests and local runs.

use crate::error::StreamError;
use crate::event::StreamMessage;
use crate::registry::MessageKey;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::streams::{StreamClaimReply, StreamId, StreamReadOptions, StreamReadReply};
use redis::{AsyncCommands, RedisResult};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Durable publish/subscribe channel with consumer-group delivery.
///
/// Every entry published to a stream is delivered to exactly one consumer of
/// each group. Entries stay pending for that consumer until acknowledged.
#[async_trait]
pub trait StreamBroker: Send + Sync {
    /// Append a payload to the stream, trimming it to roughly `max_length` entries.
    ///
    /// Returns the entry ID assigned by the broker.
    async fn publish(
        &self,
        stream: &str,
        payload: &[u8],
        max_length: usize,
    ) -> Result<String, StreamError>;

    /// Create the consumer group (and the stream) if they do not exist yet.
    async fn ensure_group(&self, stream: &str, group: &str) -> Result<(), StreamError>;

    /// Read entries never delivered to this group, waiting up to `block` for some to arrive.
    async fn read_new(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        count: usize,
        block: Option<Duration>,
    ) -> Result<Vec<StreamMessage>, StreamError>;

    /// Read entries delivered to this consumer but not yet acknowledged.
    async fn read_pending(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        count: usize,
    ) -> Result<Vec<StreamMessage>, StreamError>;

    /// Take over entries pending on any consumer of the group for at least `min_idle`.
    ///
    /// Recovers entries whose consumer went away without acknowledging them.
    /// Claimed entries become pending on `consumer`.
    async fn claim_idle(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        min_idle: Duration,
        count: usize,
    ) -> Result<Vec<StreamMessage>, StreamError>;

    /// Acknowledge an entry, removing it from the consumer's pending list.
    async fn ack(&self, stream: &str, group: &str, stream_id: &str) -> Result<(), StreamError>;

    /// Current number of entries in the stream.
    async fn stream_length(&self, stream: &str) -> Result<usize, StreamError>;

    /// Broker name for logging.
    fn name(&self) -> &'static str;
}

/// Redis Streams implementation of `StreamBroker`
#[derive(Clone)]
pub struct RedisStreamBroker {
    redis: ConnectionManager,
}

impl RedisStreamBroker {
    /// Create a broker over an existing connection manager
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }

    fn into_message(entry: StreamId, delivery_count: u32) -> StreamMessage {
        let payload = match entry.get::<Vec<u8>>(MessageKey::Payload.as_ref()) {
            Some(bytes) => bytes,
            None => {
                // Trimmed or foreign entries still have to reach the
                // processor so they get reported and acknowledged.
                warn!(
                    stream_id = %entry.id,
                    fields = ?entry.map.keys().collect::<Vec<_>>(),
                    "Missing 'payload' field in stream entry"
                );
                Vec::new()
            }
        };

        StreamMessage::with_delivery_count(entry.id, payload, delivery_count)
    }

    /// Pending entries of the group as `(id, idle ms, times delivered)`,
    /// optionally restricted to one consumer.
    async fn pending_summary(
        &self,
        stream: &str,
        group: &str,
        consumer: Option<&str>,
        count: usize,
    ) -> Result<Vec<(String, u64, u32)>, StreamError> {
        let mut conn = self.redis.clone();

        let mut cmd = redis::cmd("XPENDING");
        cmd.arg(stream).arg(group).arg("-").arg("+").arg(count);
        if let Some(consumer) = consumer {
            cmd.arg(consumer);
        }

        // Each row: id, owning consumer, idle ms, delivery count
        let rows: Vec<(String, String, u64, u32)> = cmd.query_async(&mut conn).await?;

        Ok(rows
            .into_iter()
            .map(|(id, _, idle_ms, deliveries)| (id, idle_ms, deliveries))
            .collect())
    }
}

#[async_trait]
impl StreamBroker for RedisStreamBroker {
    async fn publish(
        &self,
        stream: &str,
        payload: &[u8],
        max_length: usize,
    ) -> Result<String, StreamError> {
        let mut conn = self.redis.clone();

        // XADD with MAXLEN ~ for approximate trimming (more efficient)
        let stream_id: String = redis::cmd("XADD")
            .arg(stream)
            .arg("MAXLEN")
            .arg("~")
            .arg(max_length)
            .arg("*")
            .arg(MessageKey::Payload.as_ref())
            .arg(payload)
            .query_async(&mut conn)
            .await?;

        debug!(stream = %stream, stream_id = %stream_id, "Appended entry");
        Ok(stream_id)
    }

    async fn ensure_group(&self, stream: &str, group: &str) -> Result<(), StreamError> {
        let mut conn = self.redis.clone();

        let result: RedisResult<()> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(stream)
            .arg(group)
            .arg("0") // Start from beginning
            .arg("MKSTREAM") // Create stream if it doesn't exist
            .query_async(&mut conn)
            .await;

        match result {
            Ok(()) => {
                info!(stream = %stream, group = %group, "Created consumer group");
                Ok(())
            }
            Err(e) if e.to_string().contains("BUSYGROUP") => {
                debug!(stream = %stream, group = %group, "Consumer group already exists");
                Ok(())
            }
            Err(e) => Err(StreamError::Redis(e)),
        }
    }

    async fn read_new(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        count: usize,
        block: Option<Duration>,
    ) -> Result<Vec<StreamMessage>, StreamError> {
        let mut conn = self.redis.clone();

        let mut options = StreamReadOptions::default()
            .group(group, consumer)
            .count(count);
        if let Some(block) = block {
            options = options.block(usize::try_from(block.as_millis()).unwrap_or(usize::MAX));
        }

        // Nil reply means the BLOCK timeout elapsed without new entries
        let reply: Option<StreamReadReply> =
            conn.xread_options(&[stream], &[">"], &options).await?;

        Ok(reply
            .into_iter()
            .flat_map(|reply| reply.keys)
            .flat_map(|key| key.ids)
            .map(|entry| Self::into_message(entry, 1))
            .collect())
    }

    async fn read_pending(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        count: usize,
    ) -> Result<Vec<StreamMessage>, StreamError> {
        let deliveries: HashMap<String, u32> = self
            .pending_summary(stream, group, Some(consumer), count)
            .await?
            .into_iter()
            .map(|(id, _, deliveries)| (id, deliveries))
            .collect();

        if deliveries.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.redis.clone();
        let options = StreamReadOptions::default()
            .group(group, consumer)
            .count(count);

        // ID "0" returns this consumer's pending entries instead of new ones
        let reply: Option<StreamReadReply> =
            conn.xread_options(&[stream], &["0"], &options).await?;

        Ok(reply
            .into_iter()
            .flat_map(|reply| reply.keys)
            .flat_map(|key| key.ids)
            .map(|entry| {
                // Counts this read as one more delivery
                let previous = deliveries.get(&entry.id).copied().unwrap_or(1);
                Self::into_message(entry, previous.saturating_add(1))
            })
            .collect())
    }

    async fn claim_idle(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        min_idle: Duration,
        count: usize,
    ) -> Result<Vec<StreamMessage>, StreamError> {
        let min_idle_ms = u64::try_from(min_idle.as_millis()).unwrap_or(u64::MAX);

        let pending = match self.pending_summary(stream, group, None, count).await {
            Ok(pending) => pending,
            Err(e) if e.is_nogroup_error() => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let idle: HashMap<String, u32> = pending
            .into_iter()
            .filter(|(_, idle_ms, _)| *idle_ms >= min_idle_ms)
            .map(|(id, _, deliveries)| (id, deliveries))
            .collect();

        if idle.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.redis.clone();
        let ids: Vec<String> = idle.keys().cloned().collect();

        // XCLAIM re-checks the idle time, so an entry another consumer
        // claimed in the meantime is skipped.
        let reply: StreamClaimReply = conn
            .xclaim(stream, group, consumer, min_idle_ms, &ids)
            .await?;

        let mut messages: Vec<StreamMessage> = reply
            .ids
            .into_iter()
            .map(|entry| {
                let previous = idle.get(&entry.id).copied().unwrap_or(1);
                Self::into_message(entry, previous.saturating_add(1))
            })
            .collect();
        messages.sort_by(|a, b| a.stream_id.cmp(&b.stream_id));

        if !messages.is_empty() {
            warn!(
                stream = %stream,
                consumer = %consumer,
                count = messages.len(),
                "Claimed idle pending entries"
            );
        }

        Ok(messages)
    }

    async fn ack(&self, stream: &str, group: &str, stream_id: &str) -> Result<(), StreamError> {
        let mut conn = self.redis.clone();

        let _: i64 = conn.xack(stream, group, &[stream_id]).await?;

        debug!(stream_id = %stream_id, "Acknowledged entry");
        Ok(())
    }

    async fn stream_length(&self, stream: &str) -> Result<usize, StreamError> {
        let mut conn = self.redis.clone();
        let len: usize = conn.xlen(stream).await?;
        Ok(len)
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}
