//! In-process `StreamBroker` with consumer-group semantics
//!
//! Mirrors what the workers rely on from Redis Streams: each entry goes to one
//! consumer per group, stays pending until acked, pending entries are handed
//! back to the same consumer on request, and entries idle long enough can be
//! claimed by another consumer. Used by tests and local runs.

use crate::broker::StreamBroker;
use crate::error::StreamError;
use crate::event::StreamMessage;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct Entry {
    seq: u64,
    id: String,
    payload: Vec<u8>,
}

#[derive(Debug, Clone)]
struct PendingEntry {
    id: String,
    consumer: String,
    delivery_count: u32,
    delivered_at: Instant,
}

impl PendingEntry {
    fn redeliver_to(&mut self, consumer: &str) -> u32 {
        self.consumer = consumer.to_string();
        self.delivery_count += 1;
        self.delivered_at = Instant::now();
        self.delivery_count
    }
}

#[derive(Debug, Default)]
struct GroupState {
    /// Sequence number of the last entry handed out to this group
    last_delivered: u64,
    pending: BTreeMap<u64, PendingEntry>,
}

#[derive(Debug, Default)]
struct StreamState {
    entries: VecDeque<Entry>,
    groups: HashMap<String, GroupState>,
}

#[derive(Debug, Default)]
struct BrokerState {
    next_seq: u64,
    streams: HashMap<String, StreamState>,
}

/// In-memory stream broker
#[derive(Clone, Default)]
pub struct InMemoryStreamBroker {
    state: Arc<Mutex<BrokerState>>,
    notify: Arc<Notify>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryStreamBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage: while unavailable every call fails with a broker error.
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// All entries currently held in a stream, oldest first.
    pub async fn entries(&self, stream: &str) -> Vec<StreamMessage> {
        let state = self.state.lock().await;
        state
            .streams
            .get(stream)
            .map(|s| {
                s.entries
                    .iter()
                    .map(|e| StreamMessage::new(e.id.clone(), e.payload.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of delivered but unacknowledged entries for a group.
    pub async fn pending_count(&self, stream: &str, group: &str) -> usize {
        let state = self.state.lock().await;
        state
            .streams
            .get(stream)
            .and_then(|s| s.groups.get(group))
            .map(|g| g.pending.len())
            .unwrap_or(0)
    }

    /// Drop a consumer group and its pending entries, like `XGROUP DESTROY`.
    pub async fn destroy_group(&self, stream: &str, group: &str) -> bool {
        let mut state = self.state.lock().await;
        state
            .streams
            .get_mut(stream)
            .and_then(|s| s.groups.remove(group))
            .is_some()
    }

    fn check_available(&self) -> Result<(), StreamError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StreamError::Broker("in-memory broker unavailable".to_string()));
        }
        Ok(())
    }

    fn payload_of(entries: &VecDeque<Entry>, seq: u64) -> Vec<u8> {
        // Entries trimmed away while pending come back without payload
        entries
            .iter()
            .find(|e| e.seq == seq)
            .map(|e| e.payload.clone())
            .unwrap_or_default()
    }

    async fn take_new(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        count: usize,
    ) -> Result<Vec<StreamMessage>, StreamError> {
        let mut state = self.state.lock().await;
        let no_group = || StreamError::NoGroup {
            stream: stream.to_string(),
            group: group.to_string(),
        };

        let stream_state = state.streams.get_mut(stream).ok_or_else(no_group)?;
        let StreamState { entries, groups } = stream_state;
        let group_state = groups.get_mut(group).ok_or_else(no_group)?;

        let last_delivered = group_state.last_delivered;
        let now = Instant::now();

        let mut messages = Vec::new();
        for entry in entries
            .iter()
            .filter(|e| e.seq > last_delivered)
            .take(count)
        {
            group_state.last_delivered = entry.seq;
            group_state.pending.insert(
                entry.seq,
                PendingEntry {
                    id: entry.id.clone(),
                    consumer: consumer.to_string(),
                    delivery_count: 1,
                    delivered_at: now,
                },
            );
            messages.push(StreamMessage::new(entry.id.clone(), entry.payload.clone()));
        }

        Ok(messages)
    }
}

#[async_trait]
impl StreamBroker for InMemoryStreamBroker {
    async fn publish(
        &self,
        stream: &str,
        payload: &[u8],
        max_length: usize,
    ) -> Result<String, StreamError> {
        self.check_available()?;

        let id = {
            let mut state = self.state.lock().await;
            state.next_seq += 1;
            let seq = state.next_seq;
            let id = format!("{}-{}", Utc::now().timestamp_millis(), seq);

            let stream_state = state.streams.entry(stream.to_string()).or_default();
            stream_state.entries.push_back(Entry {
                seq,
                id: id.clone(),
                payload: payload.to_vec(),
            });
            while stream_state.entries.len() > max_length.max(1) {
                stream_state.entries.pop_front();
            }
            id
        };

        self.notify.notify_waiters();
        Ok(id)
    }

    async fn ensure_group(&self, stream: &str, group: &str) -> Result<(), StreamError> {
        self.check_available()?;

        let mut state = self.state.lock().await;
        state
            .streams
            .entry(stream.to_string())
            .or_default()
            .groups
            .entry(group.to_string())
            .or_default();
        Ok(())
    }

    async fn read_new(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        count: usize,
        block: Option<Duration>,
    ) -> Result<Vec<StreamMessage>, StreamError> {
        let deadline = block.map(|b| Instant::now() + b);

        loop {
            self.check_available()?;

            // Register interest before looking so a publish in between is not missed
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let messages = self.take_new(stream, group, consumer, count).await?;
            if !messages.is_empty() {
                return Ok(messages);
            }

            match deadline {
                Some(deadline) => {
                    if tokio::time::timeout_at(deadline, notified).await.is_err() {
                        return Ok(Vec::new());
                    }
                }
                None => return Ok(Vec::new()),
            }
        }
    }

    async fn read_pending(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        count: usize,
    ) -> Result<Vec<StreamMessage>, StreamError> {
        self.check_available()?;

        let mut state = self.state.lock().await;
        let no_group = || StreamError::NoGroup {
            stream: stream.to_string(),
            group: group.to_string(),
        };

        let stream_state = state.streams.get_mut(stream).ok_or_else(no_group)?;
        let StreamState { entries, groups } = stream_state;
        let group_state = groups.get_mut(group).ok_or_else(no_group)?;

        let messages = group_state
            .pending
            .iter_mut()
            .filter(|(_, p)| p.consumer == consumer)
            .take(count)
            .map(|(seq, pending)| {
                let delivery_count = pending.redeliver_to(consumer);
                StreamMessage::with_delivery_count(
                    pending.id.clone(),
                    Self::payload_of(entries, *seq),
                    delivery_count,
                )
            })
            .collect();

        Ok(messages)
    }

    async fn claim_idle(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        min_idle: Duration,
        count: usize,
    ) -> Result<Vec<StreamMessage>, StreamError> {
        self.check_available()?;

        let mut state = self.state.lock().await;
        let Some(stream_state) = state.streams.get_mut(stream) else {
            return Ok(Vec::new());
        };
        let StreamState { entries, groups } = stream_state;
        let Some(group_state) = groups.get_mut(group) else {
            return Ok(Vec::new());
        };

        let messages = group_state
            .pending
            .iter_mut()
            .filter(|(_, p)| p.delivered_at.elapsed() >= min_idle)
            .take(count)
            .map(|(seq, pending)| {
                let delivery_count = pending.redeliver_to(consumer);
                StreamMessage::with_delivery_count(
                    pending.id.clone(),
                    Self::payload_of(entries, *seq),
                    delivery_count,
                )
            })
            .collect();

        Ok(messages)
    }

    async fn ack(&self, stream: &str, group: &str, stream_id: &str) -> Result<(), StreamError> {
        self.check_available()?;

        let mut state = self.state.lock().await;
        if let Some(group_state) = state
            .streams
            .get_mut(stream)
            .and_then(|s| s.groups.get_mut(group))
        {
            group_state.pending.retain(|_, p| p.id != stream_id);
        }
        Ok(())
    }

    async fn stream_length(&self, stream: &str) -> Result<usize, StreamError> {
        self.check_available()?;

        let state = self.state.lock().await;
        Ok(state.streams.get(stream).map(|s| s.entries.len()).unwrap_or(0))
    }

    fn name(&self) -> &'static str {
        "in-memory"
    }
}
