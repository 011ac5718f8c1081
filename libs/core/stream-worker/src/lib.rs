//! Stream Worker Framework
//!
//! Durable streams with consumer groups, and a generic worker that feeds
//! their entries to a processor.
//!
//! ## Features
//!
//! - **Broker seam**: `StreamBroker` with Redis Streams and in-memory backends
//! - **Producer**: `StreamProducer` appends encoded payloads to a stream
//! - **Consumer groups**: each entry goes to one worker per group
//! - **Generic worker**: `StreamWorker<P>` runs any `StreamProcessor`,
//!   acknowledging every entry and isolating failures and panics
//! - **Prometheus metrics**: built-in observability
//!
//! ## Example
//!
//! ```ignore
//! use stream_worker::{RedisStreamBroker, StreamDef, StreamWorker, WorkerConfig};
//!
//! struct UserEventStream;
//! impl StreamDef for UserEventStream {
//!     const STREAM_NAME: &'static str = "user-events";
//!     const CONSUMER_GROUP: &'static str = "notification-group";
//! }
//!
//! let broker = Arc::new(RedisStreamBroker::new(redis));
//! let config = WorkerConfig::from_stream_def::<UserEventStream>();
//! let worker = StreamWorker::new(broker, processor, config);
//! worker.run(shutdown_rx).await?;
//! ```

mod broker;
mod config;
mod consumer;
mod error;
mod event;
mod memory;
pub mod metrics;
mod producer;
mod registry;
mod worker;

// Re-export main types
pub use broker::{RedisStreamBroker, StreamBroker};
pub use config::WorkerConfig;
pub use consumer::StreamConsumer;
pub use error::{ErrorCategory, StreamError};
pub use event::StreamMessage;
pub use memory::InMemoryStreamBroker;
pub use metrics::{StreamMetrics, init_metrics};
pub use producer::StreamProducer;
pub use registry::{MessageKey, StreamDef};
pub use worker::{StreamProcessor, StreamWorker};
