//! Redis connection with startup retry
//!
//! The broker may come up after the worker (compose, k8s), so the first
//! connection is retried with exponential backoff before giving up. Errors
//! other than lost or refused connections (a malformed URL) fail at once.

use redis::aio::ConnectionManager;
use redis::{Client, RedisResult};
use std::time::Duration;
use stream_worker::{ErrorCategory, StreamError};
use tracing::{debug, warn};

/// Attempts made by [`connect_with_retry`] when started from the binary.
pub const CONNECT_ATTEMPTS: u32 = 5;

/// Open a `ConnectionManager` and verify it with `PING`.
///
/// The manager reconnects on its own after this initial handshake.
pub async fn connect(url: &str) -> RedisResult<ConnectionManager> {
    let client = Client::open(url)?;
    let manager = ConnectionManager::new(client).await?;

    let mut conn = manager.clone();
    let _: String = redis::cmd("PING").query_async(&mut conn).await?;

    Ok(manager)
}

/// [`connect`], retried up to `max_attempts` times in total.
pub async fn connect_with_retry(
    url: &str,
    max_attempts: u32,
) -> Result<ConnectionManager, StreamError> {
    let max_attempts = max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match connect(url).await.map_err(StreamError::from) {
            Ok(manager) => {
                if attempt > 1 {
                    debug!(attempt = attempt, "Redis connection succeeded after retry");
                }
                return Ok(manager);
            }
            Err(e) if attempt < max_attempts && e.is_connection_error() => {
                let delay_ms = ErrorCategory::Transient.backoff_delay_ms(attempt - 1);
                warn!(
                    error = %e,
                    attempt = attempt,
                    max_attempts = max_attempts,
                    delay_ms = delay_ms,
                    "Redis connection failed, retrying"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
            Err(e) => return Err(e),
        }
    }
}
