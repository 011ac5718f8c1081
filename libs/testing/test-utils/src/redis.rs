//! Redis container for broker tests

use redis::Client;
use redis::aio::ConnectionManager;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::redis::Redis;

/// A throwaway Redis server. The container stops when this is dropped.
pub struct TestRedis {
    _container: ContainerAsync<Redis>,
    url: String,
}

impl TestRedis {
    /// Start Redis 8 (Alpine), which supports every Streams command the broker uses.
    pub async fn new() -> Self {
        let container = Redis::default()
            .with_tag("8-alpine")
            .start()
            .await
            .expect("Failed to start Redis container");

        let port = container
            .get_host_port_ipv4(6379)
            .await
            .expect("Failed to get Redis port");

        let url = format!("redis://127.0.0.1:{port}");
        tracing::info!(url = %url, "Test Redis ready");

        Self {
            _container: container,
            url,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// A reconnecting connection manager, as the worker uses in production
    pub async fn connection_manager(&self) -> ConnectionManager {
        let client = Client::open(self.url.as_str()).expect("Failed to create Redis client");
        ConnectionManager::new(client)
            .await
            .expect("Failed to create connection manager")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use redis::AsyncCommands;

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_connection_manager_reaches_server() {
        let redis = TestRedis::new().await;
        let mut conn = redis.connection_manager().await;

        conn.set::<_, _, ()>("greeting", "ok").await.unwrap();
        let value: String = conn.get("greeting").await.unwrap();
        assert_eq!(value, "ok");
        assert!(redis.url().starts_with("redis://"));
    }
}
