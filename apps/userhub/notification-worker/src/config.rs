use core_config::{ConfigError, FromEnv, env_or_default, env_parse};
use domain_user_events::UserEventStream;
use std::env;
use std::net::SocketAddr;
use stream_worker::{StreamDef, WorkerConfig};

/// Runtime settings for the notification worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSettings {
    pub redis_url: String,
    pub stream_name: String,
    pub consumer_group: String,
    /// Base consumer name; worker `i` registers as `{consumer_id}-{i}`.
    /// Must be stable across restarts for pending entries to be recovered.
    pub consumer_id: String,
    pub batch_size: usize,
    /// `None` polls instead of blocking on the broker.
    pub block_timeout_ms: Option<u64>,
    /// Entries pending this long on any consumer are taken over. `None` never claims.
    pub claim_idle_ms: Option<u64>,
    pub concurrency: usize,
    /// Prometheus exporter address. Disabled when unset.
    pub metrics_addr: Option<SocketAddr>,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379".to_string(),
            stream_name: UserEventStream::stream_name().to_string(),
            consumer_group: UserEventStream::consumer_group().to_string(),
            consumer_id: "notification-worker".to_string(),
            batch_size: UserEventStream::BATCH_SIZE,
            block_timeout_ms: Some(UserEventStream::BLOCK_TIMEOUT_MS),
            claim_idle_ms: Some(UserEventStream::CLAIM_IDLE_MS),
            concurrency: 1,
            metrics_addr: None,
        }
    }
}

impl WorkerSettings {
    /// Stream settings for the `index`-th worker of this process.
    pub fn worker_config(&self, index: usize) -> WorkerConfig {
        WorkerConfig::new(&self.stream_name, &self.consumer_group)
            .with_consumer_id(format!("{}-{index}", self.consumer_id))
            .with_batch_size(self.batch_size)
            .with_blocking(self.block_timeout_ms)
            .with_claim_idle_ms(self.claim_idle_ms)
    }
}

/// Millisecond setting where 0 turns the feature off.
fn optional_ms(key: &str, default: u64) -> Result<Option<u64>, ConfigError> {
    match env_parse(key, default)? {
        0 => Ok(None),
        ms => Ok(Some(ms)),
    }
}

/// `REDIS_URL` wins; otherwise the URL is built from `REDIS_HOST` and `REDIS_PORT`.
fn redis_url() -> Result<String, ConfigError> {
    if let Ok(url) = env::var("REDIS_URL") {
        return Ok(url);
    }
    let host = env_or_default("REDIS_HOST", "127.0.0.1");
    let port: u16 = env_parse("REDIS_PORT", 6379)?;
    Ok(format!("redis://{host}:{port}"))
}

impl FromEnv for WorkerSettings {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        // 0 switches the worker to polling
        let block_timeout_ms =
            optional_ms("WORKER_BLOCK_TIMEOUT_MS", UserEventStream::BLOCK_TIMEOUT_MS)?;
        let claim_idle_ms = optional_ms("WORKER_CLAIM_IDLE_MS", UserEventStream::CLAIM_IDLE_MS)?;

        let metrics_addr = match env::var("METRICS_ADDR") {
            Ok(raw) if !raw.trim().is_empty() => {
                Some(raw.trim().parse().map_err(|e: std::net::AddrParseError| {
                    ConfigError::ParseError {
                        key: "METRICS_ADDR".to_string(),
                        details: e.to_string(),
                    }
                })?)
            }
            _ => None,
        };

        let consumer_id = env::var("WORKER_CONSUMER_ID")
            .or_else(|_| env::var("HOSTNAME"))
            .unwrap_or(defaults.consumer_id);

        Ok(Self {
            redis_url: redis_url()?,
            stream_name: env_or_default("USER_EVENTS_STREAM", &defaults.stream_name),
            consumer_group: env_or_default("USER_EVENTS_GROUP", &defaults.consumer_group),
            consumer_id,
            batch_size: env_parse("WORKER_BATCH_SIZE", defaults.batch_size)?.max(1),
            block_timeout_ms,
            claim_idle_ms,
            concurrency: env_parse("WORKER_CONCURRENCY", defaults.concurrency)?.max(1),
            metrics_addr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VARS: [&str; 13] = [
        "REDIS_URL",
        "REDIS_HOST",
        "REDIS_PORT",
        "USER_EVENTS_STREAM",
        "USER_EVENTS_GROUP",
        "WORKER_CONSUMER_ID",
        "HOSTNAME",
        "WORKER_BATCH_SIZE",
        "WORKER_BLOCK_TIMEOUT_MS",
        "WORKER_CLAIM_IDLE_MS",
        "WORKER_CONCURRENCY",
        "METRICS_ADDR",
        "APP_ENV",
    ];

    /// Run `f` with every worker variable unset except `overrides`.
    fn with_env<R>(overrides: &[(&str, &str)], f: impl FnOnce() -> R) -> R {
        let vars: Vec<(&str, Option<&str>)> = VARS
            .iter()
            .map(|key| {
                let value = overrides.iter().find(|(k, _)| k == key).map(|(_, v)| *v);
                (*key, value)
            })
            .collect();
        temp_env::with_vars(vars, f)
    }

    #[test]
    fn test_defaults() {
        with_env(&[], || {
            let settings = WorkerSettings::from_env().unwrap();
            assert_eq!(settings, WorkerSettings::default());
            assert_eq!(settings.stream_name, "user-events");
            assert_eq!(settings.consumer_group, "notification-group");
            assert_eq!(settings.block_timeout_ms, Some(5_000));
            assert_eq!(settings.claim_idle_ms, Some(30_000));
        });
    }

    #[test]
    fn test_redis_url_from_host() {
        with_env(&[("REDIS_HOST", "redis"), ("REDIS_PORT", "6380")], || {
            let settings = WorkerSettings::from_env().unwrap();
            assert_eq!(settings.redis_url, "redis://redis:6380");
        });
    }

    #[test]
    fn test_overrides() {
        let overrides = [
            ("REDIS_URL", "redis://cache:6379/1"),
            ("REDIS_HOST", "ignored"),
            ("WORKER_CONSUMER_ID", "pod-a"),
            ("HOSTNAME", "ignored"),
            ("WORKER_BATCH_SIZE", "0"),
            ("WORKER_BLOCK_TIMEOUT_MS", "0"),
            ("WORKER_CLAIM_IDLE_MS", "0"),
            ("WORKER_CONCURRENCY", "4"),
            ("METRICS_ADDR", "0.0.0.0:9100"),
        ];
        with_env(&overrides, || {
            let settings = WorkerSettings::from_env().unwrap();
            assert_eq!(settings.redis_url, "redis://cache:6379/1");
            assert_eq!(settings.consumer_id, "pod-a");
            assert_eq!(settings.batch_size, 1);
            assert_eq!(settings.block_timeout_ms, None);
            assert_eq!(settings.claim_idle_ms, None);
            assert_eq!(settings.concurrency, 4);
            assert_eq!(settings.metrics_addr, Some("0.0.0.0:9100".parse().unwrap()));
        });
    }

    #[test]
    fn test_consumer_id_falls_back_to_hostname() {
        with_env(&[("HOSTNAME", "notification-worker-7f9c")], || {
            let settings = WorkerSettings::from_env().unwrap();
            assert_eq!(settings.consumer_id, "notification-worker-7f9c");
        });
    }

    #[test]
    fn test_invalid_values() {
        with_env(&[("WORKER_CONCURRENCY", "lots")], || {
            assert!(WorkerSettings::from_env().is_err());
        });
        with_env(&[("METRICS_ADDR", "not-an-addr")], || {
            let err = WorkerSettings::from_env().unwrap_err();
            assert!(err.to_string().contains("METRICS_ADDR"));
        });
    }

    #[test]
    fn test_worker_config_per_index() {
        let settings = WorkerSettings {
            consumer_id: "pod-a".to_string(),
            claim_idle_ms: Some(10_000),
            ..WorkerSettings::default()
        };

        let config = settings.worker_config(2);
        assert_eq!(config.consumer_id, "pod-a-2");
        assert_eq!(config.claim_idle_ms, Some(10_000));
        assert_eq!(config.stream_name, "user-events");
        assert_eq!(config.consumer_group, "notification-group");
        assert!(config.is_blocking());
    }
}
