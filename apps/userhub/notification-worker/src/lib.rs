//! Notification Worker Service
//!
//! Consumes user lifecycle events and sends the matching emails.
//!
//! ## Architecture
//!
//! ```text
//! Redis Stream (user-events)
//!   ↓ (Consumer Group: notification-group)
//! StreamWorker<UserEventProcessor> × WORKER_CONCURRENCY
//!   ↓ (decode, dispatch)
//! NotificationDispatcher
//!   ↓
//! SMTP
//! ```
//!
//! Each worker handles its entries one at a time and acknowledges every entry
//! once the handler returns, whatever the outcome. Entries left pending by a
//! crash are picked up again by the same consumer name on restart, or claimed
//! by another worker once they have been idle for `WORKER_CLAIM_IDLE_MS`.

pub mod config;
pub mod connection;

pub use config::WorkerSettings;

use core_config::{Environment, FromEnv};
use domain_notifications::{NotificationDispatcher, SmtpConfig, SmtpProvider, UserEventProcessor};
use eyre::{Result, WrapErr};
use std::sync::Arc;
use stream_worker::{ErrorCategory, RedisStreamBroker, StreamBroker, StreamWorker, init_metrics};
use tokio::signal;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Build one worker per configured consumer, all sharing `processor`.
pub fn build_workers(
    broker: Arc<dyn StreamBroker>,
    processor: UserEventProcessor,
    settings: &WorkerSettings,
) -> Vec<StreamWorker<UserEventProcessor>> {
    let processor = Arc::new(processor);
    (0..settings.concurrency)
        .map(|index| {
            StreamWorker::with_arc_processor(
                broker.clone(),
                processor.clone(),
                settings.worker_config(index),
            )
        })
        .collect()
}

/// Startup readiness: broker round-trip and mail gateway health.
///
/// An unreachable broker is fatal. An unhealthy mail gateway is only logged,
/// since the SMTP relay may come up later and each failed send is reported
/// per message anyway.
pub async fn check_readiness(workers: &[StreamWorker<UserEventProcessor>]) -> Result<()> {
    let Some(worker) = workers.first() else {
        eyre::bail!("No workers configured");
    };

    worker
        .consumer()
        .ensure_consumer_group()
        .await
        .wrap_err("Failed to create consumer group")?;

    match worker.health_check().await {
        Ok(true) => info!("Mail gateway healthy"),
        Ok(false) => warn!("Mail gateway reported unhealthy, continuing"),
        Err(e) if e.category() == ErrorCategory::Permanent => {
            warn!(error = %e, "Mail gateway health check failed, continuing");
        }
        Err(e) => return Err(e).wrap_err("Broker health check failed"),
    }

    Ok(())
}

/// Run `workers` until `shutdown` flips to true, then wait for all of them.
///
/// A worker that exits with an error is logged; the others keep running.
pub async fn run_workers(
    workers: Vec<StreamWorker<UserEventProcessor>>,
    shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let mut tasks = JoinSet::new();
    for worker in workers {
        let shutdown = shutdown.clone();
        tasks.spawn(async move {
            let consumer_id = worker.consumer().consumer_id().to_string();
            (consumer_id, worker.run(shutdown).await)
        });
    }

    let mut failures = 0usize;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((_, Ok(()))) => {}
            Ok((consumer_id, Err(e))) => {
                failures += 1;
                error!(consumer_id = %consumer_id, error = %e, "Worker stopped with error");
            }
            Err(e) => {
                failures += 1;
                error!(error = %e, "Worker task aborted");
            }
        }
    }

    if failures > 0 {
        eyre::bail!("{failures} worker(s) stopped with errors");
    }
    Ok(())
}

/// Run the notification worker
///
/// 1. Sets up structured logging (env-aware: JSON for prod, pretty for dev)
/// 2. Connects to Redis and the SMTP server
/// 3. Runs the workers until SIGINT/SIGTERM
pub async fn run() -> Result<()> {
    let environment = Environment::from_env();
    core_config::tracing::init_tracing(&environment);

    info!(
        name = env!("CARGO_PKG_NAME"),
        version = env!("CARGO_PKG_VERSION"),
        environment = ?environment,
        "Starting notification worker"
    );

    let settings = WorkerSettings::from_env().wrap_err("Failed to load worker configuration")?;
    info!(
        stream = %settings.stream_name,
        consumer_group = %settings.consumer_group,
        consumer_id = %settings.consumer_id,
        batch_size = settings.batch_size,
        block_timeout_ms = ?settings.block_timeout_ms,
        claim_idle_ms = ?settings.claim_idle_ms,
        concurrency = settings.concurrency,
        "Worker configuration loaded"
    );

    if let Some(addr) = settings.metrics_addr {
        init_metrics(addr).wrap_err("Failed to start metrics exporter")?;
    }

    let smtp_config = SmtpConfig::from_env().wrap_err("Failed to load SMTP configuration")?;
    info!(
        host = %smtp_config.host,
        port = smtp_config.port,
        tls = smtp_config.use_tls,
        "SMTP configured"
    );
    let provider = SmtpProvider::new(smtp_config).wrap_err("Failed to create SMTP provider")?;
    let dispatcher = NotificationDispatcher::new(Arc::new(provider))
        .wrap_err("Failed to load email templates")?;

    info!("Connecting to Redis...");
    let redis_connection =
        connection::connect_with_retry(&settings.redis_url, connection::CONNECT_ATTEMPTS)
            .await
            .wrap_err("Failed to connect to Redis")?;
    info!("Connected to Redis successfully");

    let broker: Arc<dyn StreamBroker> = Arc::new(RedisStreamBroker::new(redis_connection));
    let workers = build_workers(broker, UserEventProcessor::new(dispatcher), &settings);
    check_readiness(&workers).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        let _ = shutdown_tx.send(true);
    });

    run_workers(workers, shutdown_rx).await?;

    info!("Notification worker stopped");
    Ok(())
}

/// Wait for a shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())
            .wrap_err("Failed to install SIGTERM handler")?;

        tokio::select! {
            ctrl_c = signal::ctrl_c() => {
                ctrl_c.wrap_err("Failed to listen for Ctrl+C")?;
                info!("Received Ctrl+C, initiating shutdown...");
            },
            _ = terminate.recv() => {
                info!("Received SIGTERM, initiating shutdown...");
            },
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await.wrap_err("Failed to listen for Ctrl+C")?;
        info!("Received Ctrl+C, initiating shutdown...");
    }

    Ok(())
}
