//! End-to-end pipeline: user store → stream → worker → mail outbox.
//!
//! Runs entirely in memory; the Redis-backed broker has its own container
//! tests in `stream-worker`.

use domain_notifications::{MockSmtpProvider, NotificationDispatcher, UserEventProcessor};
use domain_user_events::{UserEvent, encode};
use domain_users::{InMemoryUserRepository, StreamEventPublisher, UserInput, UserService};
use std::sync::Arc;
use std::time::Duration;
use stream_worker::{InMemoryStreamBroker, StreamBroker, StreamWorker};
use tokio::sync::watch;
use userhub_notification_worker::{WorkerSettings, build_workers, check_readiness, run_workers};

const STREAM: &str = "user-events";
const GROUP: &str = "notification-group";

struct Pipeline {
    broker: InMemoryStreamBroker,
    outbox: MockSmtpProvider,
    users: UserService<InMemoryUserRepository>,
    worker: StreamWorker<UserEventProcessor>,
}

fn settings() -> WorkerSettings {
    WorkerSettings {
        consumer_id: "test".to_string(),
        block_timeout_ms: None,
        ..WorkerSettings::default()
    }
}

async fn pipeline_with(outbox: MockSmtpProvider) -> Pipeline {
    let broker = InMemoryStreamBroker::new();
    let shared: Arc<dyn StreamBroker> = Arc::new(broker.clone());

    let publisher = StreamEventPublisher::new(shared.clone());
    let users = UserService::new(InMemoryUserRepository::new(), Arc::new(publisher));

    let dispatcher = NotificationDispatcher::new(Arc::new(outbox.clone())).unwrap();
    let mut workers = build_workers(shared, UserEventProcessor::new(dispatcher), &settings());
    let worker = workers.remove(0);
    worker.consumer().ensure_consumer_group().await.unwrap();

    Pipeline {
        broker,
        outbox,
        users,
        worker,
    }
}

async fn pipeline() -> Pipeline {
    pipeline_with(MockSmtpProvider::new()).await
}

#[tokio::test]
async fn test_create_sends_account_created_email() {
    let p = pipeline().await;

    p.users
        .create_user(UserInput::new("Ann", "ann@x.com", 30))
        .await
        .unwrap();
    assert_eq!(p.worker.process_batch().await.unwrap(), 1);

    let sent = p.outbox.sent_emails().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to_email, "ann@x.com");
    assert_eq!(sent[0].subject, "Account created");
    assert_eq!(p.broker.pending_count(STREAM, GROUP).await, 0);
}

#[tokio::test]
async fn test_update_sends_nothing_and_delete_sends_account_deleted() {
    let p = pipeline().await;

    let ann = p
        .users
        .create_user(UserInput::new("Ann", "ann@x.com", 30))
        .await
        .unwrap();
    p.users
        .update_user(ann.id, UserInput::new("Ann Smith", "ann@x.com", 31))
        .await
        .unwrap();
    p.users.delete_user(ann.id).await.unwrap();

    // Absent id: no event
    p.users.delete_user(ann.id).await.unwrap();

    assert_eq!(p.worker.process_batch().await.unwrap(), 2);

    let subjects: Vec<String> = p
        .outbox
        .sent_emails()
        .await
        .into_iter()
        .map(|e| e.subject)
        .collect();
    assert_eq!(subjects, vec!["Account created", "Account deleted"]);
}

#[tokio::test]
async fn test_bad_entries_do_not_block_the_stream() {
    let p = pipeline().await;

    p.broker.publish(STREAM, b"{not json", 100).await.unwrap();
    p.broker
        .publish(STREAM, br#"{"operation":"RENAME","email":"ann@x.com"}"#, 100)
        .await
        .unwrap();
    p.broker
        .publish(STREAM, &encode(&UserEvent::created("bob@x.com")), 100)
        .await
        .unwrap();

    assert_eq!(p.worker.process_batch().await.unwrap(), 3);

    let sent = p.outbox.sent_emails().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to_email, "bob@x.com");

    // Everything was acknowledged, including the two dropped entries
    assert_eq!(p.broker.pending_count(STREAM, GROUP).await, 0);
    assert_eq!(p.worker.process_batch().await.unwrap(), 0);
}

#[tokio::test]
async fn test_mail_failure_is_acknowledged_and_not_retried() {
    let p = pipeline_with(MockSmtpProvider::failing("smtp down")).await;

    p.users
        .create_user(UserInput::new("Ann", "ann@x.com", 30))
        .await
        .unwrap();

    assert_eq!(p.worker.process_batch().await.unwrap(), 1);
    assert_eq!(p.broker.pending_count(STREAM, GROUP).await, 0);
    assert_eq!(p.worker.drain_pending().await.unwrap(), 0);
}

#[tokio::test]
async fn test_broker_outage_keeps_user_and_loses_notification() {
    let p = pipeline().await;

    p.broker.set_available(false);
    let ann = p
        .users
        .create_user(UserInput::new("Ann", "ann@x.com", 30))
        .await
        .unwrap();
    p.broker.set_available(true);

    assert_eq!(p.users.get_user(ann.id).await.unwrap(), Some(ann));
    assert_eq!(p.worker.process_batch().await.unwrap(), 0);
    assert_eq!(p.outbox.sent_count().await, 0);
}

#[tokio::test]
async fn test_run_workers_until_shutdown() {
    let broker = InMemoryStreamBroker::new();
    let outbox = MockSmtpProvider::new();
    let dispatcher = NotificationDispatcher::new(Arc::new(outbox.clone())).unwrap();

    let settings = WorkerSettings {
        consumer_id: "test".to_string(),
        block_timeout_ms: Some(50),
        concurrency: 3,
        ..WorkerSettings::default()
    };
    let workers = build_workers(
        Arc::new(broker.clone()),
        UserEventProcessor::new(dispatcher),
        &settings,
    );
    assert_eq!(workers.len(), 3);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(run_workers(workers, shutdown_rx));

    for i in 0..6 {
        let event = UserEvent::created(format!("user{i}@x.com"));
        broker.publish(STREAM, &encode(&event), 100).await.unwrap();
    }

    tokio::time::timeout(Duration::from_secs(5), async {
        while outbox.sent_count().await < 6 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    shutdown_tx.send(true).unwrap();
    handle.await.unwrap().unwrap();

    // Each event went to exactly one consumer in the group
    assert_eq!(outbox.sent_count().await, 6);
    assert_eq!(broker.pending_count(STREAM, GROUP).await, 0);
}

#[tokio::test]
async fn test_entries_of_a_vanished_pod_are_taken_over() {
    let broker = InMemoryStreamBroker::new();
    let outbox = MockSmtpProvider::new();
    let dispatcher = NotificationDispatcher::new(Arc::new(outbox.clone())).unwrap();

    broker.ensure_group(STREAM, GROUP).await.unwrap();
    broker
        .publish(STREAM, &encode(&UserEvent::created("ann@x.com")), 100)
        .await
        .unwrap();

    // A pod with another hostname took the entry and was never seen again
    let taken = broker
        .read_new(STREAM, GROUP, "worker-5d8f-0", 10, None)
        .await
        .unwrap();
    assert_eq!(taken.len(), 1);

    let settings = WorkerSettings {
        consumer_id: "worker-9b1c".to_string(),
        block_timeout_ms: Some(20),
        claim_idle_ms: Some(50),
        ..WorkerSettings::default()
    };
    let workers = build_workers(
        Arc::new(broker.clone()),
        UserEventProcessor::new(dispatcher),
        &settings,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(run_workers(workers, shutdown_rx));

    tokio::time::timeout(Duration::from_secs(5), async {
        while outbox.sent_count().await < 1 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    shutdown_tx.send(true).unwrap();
    handle.await.unwrap().unwrap();

    assert!(outbox.was_sent_to("ann@x.com").await);
    assert_eq!(broker.pending_count(STREAM, GROUP).await, 0);
}

#[tokio::test]
async fn test_readiness_requires_the_broker() {
    let broker = InMemoryStreamBroker::new();
    let dispatcher = NotificationDispatcher::new(Arc::new(MockSmtpProvider::new())).unwrap();
    let workers = build_workers(
        Arc::new(broker.clone()),
        UserEventProcessor::new(dispatcher),
        &settings(),
    );

    check_readiness(&workers).await.unwrap();

    broker.set_available(false);
    assert!(check_readiness(&workers).await.is_err());
    assert!(check_readiness(&[]).await.is_err());
}

#[tokio::test]
async fn test_readiness_tolerates_an_unhealthy_mail_gateway() {
    let broker = InMemoryStreamBroker::new();
    let outbox = MockSmtpProvider::failing("smtp down");
    let dispatcher = NotificationDispatcher::new(Arc::new(outbox)).unwrap();
    let workers = build_workers(
        Arc::new(broker.clone()),
        UserEventProcessor::new(dispatcher),
        &settings(),
    );

    check_readiness(&workers).await.unwrap();
}
