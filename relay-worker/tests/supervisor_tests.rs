//! Supervision and background lifecycle tests

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use relay_queue::{Envelope, QueueConfig};
use relay_worker::testing::{Post, RecordingPoster, StubGenerator};
use relay_worker::{ResponseGenerator, Supervisor, SupervisorConfig, SupervisorExit};
use tokio_util::sync::CancellationToken;

use crate::common::{eventually, within, WorkerTestContext};

const FAST_BACKOFF: SupervisorConfig = SupervisorConfig {
    initial_delay_ms: 1,
    max_delay_ms: 5,
    max_consecutive_failures: None,
};

struct PanickingGenerator;

#[async_trait]
impl ResponseGenerator for PanickingGenerator {
    async fn generate(&self, _prompt: &str) -> anyhow::Result<String> {
        panic!("generator bug");
    }
}

#[tokio::test]
async fn test_supervisor_reconnects_after_severed_connection() {
    let ctx = WorkerTestContext::new("supervisor_reconnect");
    let poster = RecordingPoster::new();
    let worker = ctx.worker(Arc::new(StubGenerator::new("R")), Arc::new(poster.clone()));
    let handle = relay_worker::spawn(Supervisor::new(
        worker,
        FAST_BACKOFF,
        CancellationToken::new(),
    ));

    ctx.publish(&Envelope::new("first", "U1", "C1", "1.1").unwrap())
        .await;
    eventually("first post", || poster.posts().len() == 1).await;

    ctx.broker.sever_connections();
    ctx.publish(&Envelope::new("second", "U1", "C1", "2.2").unwrap())
        .await;
    eventually("second post", || poster.posts().len() == 2).await;

    assert_eq!(
        poster.posts(),
        vec![Post::new("C1", "R", "1.1"), Post::new("C1", "R", "2.2")]
    );
    assert!(ctx.broker.connection_attempts() >= 2);
    assert_eq!(ctx.broker.acked_count(&ctx.queue), 2);

    handle.shutdown();
    assert_eq!(within(handle.stopped()).await, Some(SupervisorExit::Cancelled));
}

#[tokio::test]
async fn test_supervisor_redelivers_after_post_failure() {
    let ctx = WorkerTestContext::new("supervisor_post_failure");
    let poster = RecordingPoster::failing_first(2);
    let worker = ctx.worker(Arc::new(StubGenerator::new("R")), Arc::new(poster.clone()));
    let handle = relay_worker::spawn(Supervisor::new(
        worker,
        FAST_BACKOFF,
        CancellationToken::new(),
    ));

    ctx.publish(&Envelope::new("hello", "U1", "C1", "1.1").unwrap())
        .await;

    eventually("post after retries", || poster.posts().len() == 1).await;
    assert_eq!(poster.attempts(), 3);
    eventually("message acked", || ctx.broker.acked_count(&ctx.queue) == 1).await;

    handle.shutdown();
    within(handle.stopped()).await;
}

#[tokio::test]
async fn test_supervisor_stops_when_broker_url_missing() {
    let ctx = WorkerTestContext::new("supervisor_config_missing");
    let worker = ctx.worker_with_config(
        QueueConfig::new(None),
        Arc::new(StubGenerator::new("R")),
        Arc::new(RecordingPoster::new()),
    );

    let handle = relay_worker::spawn(Supervisor::new(
        worker,
        FAST_BACKOFF,
        CancellationToken::new(),
    ));

    assert_eq!(
        within(handle.stopped()).await,
        Some(SupervisorExit::ConfigMissing)
    );
    assert_eq!(ctx.broker.connection_attempts(), 0);
}

#[tokio::test]
async fn test_supervisor_gives_up_after_consecutive_failures() {
    let ctx = WorkerTestContext::new("supervisor_gives_up");
    ctx.broker.set_reachable(false);
    let worker = ctx.worker(
        Arc::new(StubGenerator::new("R")),
        Arc::new(RecordingPoster::new()),
    );
    let config = SupervisorConfig {
        max_consecutive_failures: Some(3),
        ..FAST_BACKOFF
    };

    let exit = within(Supervisor::new(worker, config, CancellationToken::new()).run()).await;

    assert_eq!(exit, SupervisorExit::GaveUp { failures: 3 });
    assert_eq!(ctx.broker.connection_attempts(), 3);
}

#[tokio::test]
async fn test_cancellation_interrupts_backoff() {
    let ctx = WorkerTestContext::new("supervisor_cancel_backoff");
    ctx.broker.set_reachable(false);
    let worker = ctx.worker(
        Arc::new(StubGenerator::new("R")),
        Arc::new(RecordingPoster::new()),
    );
    let slow = SupervisorConfig {
        initial_delay_ms: 60_000,
        max_delay_ms: 60_000,
        max_consecutive_failures: None,
    };
    let shutdown_token = CancellationToken::new();
    let handle = relay_worker::spawn(Supervisor::new(worker, slow, shutdown_token.clone()));

    eventually("first attempt", || ctx.broker.connection_attempts() == 1).await;
    shutdown_token.cancel();

    assert_eq!(within(handle.stopped()).await, Some(SupervisorExit::Cancelled));
    assert_eq!(ctx.broker.connection_attempts(), 1);
}

#[tokio::test]
async fn test_worker_panic_is_contained() {
    let ctx = WorkerTestContext::new("supervisor_panic");
    let worker = ctx.worker(Arc::new(PanickingGenerator), Arc::new(RecordingPoster::new()));
    let handle = relay_worker::spawn(Supervisor::new(
        worker,
        FAST_BACKOFF,
        CancellationToken::new(),
    ));

    ctx.publish(&Envelope::new("boom", "U1", "C1", "1.1").unwrap())
        .await;

    assert_eq!(within(handle.stopped()).await, None);

    // The panicking session dropped its connection, so the message is back on the queue
    assert_eq!(ctx.broker.ready_messages(&ctx.queue).len(), 1);
    assert_eq!(ctx.broker.acked_count(&ctx.queue), 0);
}
