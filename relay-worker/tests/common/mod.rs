//! Worker test setup utilities

#![allow(dead_code)]

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use relay_queue::{Envelope, MemoryBroker, QueueClient, QueueConfig};
use relay_worker::{
    DeliveryLedger, MemoryLedger, RelayHandler, RelayWorker, ResponseGenerator, ResponsePoster,
};
use uuid::Uuid;

pub const MEMORY_URL: &str = "memory://local";

/// Initializes tracing once for the test binary
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init()
        .ok();
}

/// In-memory broker plus a unique queue for one test
pub struct WorkerTestContext {
    pub broker: MemoryBroker,
    pub ledger: Arc<MemoryLedger>,
    pub queue: String,
}

impl WorkerTestContext {
    pub fn new(test_name: &str) -> Self {
        setup_tracing();
        Self {
            broker: MemoryBroker::new(),
            ledger: Arc::new(MemoryLedger::new()),
            queue: format!("{}_{}", test_name, Uuid::new_v4().simple()),
        }
    }

    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig {
            broker_url: Some(MEMORY_URL.to_string()),
            queue_name: self.queue.clone(),
        }
    }

    pub fn worker(
        &self,
        generator: Arc<dyn ResponseGenerator>,
        poster: Arc<dyn ResponsePoster>,
    ) -> RelayWorker {
        self.worker_with_config(self.queue_config(), generator, poster)
    }

    pub fn worker_with_config(
        &self,
        config: QueueConfig,
        generator: Arc<dyn ResponseGenerator>,
        poster: Arc<dyn ResponsePoster>,
    ) -> RelayWorker {
        let ledger: Arc<dyn DeliveryLedger> = self.ledger.clone();
        RelayWorker::new(
            Arc::new(self.broker.clone()),
            config,
            Arc::new(RelayHandler::new(generator, poster, ledger)),
        )
    }

    /// Publishes a raw body the way the webhook publisher does
    pub async fn publish_raw(&self, body: &[u8]) {
        let connection = self
            .broker
            .connect(MEMORY_URL)
            .await
            .expect("Failed to connect");
        connection
            .ensure_queue(&self.queue)
            .await
            .expect("Failed to declare queue");
        connection
            .publish(&self.queue, body.to_vec())
            .await
            .expect("Failed to publish");
        connection.close().await.expect("Failed to close");
    }

    pub async fn publish(&self, envelope: &Envelope) {
        self.publish_raw(&envelope.encode().expect("Failed to encode"))
            .await;
    }
}

/// Polls `condition` until it holds, failing the test after two seconds
pub async fn eventually<F>(description: &str, condition: F)
where
    F: Fn() -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for: {description}"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Awaits `future`, failing the test after two seconds
pub async fn within<T>(future: impl Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(2), future)
        .await
        .expect("timed out")
}
