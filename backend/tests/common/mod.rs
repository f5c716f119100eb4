// Not every helper is used in every test, so we allow dead code
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use axum::{body::Body, http::Request, response::Response, Router};
use backend::{
    publisher::Publisher,
    server,
    slack::{self, SlackConfig},
    types::InboundEvent,
};
use http_body_util::BodyExt;
use relay_queue::{MemoryBroker, QueueClient, QueueConfig, QueueConnection, QueueResult};
use relay_worker::testing::RecordingPoster;
use tower::ServiceExt;
use uuid::Uuid;

pub const MEMORY_URL: &str = "memory://local";
pub const SIGNING_SECRET: &str = "test-signing-secret";

/// Setup test environment variables and tracing
pub fn setup_test_env() {
    dotenvy::from_path(".env.example").ok();

    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init()
        .ok();
}

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

pub fn inbound_event() -> InboundEvent {
    InboundEvent {
        text: "hello".to_string(),
        user: "U1".to_string(),
        channel: "C1".to_string(),
        ts: "1.1".to_string(),
        message_ts: Some("1.1".to_string()),
    }
}

/// Router wired to an in-memory broker and a recording Slack poster
pub struct TestSetup {
    pub router: Router,
    pub broker: MemoryBroker,
    pub poster: RecordingPoster,
    pub publisher: Arc<Publisher>,
    pub queue: String,
}

impl TestSetup {
    /// Setup with a configured broker
    pub fn new() -> Self {
        Self::with_broker_url(Some(MEMORY_URL.to_string()))
    }

    /// Setup whose broker URL is absent
    pub fn without_broker_url() -> Self {
        Self::with_broker_url(None)
    }

    pub fn with_broker_url(broker_url: Option<String>) -> Self {
        let broker = MemoryBroker::new();
        Self::build(broker.clone(), broker_url, |config| {
            Publisher::new(Arc::new(broker.clone()), config)
        })
    }

    /// Setup whose broker accepts connections but never completes them
    pub fn with_hanging_broker(hanging: HangingBroker, publish_timeout: Duration) -> Self {
        Self::build(
            MemoryBroker::new(),
            Some(MEMORY_URL.to_string()),
            move |config| {
                Publisher::new(Arc::new(hanging), config).with_publish_timeout(publish_timeout)
            },
        )
    }

    fn build(
        broker: MemoryBroker,
        broker_url: Option<String>,
        publisher: impl FnOnce(QueueConfig) -> Publisher,
    ) -> Self {
        setup_test_env();

        let poster = RecordingPoster::new();
        let queue = format!("slack_messages_{}", Uuid::new_v4().simple());

        let publisher = Arc::new(publisher(QueueConfig {
            broker_url,
            queue_name: queue.clone(),
        }));

        let router = server::router(
            Arc::clone(&publisher),
            Arc::new(poster.clone()),
            Arc::new(SlackConfig {
                bot_token: "xoxb-test".to_string(),
                signing_secret: SIGNING_SECRET.to_string(),
                api_base_url: "http://127.0.0.1:9".to_string(),
            }),
        );

        Self {
            router,
            broker,
            poster,
            publisher,
            queue,
        }
    }

    /// Sends a POST signed the way Slack signs webhook deliveries
    pub async fn send_signed_event(&self, payload: &serde_json::Value) -> Response {
        let body = payload.to_string();
        let timestamp = unix_now().to_string();
        let signature = slack::sign(SIGNING_SECRET, &timestamp, body.as_bytes());
        self.send_event(body, &timestamp, &signature).await
    }

    pub async fn send_event(&self, body: String, timestamp: &str, signature: &str) -> Response {
        let request = Request::builder()
            .uri("/slack/events")
            .method("POST")
            .header("Content-Type", "application/json")
            .header("X-Slack-Request-Timestamp", timestamp)
            .header("X-Slack-Signature", signature)
            .body(Body::from(body))
            .unwrap();

        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn send_get_request(&self, route: &str) -> Response {
        let request = Request::builder()
            .uri(route)
            .method("GET")
            .body(Body::empty())
            .unwrap();

        self.router.clone().oneshot(request).await.unwrap()
    }
}

/// Parse response body to JSON
pub async fn parse_response_body(response: Response) -> serde_json::Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

/// Builds an `event_callback` payload wrapping `event`
pub fn event_callback(event: serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "type": "event_callback",
        "team_id": "T1",
        "event_id": "Ev1",
        "event": event,
    })
}

pub fn app_mention(text: &str) -> serde_json::Value {
    event_callback(serde_json::json!({
        "type": "app_mention",
        "text": text,
        "user": "U1",
        "channel": "C1",
        "ts": "1.1",
    }))
}

/// Broker whose connection attempts never finish, like a host dropping packets
#[derive(Debug, Clone, Default)]
pub struct HangingBroker {
    attempts: Arc<AtomicUsize>,
}

impl HangingBroker {
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueueClient for HangingBroker {
    async fn connect(&self, _url: &str) -> QueueResult<Box<dyn QueueConnection>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }
}
