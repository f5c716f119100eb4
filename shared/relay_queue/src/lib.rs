//! Durable queue plumbing for the Slack relay
//!
//! This crate provides the envelope that travels through the queue and a small
//! client abstraction over a durable broker, shared between the webhook
//! publisher and the background worker.

#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    dead_code
)]

/// Queue client traits and the consume driver
pub mod client;
/// Envelope codec
pub mod envelope;
/// Error types for queue operations
pub mod error;
/// In-memory broker for tests and local development
pub mod memory;
/// NATS `JetStream` broker
pub mod nats;
/// Common types for queue operations
pub mod types;

pub use client::{consume, DeliveryHandler, QueueClient, QueueConnection};
pub use envelope::{Envelope, EnvelopeError};
pub use error::{ConsumeError, QueueError, QueueResult};
pub use memory::MemoryBroker;
pub use nats::{NatsBroker, NatsParams};
pub use types::{Delivery, DeliveryToken, PublishAck, QueueConfig, SLACK_MESSAGES_QUEUE};
