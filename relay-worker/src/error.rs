use relay_queue::{ConsumeError, QueueError};
use thiserror::Error;

/// A response could not be produced or delivered
///
/// Propagating this out of the delivery handler keeps the message
/// unacknowledged so the broker redelivers it.
#[derive(Error, Debug)]
pub enum DeliveryFailure {
    /// The generator returned an error
    #[error("Response generation failed: {0:#}")]
    Generation(anyhow::Error),

    /// The chat platform rejected the post
    #[error("Posting the response failed: {0:#}")]
    Posting(anyhow::Error),
}

/// Reasons a consume session ends
#[derive(Error, Debug)]
pub enum WorkerError {
    /// No broker URL is configured, the worker never starts
    #[error("Broker URL is not configured")]
    ConfigMissing,

    /// The broker could not be reached
    #[error("Failed to connect to the broker: {0}")]
    Connect(#[source] QueueError),

    /// The broker rejected the queue declaration
    #[error("Failed to declare the queue: {0}")]
    Declare(#[source] QueueError),

    /// The connection failed or a delivery could not be handled
    #[error("Consume session ended: {0}")]
    Consume(#[source] ConsumeError),
}
