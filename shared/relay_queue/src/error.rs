use thiserror::Error;

/// Result type alias for queue operations
pub type QueueResult<T> = Result<T, QueueError>;

/// Error types for queue operations
#[derive(Error, Debug)]
pub enum QueueError {
    /// The broker URL is malformed or uses an unsupported scheme
    #[error("Invalid broker URL: {0}")]
    InvalidBrokerUrl(String),

    /// The broker is unreachable or refused the connection
    #[error("Failed to connect to broker: {0}")]
    Connect(String),

    /// Declaring the durable queue failed
    #[error("Failed to declare queue '{queue}': {reason}")]
    Declare {
        /// Queue name
        queue: String,
        /// Broker-reported reason
        reason: String,
    },

    /// Sending a message failed on the channel or connection
    #[error("Failed to publish to queue '{queue}': {reason}")]
    Publish {
        /// Queue name
        queue: String,
        /// Broker-reported reason
        reason: String,
    },

    /// Receiving the next delivery failed
    #[error("Failed to receive from queue '{queue}': {reason}")]
    Receive {
        /// Queue name
        queue: String,
        /// Broker-reported reason
        reason: String,
    },

    /// Acknowledging a delivery failed
    #[error("Failed to acknowledge delivery: {0}")]
    Ack(String),

    /// Closing the connection failed
    #[error("Failed to close connection: {0}")]
    Close(String),
}

impl QueueError {
    /// Checks if this error happened while establishing the connection
    #[must_use]
    pub const fn is_connect_error(&self) -> bool {
        matches!(self, Self::InvalidBrokerUrl(_) | Self::Connect(_))
    }
}

/// Reasons a consume session ends with an error
#[derive(Error, Debug)]
pub enum ConsumeError {
    /// The connection failed while waiting for or acknowledging deliveries
    #[error("Consume session lost its connection: {0}")]
    Connection(#[source] QueueError),

    /// The delivery handler propagated an error; the delivery was not acknowledged
    #[error("Delivery handler failed: {0:#}")]
    Handler(anyhow::Error),
}
