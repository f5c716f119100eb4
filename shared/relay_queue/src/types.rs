use std::fmt;

/// Name of the queue carrying Slack prompts from the webhook to the worker
pub const SLACK_MESSAGES_QUEUE: &str = "slack_messages";

/// Configuration for queue operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    /// Broker connection URL, absent when the deployment has no broker configured
    pub broker_url: Option<String>,
    /// Queue name
    pub queue_name: String,
}

impl QueueConfig {
    /// Creates a configuration for the Slack messages queue
    #[must_use]
    pub fn new(broker_url: Option<String>) -> Self {
        Self {
            broker_url,
            queue_name: SLACK_MESSAGES_QUEUE.to_string(),
        }
    }
}

/// Opaque handle identifying a delivery when acknowledging it
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeliveryToken(String);

impl DeliveryToken {
    /// Wraps a broker-specific delivery identifier
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the raw identifier
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeliveryToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A message handed to a consumer, pending acknowledgement
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Raw message body
    pub body: Vec<u8>,
    /// Token to pass to `ack`
    pub token: DeliveryToken,
    /// How many times the broker has delivered this message, starting at 1
    pub delivery_count: u64,
}

impl Delivery {
    /// Whether the broker has delivered this message before
    #[must_use]
    pub const fn is_redelivery(&self) -> bool {
        self.delivery_count > 1
    }
}

/// Broker confirmation that a published message is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishAck {
    /// Broker-assigned sequence number
    pub sequence: u64,
}
