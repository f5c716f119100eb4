use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use relay_queue::{Envelope, EnvelopeError, PublishAck, QueueClient, QueueConfig, QueueError};
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, error, info, instrument};

use crate::types::InboundEvent;

/// Why an event could not be queued
#[derive(Error, Debug)]
pub enum PublishFailure {
    /// No broker URL is configured, no connection was attempted
    #[error("BROKER_URL is not configured")]
    ConfigMissing,

    /// The event lacks a required field
    #[error("Invalid event: {0}")]
    InvalidEvent(#[from] EnvelopeError),

    /// Connecting, declaring or publishing failed
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// The broker did not confirm the message in time
    #[error("Broker did not confirm the message within {0:?}")]
    Timeout(Duration),
}

/// Upper bound on one publish, below Slack's 3 second acknowledgement deadline
pub const DEFAULT_PUBLISH_TIMEOUT: Duration = Duration::from_secs(2);

/// Queues inbound events for the relay worker
///
/// Every publish opens its own broker connection and closes it afterwards.
pub struct Publisher {
    client: Arc<dyn QueueClient>,
    config: QueueConfig,
    publish_timeout: Duration,
}

impl Publisher {
    /// Creates a publisher for the configured queue
    #[must_use]
    pub fn new(client: Arc<dyn QueueClient>, config: QueueConfig) -> Self {
        Self {
            client,
            config,
            publish_timeout: DEFAULT_PUBLISH_TIMEOUT,
        }
    }

    /// Overrides how long one publish may take before it counts as failed
    #[must_use]
    pub const fn with_publish_timeout(mut self, publish_timeout: Duration) -> Self {
        self.publish_timeout = publish_timeout;
        self
    }

    /// Queues `event`, returning whether it was stored durably
    ///
    /// Failures are logged and never returned to the caller.
    #[instrument(skip_all, fields(user = %event.user, channel = %event.channel, thread_ts = %event.ts))]
    pub async fn publish_message(&self, event: &InboundEvent) -> bool {
        match self.try_publish(event).await {
            Ok(ack) => {
                counter!("relay_messages_published").increment(1);
                info!(sequence = ack.sequence, "Successfully published message");
                true
            }
            Err(e) => {
                counter!("relay_publish_failed").increment(1);
                error!(error = %e, "Failed to publish message");
                false
            }
        }
    }

    /// Queues `event`, reporting why it failed
    ///
    /// # Errors
    ///
    /// Returns [`PublishFailure::ConfigMissing`] without connecting when no
    /// broker URL is configured, [`PublishFailure::InvalidEvent`] when a field
    /// is empty, [`PublishFailure::Queue`] when the broker fails, and
    /// [`PublishFailure::Timeout`] when the broker does not answer in time
    pub async fn try_publish(&self, event: &InboundEvent) -> Result<PublishAck, PublishFailure> {
        timeout(self.publish_timeout, self.publish_once(event))
            .await
            .map_err(|_| PublishFailure::Timeout(self.publish_timeout))?
    }

    async fn publish_once(&self, event: &InboundEvent) -> Result<PublishAck, PublishFailure> {
        let url = self
            .config
            .broker_url
            .as_deref()
            .ok_or(PublishFailure::ConfigMissing)?;

        let body = Envelope::new(
            event.text.as_str(),
            event.user.as_str(),
            event.channel.as_str(),
            event.ts.as_str(),
        )?
        .with_message_ts(event.message_ts.as_deref().unwrap_or_default())
        .encode()?;

        let queue = self.config.queue_name.as_str();
        let connection = self.client.connect(url).await?;

        let result = match connection.ensure_queue(queue).await {
            Ok(()) => connection.publish(queue, body).await,
            Err(e) => Err(e),
        };

        if let Err(e) = connection.close().await {
            debug!(error = %e, "Failed to close publisher connection");
        }

        Ok(result?)
    }
}
