use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::{ConsumeError, QueueResult};
use crate::types::{Delivery, DeliveryToken, PublishAck};

/// Opens connections to a durable message broker
#[async_trait]
pub trait QueueClient: Send + Sync {
    /// Parses connection parameters from `url` and establishes a link
    ///
    /// # Errors
    /// Returns `QueueError::InvalidBrokerUrl` for a malformed URL and
    /// `QueueError::Connect` when the broker is unreachable or refuses
    async fn connect(&self, url: &str) -> QueueResult<Box<dyn QueueConnection>>;
}

/// A live link to the broker, owned by whoever opened it
#[async_trait]
pub trait QueueConnection: Send + Sync {
    /// Declares `queue` as durable; safe to call repeatedly
    ///
    /// # Errors
    /// Returns `QueueError::Declare` if the broker rejects the declaration
    async fn ensure_queue(&self, queue: &str) -> QueueResult<()>;

    /// Publishes a persistent message, returning once the broker has stored it
    ///
    /// # Errors
    /// Returns `QueueError::Publish` if the broker does not confirm the message
    async fn publish(&self, queue: &str, body: Vec<u8>) -> QueueResult<PublishAck>;

    /// Waits for the next message on `queue`
    ///
    /// Returns `Ok(None)` once the connection has been closed.
    ///
    /// # Errors
    /// Returns `QueueError::Receive` on a connection-level failure
    async fn next_delivery(&self, queue: &str) -> QueueResult<Option<Delivery>>;

    /// Confirms a delivery so the broker deletes it
    ///
    /// # Errors
    /// Returns `QueueError::Ack` if the broker does not confirm
    async fn ack(&self, token: &DeliveryToken) -> QueueResult<()>;

    /// Releases the connection; unacknowledged deliveries become eligible for redelivery
    ///
    /// # Errors
    /// Returns `QueueError::Close` if the connection could not be flushed
    async fn close(&self) -> QueueResult<()>;
}

/// Per-message callback driven by [`consume`]
#[async_trait]
pub trait DeliveryHandler: Send + Sync {
    /// Processes one delivery
    ///
    /// The handler is responsible for acknowledging the delivery through
    /// `connection`. Returning an error leaves it unacknowledged and ends the
    /// consume session.
    async fn handle(&self, connection: &dyn QueueConnection, delivery: Delivery) -> anyhow::Result<()>;
}

/// Drives deliveries from `queue` through `handler`, one at a time
///
/// # Errors
/// Returns [`ConsumeError::Connection`] if the connection fails and
/// [`ConsumeError::Handler`] if the handler propagates an error
pub async fn consume<H>(
    connection: &dyn QueueConnection,
    queue: &str,
    handler: &H,
) -> Result<(), ConsumeError>
where
    H: DeliveryHandler + ?Sized,
{
    info!(queue = %queue, "Consuming deliveries");

    loop {
        let delivery = match connection.next_delivery(queue).await {
            Ok(Some(delivery)) => delivery,
            Ok(None) => {
                info!(queue = %queue, "Connection closed, consume session finished");
                return Ok(());
            }
            Err(e) => {
                warn!(queue = %queue, error = %e, "Connection failed while consuming");
                return Err(ConsumeError::Connection(e));
            }
        };

        debug!(
            queue = %queue,
            token = %delivery.token,
            delivery_count = delivery.delivery_count,
            "Received delivery"
        );

        if let Err(e) = handler.handle(connection, delivery).await {
            warn!(queue = %queue, error = %format!("{e:#}"), "Delivery handler failed, leaving message unacknowledged");
            return Err(ConsumeError::Handler(e));
        }
    }
}
