use std::sync::Arc;

use relay_queue::{consume, DeliveryHandler, QueueClient, QueueConfig};
use tracing::{debug, error, info};

use crate::error::WorkerError;

/// Runs consume sessions against the configured queue
pub struct RelayWorker {
    client: Arc<dyn QueueClient>,
    config: QueueConfig,
    handler: Arc<dyn DeliveryHandler>,
}

impl RelayWorker {
    /// Creates a worker consuming `config.queue_name` through `handler`
    #[must_use]
    pub fn new(
        client: Arc<dyn QueueClient>,
        config: QueueConfig,
        handler: Arc<dyn DeliveryHandler>,
    ) -> Self {
        Self {
            client,
            config,
            handler,
        }
    }

    /// Runs one consume session: connect, declare, then process deliveries
    /// until the connection ends
    ///
    /// The session owns its connection and closes it on the way out, which
    /// releases any unacknowledged delivery for redelivery.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::ConfigMissing`] without connecting when no broker
    /// URL is configured, and the matching variant when connecting, declaring
    /// or consuming fails.
    pub async fn run(&self) -> Result<(), WorkerError> {
        let queue = self.config.queue_name.as_str();

        let Some(url) = self.config.broker_url.as_deref() else {
            error!("BROKER_URL is not configured, relay worker not started");
            return Err(WorkerError::ConfigMissing);
        };

        let connection = self.client.connect(url).await.map_err(WorkerError::Connect)?;

        if let Err(e) = connection.ensure_queue(queue).await {
            close_quietly(connection.as_ref()).await;
            return Err(WorkerError::Declare(e));
        }

        info!(queue = %queue, "Waiting for messages");

        let result = consume(connection.as_ref(), queue, self.handler.as_ref()).await;
        close_quietly(connection.as_ref()).await;

        result.map_err(WorkerError::Consume)
    }
}

async fn close_quietly(connection: &dyn relay_queue::QueueConnection) {
    if let Err(e) = connection.close().await {
        debug!(error = %e, "Failed to close broker connection");
    }
}
