use std::sync::Arc;

use async_trait::async_trait;
use metrics::counter;
use relay_queue::{Delivery, DeliveryHandler, Envelope, QueueConnection};
use tracing::{error, info, instrument, warn};

use crate::collaborators::{ResponseGenerator, ResponsePoster};
use crate::error::DeliveryFailure;
use crate::ledger::{delivery_key, DeliveryLedger};

/// Turns each queued envelope into a threaded reply
pub struct RelayHandler {
    generator: Arc<dyn ResponseGenerator>,
    poster: Arc<dyn ResponsePoster>,
    ledger: Arc<dyn DeliveryLedger>,
}

impl RelayHandler {
    /// Creates a handler from its collaborators
    #[must_use]
    pub fn new(
        generator: Arc<dyn ResponseGenerator>,
        poster: Arc<dyn ResponsePoster>,
        ledger: Arc<dyn DeliveryLedger>,
    ) -> Self {
        Self {
            generator,
            poster,
            ledger,
        }
    }

    async fn deliver(&self, envelope: &Envelope) -> Result<(), DeliveryFailure> {
        let response = self
            .generator
            .generate(envelope.prompt())
            .await
            .map_err(DeliveryFailure::Generation)?;

        self.poster
            .post_message(envelope.channel(), &response, envelope.thread_ts())
            .await
            .map_err(DeliveryFailure::Posting)
    }
}

#[async_trait]
impl DeliveryHandler for RelayHandler {
    #[instrument(
        skip(self, connection, delivery),
        fields(token = %delivery.token, delivery_count = delivery.delivery_count)
    )]
    async fn handle(&self, connection: &dyn QueueConnection, delivery: Delivery) -> anyhow::Result<()> {
        // Malformed bodies are acked and dropped, never redelivered
        let envelope = match Envelope::decode(&delivery.body) {
            Ok(envelope) => envelope,
            Err(e) => {
                error!(error = %e, body_len = delivery.body.len(), "Dropping undecodable message");
                connection.ack(&delivery.token).await?;
                counter!("relay_messages_dropped").increment(1);
                return Ok(());
            }
        };

        let key = delivery_key(&envelope);

        match self.ledger.already_delivered(&key).await {
            Ok(true) => {
                info!(
                    user = %envelope.user(),
                    channel = %envelope.channel(),
                    thread_ts = %envelope.thread_ts(),
                    "Response already posted, acknowledging duplicate"
                );
                connection.ack(&delivery.token).await?;
                counter!("relay_duplicates_skipped").increment(1);
                return Ok(());
            }
            Ok(false) => {}
            Err(e) => {
                warn!(error = %format!("{e:#}"), "Delivery ledger lookup failed, posting anyway");
            }
        }

        if let Err(e) = self.deliver(&envelope).await {
            error!(
                user = %envelope.user(),
                channel = %envelope.channel(),
                thread_ts = %envelope.thread_ts(),
                error = %e,
                "Failed to deliver response, leaving message for redelivery"
            );
            return Err(e.into());
        }

        if let Err(e) = self.ledger.record(&key).await {
            warn!(error = %format!("{e:#}"), "Failed to record delivery");
        }

        connection.ack(&delivery.token).await?;
        counter!("relay_messages_delivered").increment(1);

        info!(
            user = %envelope.user(),
            channel = %envelope.channel(),
            thread_ts = %envelope.thread_ts(),
            "Response delivered"
        );

        Ok(())
    }
}
