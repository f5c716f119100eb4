//! Queue test setup utilities

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use relay_queue::{Delivery, DeliveryHandler, QueueConnection};
use uuid::Uuid;

pub const NATS_URL: &str = "nats://localhost:4222";
pub const MEMORY_URL: &str = "memory://local";

/// Creates a queue name unique to one test run
pub fn unique_queue(test_name: &str) -> String {
    format!("{}_{}", test_name, Uuid::new_v4().simple())
}

/// What a [`RecordingHandler`] does with each delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Ack,
    Fail,
}

/// Handler that records delivered bodies and acks or fails according to a script
pub struct RecordingHandler {
    pub seen: Arc<Mutex<Vec<Delivery>>>,
    script: Mutex<Vec<Outcome>>,
}

impl RecordingHandler {
    /// Acks every delivery
    pub fn acking() -> Self {
        Self::scripted(Vec::new())
    }

    /// Follows `script` in order, then acks everything after it runs out
    pub fn scripted(script: Vec<Outcome>) -> Self {
        let mut script = script;
        script.reverse();
        Self {
            seen: Arc::new(Mutex::new(Vec::new())),
            script: Mutex::new(script),
        }
    }

    pub fn bodies(&self) -> Vec<Vec<u8>> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .map(|d| d.body.clone())
            .collect()
    }
}

#[async_trait]
impl DeliveryHandler for RecordingHandler {
    async fn handle(
        &self,
        connection: &dyn QueueConnection,
        delivery: Delivery,
    ) -> anyhow::Result<()> {
        self.seen.lock().unwrap().push(delivery.clone());

        let outcome = self.script.lock().unwrap().pop().unwrap_or(Outcome::Ack);
        match outcome {
            Outcome::Ack => {
                connection.ack(&delivery.token).await?;
                Ok(())
            }
            Outcome::Fail => anyhow::bail!("scripted failure"),
        }
    }
}
