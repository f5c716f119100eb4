use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::Notify;
use tracing::debug;
use url::Url;

use crate::client::{QueueClient, QueueConnection};
use crate::error::{QueueError, QueueResult};
use crate::types::{Delivery, DeliveryToken, PublishAck};

/// In-process broker with the same durability contract as the real one
///
/// Messages stay queued until acknowledged. Closing, dropping or severing a
/// connection returns its unacknowledged deliveries to the head of their queue.
/// Clones share state, so a test can keep a handle for inspection and failure
/// injection while handing another to the code under test.
#[derive(Debug, Clone, Default)]
pub struct MemoryBroker {
    shared: Arc<Shared>,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<BrokerState>,
    notify: Notify,
}

#[derive(Debug)]
struct BrokerState {
    reachable: bool,
    connection_attempts: usize,
    next_connection_id: u64,
    next_tag: u64,
    connections: HashMap<u64, ConnectionStatus>,
    queues: HashMap<String, QueueState>,
}

impl Default for BrokerState {
    fn default() -> Self {
        Self {
            reachable: true,
            connection_attempts: 0,
            next_connection_id: 0,
            next_tag: 0,
            connections: HashMap::new(),
            queues: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionStatus {
    Open,
    Closed,
    Severed,
}

#[derive(Debug, Default)]
struct QueueState {
    ready: VecDeque<StoredMessage>,
    unacked: BTreeMap<u64, Unacked>,
    published: usize,
    acked: usize,
}

#[derive(Debug)]
struct StoredMessage {
    body: Vec<u8>,
    delivery_count: u64,
}

#[derive(Debug)]
struct Unacked {
    token: DeliveryToken,
    owner: u64,
    message: StoredMessage,
}

impl BrokerState {
    fn status(&self, connection: u64) -> ConnectionStatus {
        self.connections
            .get(&connection)
            .copied()
            .unwrap_or(ConnectionStatus::Closed)
    }

    /// Puts every delivery held by `connection` back at the head of its queue, in order
    fn requeue(&mut self, connection: u64) {
        for (name, queue) in &mut self.queues {
            let tags: Vec<u64> = queue
                .unacked
                .iter()
                .filter(|(_, u)| u.owner == connection)
                .map(|(tag, _)| *tag)
                .collect();

            for tag in tags.into_iter().rev() {
                if let Some(unacked) = queue.unacked.remove(&tag) {
                    debug!(queue = %name, token = %unacked.token, "Requeueing unacknowledged delivery");
                    queue.ready.push_front(unacked.message);
                }
            }
        }
    }
}

impl MemoryBroker {
    /// Creates an empty, reachable broker
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BrokerState> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of `connect` calls, successful or not
    #[must_use]
    pub fn connection_attempts(&self) -> usize {
        self.lock().connection_attempts
    }

    /// Whether `queue` has been declared
    #[must_use]
    pub fn is_declared(&self, queue: &str) -> bool {
        self.lock().queues.contains_key(queue)
    }

    /// Bodies of the messages waiting on `queue`, head first
    #[must_use]
    pub fn ready_messages(&self, queue: &str) -> Vec<Vec<u8>> {
        self.lock()
            .queues
            .get(queue)
            .map(|q| q.ready.iter().map(|m| m.body.clone()).collect())
            .unwrap_or_default()
    }

    /// Number of deliveries on `queue` awaiting acknowledgement
    #[must_use]
    pub fn unacked_count(&self, queue: &str) -> usize {
        self.lock().queues.get(queue).map_or(0, |q| q.unacked.len())
    }

    /// Number of acknowledged deliveries on `queue`
    #[must_use]
    pub fn acked_count(&self, queue: &str) -> usize {
        self.lock().queues.get(queue).map_or(0, |q| q.acked)
    }

    /// Number of messages ever published to `queue`
    #[must_use]
    pub fn published_count(&self, queue: &str) -> usize {
        self.lock().queues.get(queue).map_or(0, |q| q.published)
    }

    /// Number of connections currently open
    #[must_use]
    pub fn open_connections(&self) -> usize {
        self.lock()
            .connections
            .values()
            .filter(|s| **s == ConnectionStatus::Open)
            .count()
    }

    /// Makes subsequent `connect` calls succeed or fail
    pub fn set_reachable(&self, reachable: bool) {
        self.lock().reachable = reachable;
    }

    /// Simulates the broker dropping every open connection
    pub fn sever_connections(&self) {
        {
            let mut state = self.lock();
            let open: Vec<u64> = state
                .connections
                .iter()
                .filter(|(_, s)| **s == ConnectionStatus::Open)
                .map(|(id, _)| *id)
                .collect();

            for id in open {
                state.connections.insert(id, ConnectionStatus::Severed);
                state.requeue(id);
            }
        }
        self.shared.notify.notify_waiters();
    }
}

#[async_trait]
impl QueueClient for MemoryBroker {
    async fn connect(&self, url: &str) -> QueueResult<Box<dyn QueueConnection>> {
        let id = {
            let mut state = self.lock();
            state.connection_attempts += 1;

            Url::parse(url).map_err(|e| QueueError::InvalidBrokerUrl(e.to_string()))?;

            if !state.reachable {
                return Err(QueueError::Connect(format!("{url}: connection refused")));
            }

            let id = state.next_connection_id;
            state.next_connection_id += 1;
            state.connections.insert(id, ConnectionStatus::Open);
            id
        };

        debug!(connection = id, "Opened in-memory broker connection");

        Ok(Box::new(MemoryConnection {
            id,
            broker: self.clone(),
        }))
    }
}

struct MemoryConnection {
    id: u64,
    broker: MemoryBroker,
}

impl MemoryConnection {
    fn release(&self) {
        {
            let mut state = self.broker.lock();
            if state.status(self.id) == ConnectionStatus::Open {
                state.connections.insert(self.id, ConnectionStatus::Closed);
                state.requeue(self.id);
            }
        }
        self.broker.shared.notify.notify_waiters();
    }

    fn check_open(&self, state: &BrokerState) -> Result<(), String> {
        match state.status(self.id) {
            ConnectionStatus::Open => Ok(()),
            ConnectionStatus::Closed => Err("connection closed".to_string()),
            ConnectionStatus::Severed => Err("connection lost".to_string()),
        }
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        self.release();
    }
}

#[async_trait]
impl QueueConnection for MemoryConnection {
    async fn ensure_queue(&self, queue: &str) -> QueueResult<()> {
        let mut state = self.broker.lock();
        self.check_open(&state).map_err(|reason| QueueError::Declare {
            queue: queue.to_string(),
            reason,
        })?;

        state.queues.entry(queue.to_string()).or_default();
        Ok(())
    }

    async fn publish(&self, queue: &str, body: Vec<u8>) -> QueueResult<PublishAck> {
        let sequence = {
            let mut state = self.broker.lock();
            let publish_error = |reason: String| QueueError::Publish {
                queue: queue.to_string(),
                reason,
            };

            self.check_open(&state).map_err(publish_error)?;

            let queue_state = state
                .queues
                .get_mut(queue)
                .ok_or_else(|| publish_error("queue not declared".to_string()))?;

            queue_state.ready.push_back(StoredMessage {
                body,
                delivery_count: 0,
            });
            queue_state.published += 1;
            u64::try_from(queue_state.published).unwrap_or(u64::MAX)
        };

        self.broker.shared.notify.notify_waiters();
        Ok(PublishAck { sequence })
    }

    async fn next_delivery(&self, queue: &str) -> QueueResult<Option<Delivery>> {
        loop {
            let notified = self.broker.shared.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.broker.lock();
                let receive_error = |reason: String| QueueError::Receive {
                    queue: queue.to_string(),
                    reason,
                };

                match state.status(self.id) {
                    ConnectionStatus::Closed => return Ok(None),
                    ConnectionStatus::Severed => {
                        return Err(receive_error("connection lost".to_string()))
                    }
                    ConnectionStatus::Open => {}
                }

                let tag = state.next_tag;
                let queue_state = state
                    .queues
                    .get_mut(queue)
                    .ok_or_else(|| receive_error("queue not declared".to_string()))?;

                if let Some(mut message) = queue_state.ready.pop_front() {
                    message.delivery_count += 1;
                    let token = DeliveryToken::new(format!("{queue}:{tag}"));
                    let delivery = Delivery {
                        body: message.body.clone(),
                        token: token.clone(),
                        delivery_count: message.delivery_count,
                    };

                    queue_state.unacked.insert(
                        tag,
                        Unacked {
                            token,
                            owner: self.id,
                            message,
                        },
                    );
                    state.next_tag += 1;

                    return Ok(Some(delivery));
                }
            }

            notified.await;
        }
    }

    async fn ack(&self, token: &DeliveryToken) -> QueueResult<()> {
        let mut state = self.broker.lock();
        self.check_open(&state).map_err(QueueError::Ack)?;

        let owner = self.id;
        for queue in state.queues.values_mut() {
            let tag = queue
                .unacked
                .iter()
                .find(|(_, u)| u.token == *token && u.owner == owner)
                .map(|(tag, _)| *tag);

            if let Some(tag) = tag {
                queue.unacked.remove(&tag);
                queue.acked += 1;
                return Ok(());
            }
        }

        Err(QueueError::Ack(format!("unknown delivery '{token}'")))
    }

    async fn close(&self) -> QueueResult<()> {
        self.release();
        Ok(())
    }
}
