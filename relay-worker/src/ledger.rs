use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use relay_queue::Envelope;
use sha2::{Digest, Sha256};
use tokio::time::timeout;

const REDIS_TIMEOUT: Duration = Duration::from_secs(3);
const KEY_PREFIX: &str = "relay:delivered:";

/// How long a delivered key is remembered, one day
pub const DEFAULT_LEDGER_TTL_SECS: u64 = 86_400;

/// Derives the idempotency key of an envelope
///
/// Two envelopes map to the same key exactly when all their fields match,
/// including the originating message timestamp. A redelivered message keeps
/// its key while a repeated message in the same thread gets a new one.
#[must_use]
pub fn delivery_key(envelope: &Envelope) -> String {
    let mut hasher = Sha256::new();
    let fields = [
        Some(envelope.user()),
        Some(envelope.channel()),
        Some(envelope.thread_ts()),
        Some(envelope.prompt()),
        envelope.message_ts(),
    ];
    for field in fields.into_iter().flatten() {
        hasher.update((field.len() as u64).to_be_bytes());
        hasher.update(field.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Record of responses already posted, used to suppress duplicates on redelivery
#[async_trait]
pub trait DeliveryLedger: Send + Sync {
    /// Whether a response for `key` has been posted
    ///
    /// # Errors
    /// Returns an error if the backing store is unavailable
    async fn already_delivered(&self, key: &str) -> anyhow::Result<bool>;

    /// Marks `key` as posted
    ///
    /// # Errors
    /// Returns an error if the backing store is unavailable
    async fn record(&self, key: &str) -> anyhow::Result<()>;
}

/// Process-local ledger, forgotten on restart
///
/// Keys expire after the ledger's TTL like their Redis counterparts; expired
/// keys are pruned whenever a new key is recorded.
#[derive(Debug)]
pub struct MemoryLedger {
    ttl: Duration,
    keys: Mutex<HashMap<String, Instant>>,
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::with_ttl(Duration::from_secs(DEFAULT_LEDGER_TTL_SECS))
    }
}

impl MemoryLedger {
    /// Creates a ledger remembering keys for [`DEFAULT_LEDGER_TTL_SECS`]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a ledger remembering keys for `ttl`
    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            keys: Mutex::new(HashMap::new()),
        }
    }

    fn keys(&self) -> MutexGuard<'_, HashMap<String, Instant>> {
        self.keys.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl DeliveryLedger for MemoryLedger {
    async fn already_delivered(&self, key: &str) -> anyhow::Result<bool> {
        Ok(self
            .keys()
            .get(key)
            .is_some_and(|recorded| recorded.elapsed() < self.ttl))
    }

    async fn record(&self, key: &str) -> anyhow::Result<()> {
        let mut keys = self.keys();
        keys.retain(|_, recorded| recorded.elapsed() < self.ttl);
        // The first record wins, matching SET NX
        keys.entry(key.to_string()).or_insert_with(Instant::now);
        Ok(())
    }
}

/// Ledger shared through Redis, surviving worker restarts
#[derive(Clone)]
pub struct RedisLedger {
    connection_manager: ConnectionManager,
    ttl_secs: u64,
}

impl RedisLedger {
    /// Connects to Redis at `url`
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the server is unreachable
    pub async fn connect(url: &str, ttl_secs: u64) -> anyhow::Result<Self> {
        let client = Client::open(url)?;
        let connection_manager = ConnectionManager::new(client).await?;

        Ok(Self {
            connection_manager,
            ttl_secs,
        })
    }

    fn redis_key(key: &str) -> String {
        format!("{KEY_PREFIX}{key}")
    }
}

#[async_trait]
impl DeliveryLedger for RedisLedger {
    async fn already_delivered(&self, key: &str) -> anyhow::Result<bool> {
        let mut conn = self.connection_manager.clone();
        timeout(REDIS_TIMEOUT, conn.exists::<_, bool>(Self::redis_key(key)))
            .await
            .map_err(|_| anyhow::anyhow!("Redis timeout"))?
            .map_err(|e| anyhow::anyhow!("Redis error: {e}"))
    }

    async fn record(&self, key: &str) -> anyhow::Result<()> {
        let mut conn = self.connection_manager.clone();
        // NX keeps the original expiry when a duplicate is recorded
        timeout(
            REDIS_TIMEOUT,
            conn.set_options::<_, _, Option<String>>(
                Self::redis_key(key),
                "1",
                redis::SetOptions::default()
                    .conditional_set(redis::ExistenceCheck::NX)
                    .with_expiration(redis::SetExpiry::EX(self.ttl_secs)),
            ),
        )
        .await
        .map_err(|_| anyhow::anyhow!("Redis timeout"))?
        .map_err(|e| anyhow::anyhow!("Redis error: {e}"))?;
        Ok(())
    }
}
