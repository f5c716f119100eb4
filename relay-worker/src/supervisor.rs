use metrics::counter;
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::WorkerError;
use crate::worker::RelayWorker;

/// Backoff settings for restarting consume sessions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorConfig {
    /// Initial reconnection delay in milliseconds
    pub initial_delay_ms: u64,
    /// Maximum reconnection delay in milliseconds
    pub max_delay_ms: u64,
    /// Give up after this many consecutive failed sessions, `None` retries forever
    pub max_consecutive_failures: Option<u32>,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 500,
            max_delay_ms: 30_000,
            max_consecutive_failures: None,
        }
    }
}

/// Why supervision stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorExit {
    /// The shutdown token was cancelled
    Cancelled,
    /// No broker URL is configured
    ConfigMissing,
    /// `max_consecutive_failures` sessions failed in a row
    GaveUp {
        /// Consecutive failed sessions
        failures: u32,
    },
}

/// Restarts consume sessions with exponential backoff
pub struct Supervisor {
    worker: RelayWorker,
    config: SupervisorConfig,
    shutdown_token: CancellationToken,
}

impl Supervisor {
    /// Creates a supervisor stopped by `shutdown_token`
    #[must_use]
    pub const fn new(
        worker: RelayWorker,
        config: SupervisorConfig,
        shutdown_token: CancellationToken,
    ) -> Self {
        Self {
            worker,
            config,
            shutdown_token,
        }
    }

    /// Returns a clone of the shutdown token for external control
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Runs consume sessions until cancelled, misconfigured, or out of retries
    pub async fn run(self) -> SupervisorExit {
        let mut reconnect_delay = self.config.initial_delay_ms;
        let mut failures: u32 = 0;

        loop {
            if self.shutdown_token.is_cancelled() {
                info!("Relay worker shutting down");
                return SupervisorExit::Cancelled;
            }

            let result = tokio::select! {
                () = self.shutdown_token.cancelled() => {
                    info!("Relay worker shutting down, abandoning consume session");
                    return SupervisorExit::Cancelled;
                }
                result = self.worker.run() => result,
            };

            match result {
                Ok(()) => {
                    warn!("Consume session ended, reconnecting...");
                    reconnect_delay = self.config.initial_delay_ms;
                    failures = 0;
                }
                Err(WorkerError::ConfigMissing) => {
                    warn!("Relay worker disabled until BROKER_URL is configured");
                    return SupervisorExit::ConfigMissing;
                }
                Err(e) => {
                    failures = failures.saturating_add(1);
                    counter!("relay_worker_restarts").increment(1);

                    if matches!(self.config.max_consecutive_failures, Some(max) if failures >= max) {
                        error!(failures, error = %e, "Relay worker giving up after consecutive failures");
                        return SupervisorExit::GaveUp { failures };
                    }

                    error!(
                        failures,
                        error = %e,
                        "Relay worker session failed, reconnecting in {}ms",
                        reconnect_delay
                    );

                    tokio::select! {
                        () = self.shutdown_token.cancelled() => {
                            info!("Relay worker shutting down during reconnect delay");
                            return SupervisorExit::Cancelled;
                        }
                        () = sleep(Duration::from_millis(reconnect_delay)) => {}
                    }

                    // Exponential backoff
                    reconnect_delay = reconnect_delay
                        .saturating_mul(2)
                        .min(self.config.max_delay_ms);
                }
            }
        }
    }
}
