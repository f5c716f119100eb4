use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::supervisor::{Supervisor, SupervisorExit};

/// Handle to the background relay worker
pub struct WorkerHandle {
    shutdown_token: CancellationToken,
    watcher: JoinHandle<Option<SupervisorExit>>,
}

impl WorkerHandle {
    /// Asks the worker to stop; an in-flight delivery is abandoned, not drained
    pub fn shutdown(&self) {
        self.shutdown_token.cancel();
    }

    /// Whether the worker task has finished
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.watcher.is_finished()
    }

    /// Waits for the worker to stop
    ///
    /// Returns `None` if the worker task panicked or was aborted.
    pub async fn stopped(self) -> Option<SupervisorExit> {
        self.watcher.await.ok().flatten()
    }
}

/// Starts the supervised relay worker on its own task
///
/// A watcher task observes how the worker ends. A panic is logged and never
/// reaches the request-serving path. Call once per process.
#[must_use]
pub fn spawn(supervisor: Supervisor) -> WorkerHandle {
    let shutdown_token = supervisor.shutdown_token();
    let task = tokio::spawn(supervisor.run());

    let watcher = tokio::spawn(async move {
        match task.await {
            Ok(SupervisorExit::Cancelled) => {
                info!("Relay worker stopped");
                Some(SupervisorExit::Cancelled)
            }
            Ok(exit) => {
                warn!(?exit, "Relay worker stopped, queued messages will wait for the next start");
                Some(exit)
            }
            Err(e) if e.is_panic() => {
                error!("Relay worker panicked: {e}");
                None
            }
            Err(e) => {
                warn!("Relay worker task was aborted: {e}");
                None
            }
        }
    });

    info!("Relay worker started in background");

    WorkerHandle {
        shutdown_token,
        watcher,
    }
}
