#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    dead_code
)]

//! Background worker that drains the Slack messages queue
//!
//! Each delivery is decoded, turned into a response by a [`ResponseGenerator`]
//! and posted back to the originating thread by a [`ResponsePoster`]. The
//! delivery is acknowledged only after the post succeeds.

/// Response generation and posting seams
pub mod collaborators;
/// Worker error types
pub mod error;
/// Per-delivery processing
pub mod handler;
/// Delivery ledger for duplicate suppression
pub mod ledger;
/// Background task management
pub mod lifecycle;
/// Restart policy for consume sessions
pub mod supervisor;
/// Consume sessions against the queue
pub mod worker;

/// Test doubles for the collaborators
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use collaborators::{CodeRecommendation, ResponseGenerator, ResponsePoster};
pub use error::{DeliveryFailure, WorkerError};
pub use handler::RelayHandler;
pub use ledger::{delivery_key, DeliveryLedger, MemoryLedger, RedisLedger};
pub use lifecycle::{spawn, WorkerHandle};
pub use supervisor::{Supervisor, SupervisorConfig, SupervisorExit};
pub use worker::RelayWorker;
