mod client;
mod signature;

pub use client::{SlackClient, SlackConfig};
pub use signature::{sign, verify, SignatureError, MAX_CLOCK_SKEW_SECS};
