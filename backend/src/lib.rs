//! Slack relay backend service

#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    dead_code
)]

/// Publishes inbound Slack events to the durable queue
pub mod publisher;

/// HTTP routes
pub mod routes;

/// HTTP server
pub mod server;

/// Slack Web API client and request signing
pub mod slack;

/// Configuration and shared types
pub mod types;
