mod events;
mod health;
mod root;

pub use events::QUEUE_FAILURE_REPLY;

use axum::{
    routing::{get, post},
    Router,
};

/// Creates the router with all handler routes
///
/// Handlers expect `Arc<Publisher>`, `Arc<dyn ResponsePoster>` and
/// `Arc<SlackConfig>` extensions.
pub fn handler() -> Router {
    Router::new()
        .route("/", get(root::handler))
        .route("/echo", post(root::echo))
        .route("/health", get(health::handler))
        .route("/slack/events", post(events::handler))
}
