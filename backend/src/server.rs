use std::sync::Arc;
use std::time::Duration;

use axum::{Extension, Router};
use relay_worker::ResponsePoster;
use tokio::net::TcpListener;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{error, info};

use crate::publisher::Publisher;
use crate::routes;
use crate::slack::SlackConfig;
use crate::types::Environment;

/// Builds the application router with its dependencies attached
pub fn router(
    publisher: Arc<Publisher>,
    poster: Arc<dyn ResponsePoster>,
    slack_config: Arc<SlackConfig>,
) -> Router {
    routes::handler()
        .layer(Extension(publisher))
        .layer(Extension(poster))
        .layer(Extension(slack_config))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(5)))
}

/// Starts the server with the given environment and dependencies
///
/// # Errors
///
/// Returns an error if the server fails to start or bind to the port
pub async fn start(
    environment: Environment,
    publisher: Arc<Publisher>,
    poster: Arc<dyn ResponsePoster>,
    slack_config: Arc<SlackConfig>,
) -> anyhow::Result<()> {
    let router = router(publisher, poster, slack_config);

    let addr = std::net::SocketAddr::from((
        [0, 0, 0, 0],
        std::env::var("PORT").map_or(Ok(8001), |p| p.parse())?,
    ));

    let listener = TcpListener::bind(&addr).await?;
    info!(?environment, "Slack relay started on http://{addr}");

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(anyhow::Error::from)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, starting graceful shutdown"),
        () = terminate => info!("Received SIGTERM, starting graceful shutdown"),
    }
}
