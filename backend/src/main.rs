use std::sync::Arc;
use std::time::Duration;

use backend::{
    publisher::Publisher,
    server,
    slack::SlackClient,
    types::Environment,
};
use relay_queue::{NatsBroker, QueueClient};
use relay_worker::{
    ledger::DEFAULT_LEDGER_TTL_SECS, CodeRecommendation, DeliveryLedger, MemoryLedger,
    RedisLedger, RelayHandler, RelayWorker, ResponsePoster, Supervisor,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let environment = Environment::from_env();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(environment.default_log_filter()));

    // JSON logs for staging/production, plain text for development
    if environment.json_logs() {
        fmt().json().with_env_filter(filter).init();
    } else {
        fmt().with_env_filter(filter).init();
    }

    let queue_config = environment.queue_config();
    let slack_config = Arc::new(environment.slack_config());

    let broker: Arc<dyn QueueClient> = Arc::new(NatsBroker::new().with_client_name("slack-relay"));
    let slack_client: Arc<dyn ResponsePoster> = Arc::new(SlackClient::new(&slack_config)?);

    let ledger: Arc<dyn DeliveryLedger> = match environment.redis_url() {
        Some(url) => Arc::new(RedisLedger::connect(&url, DEFAULT_LEDGER_TTL_SECS).await?),
        None => {
            info!("REDIS_URL not set, using in-memory delivery ledger");
            Arc::new(MemoryLedger::new())
        }
    };

    let handler = Arc::new(RelayHandler::new(
        Arc::new(CodeRecommendation),
        Arc::clone(&slack_client),
        ledger,
    ));
    let worker = RelayWorker::new(Arc::clone(&broker), queue_config.clone(), handler);
    let worker_handle = relay_worker::spawn(Supervisor::new(
        worker,
        environment.supervisor_config(),
        CancellationToken::new(),
    ));

    let publisher = Arc::new(Publisher::new(broker, queue_config));
    let result = server::start(environment, publisher, slack_client, slack_config).await;

    worker_handle.shutdown();
    if tokio::time::timeout(Duration::from_secs(5), worker_handle.stopped())
        .await
        .is_err()
    {
        warn!("Relay worker did not stop within 5s");
    }

    result
}
