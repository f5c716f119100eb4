use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use relay_worker::ResponsePoster;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Slack credentials and endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlackConfig {
    /// Bot token used for `chat.postMessage`
    pub bot_token: String,
    /// Secret used to verify inbound request signatures
    pub signing_secret: String,
    /// Base URL of the Web API, without a trailing slash
    pub api_base_url: String,
}

#[derive(Debug, Serialize)]
struct PostMessageRequest<'a> {
    channel: &'a str,
    text: &'a str,
    thread_ts: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    error: Option<String>,
}

/// Minimal Slack Web API client that posts threaded replies
#[derive(Debug, Clone)]
pub struct SlackClient {
    http: reqwest::Client,
    bot_token: String,
    post_message_url: String,
}

impl SlackClient {
    /// Creates a client from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built
    pub fn new(config: &SlackConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build Slack HTTP client")?;

        Ok(Self {
            http,
            bot_token: config.bot_token.clone(),
            post_message_url: format!("{}/chat.postMessage", config.api_base_url),
        })
    }
}

#[async_trait]
impl ResponsePoster for SlackClient {
    #[instrument(skip(self, text), fields(text_len = text.len()))]
    async fn post_message(&self, channel: &str, text: &str, thread_ts: &str) -> anyhow::Result<()> {
        let response = self
            .http
            .post(&self.post_message_url)
            .bearer_auth(&self.bot_token)
            .json(&PostMessageRequest {
                channel,
                text,
                thread_ts,
            })
            .send()
            .await
            .context("chat.postMessage request failed")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("chat.postMessage returned HTTP {status}");
        }

        let body: ApiResponse = response
            .json()
            .await
            .context("chat.postMessage returned an unreadable body")?;

        if !body.ok {
            anyhow::bail!(
                "chat.postMessage failed: {}",
                body.error.as_deref().unwrap_or("unknown_error")
            );
        }

        debug!("Posted message to Slack");
        Ok(())
    }
}
