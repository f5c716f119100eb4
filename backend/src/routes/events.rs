use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    body::Bytes,
    http::HeaderMap,
    response::{IntoResponse, Response},
    Extension, Json,
};
use relay_worker::ResponsePoster;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::publisher::Publisher;
use crate::slack::{self, SignatureError, SlackConfig};
use crate::types::{AppError, InboundEvent};

const SIGNATURE_HEADER: &str = "x-slack-signature";
const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";

/// Posted into the thread when an event could not be queued
pub const QUEUE_FAILURE_REPLY: &str =
    "Sorry, I couldn't queue your request right now. Please try again in a moment.";

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Payload {
    UrlVerification { challenge: String },
    EventCallback { event: SlackEvent },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct SlackEvent {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
    user: Option<String>,
    channel: Option<String>,
    ts: Option<String>,
    thread_ts: Option<String>,
    bot_id: Option<String>,
    subtype: Option<String>,
}

impl SlackEvent {
    /// Mentions and plain user messages are relayed; bot posts and edits are not
    fn is_relayable(&self) -> bool {
        matches!(self.kind.as_str(), "app_mention" | "message")
            && self.bot_id.is_none()
            && self.subtype.is_none()
    }

    fn into_inbound(self) -> InboundEvent {
        InboundEvent {
            text: strip_mentions(self.text.as_deref().unwrap_or_default()),
            user: self.user.unwrap_or_default(),
            channel: self.channel.unwrap_or_default(),
            // Replies go to the existing thread, or start one under the message
            ts: self
                .thread_ts
                .or_else(|| self.ts.clone())
                .unwrap_or_default(),
            message_ts: self.ts,
        }
    }
}

/// Removes `<@U123>` user mentions and surrounding whitespace
fn strip_mentions(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find("<@") {
        out.push_str(&rest[..start]);
        match rest[start..].find('>') {
            Some(end) => rest = &rest[start + end + 1..],
            None => {
                rest = &rest[start..];
                break;
            }
        }
    }
    out.push_str(rest);

    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn header<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<&'a str, SignatureError> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .ok_or(SignatureError::MissingHeader(name))
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs())
}

/// Slack Events API endpoint
///
/// Verifies the request signature, answers the URL verification handshake and
/// queues mentions for the relay worker. Verified requests always get a 200 so
/// Slack does not retry them.
///
/// # Errors
///
/// Returns 401 for an invalid signature and 400 for an unparseable payload
pub async fn handler(
    Extension(slack_config): Extension<Arc<SlackConfig>>,
    Extension(publisher): Extension<Arc<Publisher>>,
    Extension(poster): Extension<Arc<dyn ResponsePoster>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    slack::verify(
        &slack_config.signing_secret,
        header(&headers, TIMESTAMP_HEADER)?,
        &body,
        header(&headers, SIGNATURE_HEADER)?,
        unix_now(),
    )?;

    let event = match serde_json::from_slice::<Payload>(&body)? {
        Payload::UrlVerification { challenge } => {
            info!("Answering URL verification challenge");
            return Ok(Json(json!({ "challenge": challenge })).into_response());
        }
        Payload::EventCallback { event } if event.is_relayable() => event.into_inbound(),
        Payload::EventCallback { event } => {
            debug!(kind = %event.kind, subtype = ?event.subtype, "Ignoring event");
            return Ok(().into_response());
        }
        Payload::Other => {
            debug!("Ignoring unsupported payload type");
            return Ok(().into_response());
        }
    };

    if !publisher.publish_message(&event).await {
        apologize(poster.as_ref(), &event).await;
    }

    Ok(().into_response())
}

async fn apologize(poster: &dyn ResponsePoster, event: &InboundEvent) {
    if event.channel.is_empty() || event.ts.is_empty() {
        warn!("Cannot notify user about queue failure, event has no thread");
        return;
    }

    if let Err(e) = poster
        .post_message(&event.channel, QUEUE_FAILURE_REPLY, &event.ts)
        .await
    {
        error!(
            channel = %event.channel,
            thread_ts = %event.ts,
            error = %format!("{e:#}"),
            "Failed to post queue failure reply"
        );
    }
}
