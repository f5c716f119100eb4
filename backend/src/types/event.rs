/// A chat event accepted by the webhook, ready to be queued
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    /// Message text with bot mentions removed
    pub text: String,
    /// Slack user ID of the sender
    pub user: String,
    /// Channel the message was posted in
    pub channel: String,
    /// Timestamp of the thread the reply belongs to
    pub ts: String,
    /// Timestamp of the message itself, distinguishes repeated messages in one thread
    pub message_ts: Option<String>,
}
