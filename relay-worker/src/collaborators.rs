use async_trait::async_trait;

/// Produces the text posted back for a prompt
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    /// Generates a response for `prompt`
    ///
    /// # Errors
    /// Returns an error if no response could be produced; the message is redelivered
    async fn generate(&self, prompt: &str) -> anyhow::Result<String>;
}

/// Delivers text into a conversation thread
#[async_trait]
pub trait ResponsePoster: Send + Sync {
    /// Posts `text` into the thread `thread_ts` of `channel`
    ///
    /// # Errors
    /// Returns an error if the chat platform rejects the post
    async fn post_message(&self, channel: &str, text: &str, thread_ts: &str) -> anyhow::Result<()>;
}

/// Placeholder generator that echoes the prompt back
#[derive(Debug, Clone, Copy, Default)]
pub struct CodeRecommendation;

#[async_trait]
impl ResponseGenerator for CodeRecommendation {
    async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
        Ok(format!("Here's a code recommendation for your prompt: {prompt}"))
    }
}
