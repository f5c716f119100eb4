//! Collaborator doubles for tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::collaborators::{ResponseGenerator, ResponsePoster};

/// A post captured by [`RecordingPoster`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    /// Channel posted to
    pub channel: String,
    /// Posted text
    pub text: String,
    /// Thread posted into
    pub thread_ts: String,
}

impl Post {
    /// Builds the post expected in an assertion
    #[must_use]
    pub fn new(channel: &str, text: &str, thread_ts: &str) -> Self {
        Self {
            channel: channel.to_string(),
            text: text.to_string(),
            thread_ts: thread_ts.to_string(),
        }
    }
}

/// Poster that records successful posts, optionally failing the first attempts
#[derive(Debug, Clone, Default)]
pub struct RecordingPoster {
    posts: Arc<Mutex<Vec<Post>>>,
    attempts: Arc<AtomicUsize>,
    failures_left: Arc<AtomicUsize>,
}

impl RecordingPoster {
    /// Poster that always succeeds
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails the first `failures` calls, then succeeds
    #[must_use]
    pub fn failing_first(failures: usize) -> Self {
        let poster = Self::default();
        poster.failures_left.store(failures, Ordering::SeqCst);
        poster
    }

    /// Successful posts so far
    ///
    /// # Panics
    /// Panics if the mutex is poisoned
    #[must_use]
    pub fn posts(&self) -> Vec<Post> {
        self.posts.lock().unwrap().clone()
    }

    /// Calls so far, failed or not
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResponsePoster for RecordingPoster {
    async fn post_message(&self, channel: &str, text: &str, thread_ts: &str) -> anyhow::Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            anyhow::bail!("channel_not_found");
        }

        self.posts
            .lock()
            .unwrap()
            .push(Post::new(channel, text, thread_ts));
        Ok(())
    }
}

/// Generator returning a fixed response
#[derive(Debug, Clone)]
pub struct StubGenerator {
    response: String,
}

impl StubGenerator {
    /// Generator answering every prompt with `response`
    #[must_use]
    pub fn new(response: &str) -> Self {
        Self {
            response: response.to_string(),
        }
    }
}

#[async_trait]
impl ResponseGenerator for StubGenerator {
    async fn generate(&self, _prompt: &str) -> anyhow::Result<String> {
        Ok(self.response.clone())
    }
}

/// Generator that always fails
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingGenerator;

#[async_trait]
impl ResponseGenerator for FailingGenerator {
    async fn generate(&self, _prompt: &str) -> anyhow::Result<String> {
        anyhow::bail!("model unavailable")
    }
}
