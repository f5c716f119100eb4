use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors produced while building, encoding or decoding an [`Envelope`]
#[derive(Error, Debug)]
pub enum EnvelopeError {
    /// The payload is not a JSON object
    #[error("Malformed envelope: {0}")]
    Malformed(String),

    /// A required field is absent, null, not a string, or empty
    #[error("Envelope field '{0}' is missing or empty")]
    MissingField(&'static str),

    /// Serialization failed
    #[error("Failed to encode envelope: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A unit of work traveling through the queue
///
/// Fields are private so an envelope cannot change after it has been built or
/// decoded; every required field is guaranteed non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Envelope {
    prompt: String,
    user: String,
    channel: String,
    thread_ts: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    message_ts: Option<String>,
}

/// Wire shape accepted by [`Envelope::decode`]
///
/// Non-string values read as absent so they surface as `MissingField`.
#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(default, deserialize_with = "string_or_absent")]
    prompt: Option<String>,
    #[serde(default, deserialize_with = "string_or_absent")]
    user: Option<String>,
    #[serde(default, deserialize_with = "string_or_absent")]
    channel: Option<String>,
    #[serde(default, deserialize_with = "string_or_absent")]
    thread_ts: Option<String>,
    #[serde(default, deserialize_with = "string_or_absent")]
    message_ts: Option<String>,
}

fn string_or_absent<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

impl Envelope {
    /// Builds an envelope, rejecting empty fields
    ///
    /// # Errors
    /// Returns [`EnvelopeError::MissingField`] naming the first empty field
    pub fn new(
        prompt: impl Into<String>,
        user: impl Into<String>,
        channel: impl Into<String>,
        thread_ts: impl Into<String>,
    ) -> Result<Self, EnvelopeError> {
        let envelope = Self {
            prompt: prompt.into(),
            user: user.into(),
            channel: channel.into(),
            thread_ts: thread_ts.into(),
            message_ts: None,
        };

        for (name, value) in envelope.fields() {
            if value.is_empty() {
                return Err(EnvelopeError::MissingField(name));
            }
        }

        Ok(envelope)
    }

    /// Attaches the timestamp of the chat message that produced this envelope
    ///
    /// An empty timestamp leaves the envelope without one.
    #[must_use]
    pub fn with_message_ts(mut self, message_ts: impl Into<String>) -> Self {
        let message_ts = message_ts.into();
        self.message_ts = (!message_ts.is_empty()).then_some(message_ts);
        self
    }

    /// Serializes the envelope as a JSON object
    ///
    /// # Errors
    /// Returns [`EnvelopeError::Encode`] if serialization fails
    pub fn encode(&self) -> Result<Vec<u8>, EnvelopeError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parses an envelope from a queue message body
    ///
    /// Unknown fields are ignored.
    ///
    /// # Errors
    /// Returns [`EnvelopeError::Malformed`] if the body is not a JSON object and
    /// [`EnvelopeError::MissingField`] if a required field is unusable
    pub fn decode(body: &[u8]) -> Result<Self, EnvelopeError> {
        let value: Value =
            serde_json::from_slice(body).map_err(|e| EnvelopeError::Malformed(e.to_string()))?;

        // Structs also deserialize from arrays, only objects are envelopes
        if !value.is_object() {
            return Err(EnvelopeError::Malformed(format!(
                "expected a JSON object, got {}",
                json_kind(&value)
            )));
        }

        let raw: RawEnvelope =
            serde_json::from_value(value).map_err(|e| EnvelopeError::Malformed(e.to_string()))?;

        let envelope = Self::new(
            raw.prompt.unwrap_or_default(),
            raw.user.unwrap_or_default(),
            raw.channel.unwrap_or_default(),
            raw.thread_ts.unwrap_or_default(),
        )?;

        Ok(envelope.with_message_ts(raw.message_ts.unwrap_or_default()))
    }

    /// The user's request text
    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Identifier of the requesting user
    #[must_use]
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Destination channel for the response
    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Thread the response must be posted into
    #[must_use]
    pub fn thread_ts(&self) -> &str {
        &self.thread_ts
    }

    /// Timestamp of the originating chat message, when known
    #[must_use]
    pub fn message_ts(&self) -> Option<&str> {
        self.message_ts.as_deref()
    }

    fn fields(&self) -> [(&'static str, &str); 4] {
        [
            ("prompt", &self.prompt),
            ("user", &self.user),
            ("channel", &self.channel),
            ("thread_ts", &self.thread_ts),
        ]
    }
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
