use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

const VERSION: &str = "v0";

/// Requests older or newer than this are rejected as replays
pub const MAX_CLOCK_SKEW_SECS: u64 = 5 * 60;

/// Why a request signature was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignatureError {
    /// A signing header is absent
    #[error("missing header {0}")]
    MissingHeader(&'static str),

    /// The timestamp header is not a Unix timestamp
    #[error("invalid timestamp")]
    InvalidTimestamp,

    /// The timestamp is too far from the current time
    #[error("timestamp outside the allowed window")]
    StaleTimestamp,

    /// The signature does not match the body
    #[error("signature mismatch")]
    Mismatch,
}

fn mac(secret: &str, timestamp: &str, body: &[u8]) -> HmacSha256 {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .unwrap_or_else(|_| unreachable!("HMAC accepts keys of any length"));
    mac.update(VERSION.as_bytes());
    mac.update(b":");
    mac.update(timestamp.as_bytes());
    mac.update(b":");
    mac.update(body);
    mac
}

/// Computes the `X-Slack-Signature` value for a request
#[must_use]
pub fn sign(secret: &str, timestamp: &str, body: &[u8]) -> String {
    format!(
        "{VERSION}={}",
        hex::encode(mac(secret, timestamp, body).finalize().into_bytes())
    )
}

/// Verifies a Slack request signature
///
/// `now_secs` is the current Unix time.
///
/// # Errors
///
/// Returns a [`SignatureError`] describing why the request is not authentic
pub fn verify(
    secret: &str,
    timestamp: &str,
    body: &[u8],
    signature: &str,
    now_secs: u64,
) -> Result<(), SignatureError> {
    let sent_at: u64 = timestamp
        .trim()
        .parse()
        .map_err(|_| SignatureError::InvalidTimestamp)?;

    if now_secs.abs_diff(sent_at) > MAX_CLOCK_SKEW_SECS {
        return Err(SignatureError::StaleTimestamp);
    }

    let digest = signature
        .strip_prefix("v0=")
        .and_then(|hex_digest| hex::decode(hex_digest).ok())
        .ok_or(SignatureError::Mismatch)?;

    mac(secret, timestamp, body)
        .verify_slice(&digest)
        .map_err(|_| SignatureError::Mismatch)
}
