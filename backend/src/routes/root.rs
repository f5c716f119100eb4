use std::collections::BTreeMap;

use axum::{body::Bytes, http::HeaderMap, Json};
use serde_json::{json, Value};

/// Service banner
pub async fn handler() -> Json<Value> {
    Json(json!({ "message": "Slack relay is running" }))
}

/// Echoes the request back for debugging webhook deliveries
///
/// `data` is the body parsed as JSON, or null when it is not JSON.
pub async fn echo(headers: HeaderMap, body: Bytes) -> Json<Value> {
    let raw_body = String::from_utf8_lossy(&body).into_owned();
    let data = serde_json::from_slice::<Value>(&body).unwrap_or(Value::Null);
    let headers: BTreeMap<&str, String> = headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();

    Json(json!({
        "data": data,
        "raw_body": raw_body,
        "headers": headers,
    }))
}
