use std::time::Duration;

use reqwest::RequestBuilder;
use serde_json::Value;
use tracing::debug;

use crate::error::PlatformError;

/// Applied to every platform call. There are no retries.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub fn build_http() -> Result<reqwest::Client, PlatformError> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(PlatformError::Transport)
}

/// Sends the request and decodes the JSON body. An empty 2xx body decodes
/// to `Value::Null`.
pub(crate) async fn execute(request: RequestBuilder) -> Result<Value, PlatformError> {
    let response = request.send().await?;
    let status = response.status();
    let body = response.text().await?;
    debug!(status = %status, bytes = body.len(), "platform response");

    if !status.is_success() {
        return Err(PlatformError::Api {
            status: status.as_u16(),
            message: error_message(&body)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string()),
        });
    }

    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&body).map_err(|e| PlatformError::Decode(e.to_string()))
}

/// The platform's own `message` field, else the raw body.
fn error_message(body: &str) -> Option<String> {
    let from_json = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string));
    from_json.or_else(|| {
        let trimmed = body.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

/// The array under `key`, or nothing when the field is absent or not an array.
pub(crate) fn records(body: &Value, key: &str) -> Vec<Value> {
    body.get(key)
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}
