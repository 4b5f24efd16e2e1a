// Shared response handling for the HTTP adapters

use eqsans_core::error::{RemoteError, RemoteResult};
use reqwest::{Response, StatusCode};
use serde_json::Value;

pub(crate) fn transport_error(operation: &str, err: reqwest::Error) -> RemoteError {
    if err.is_timeout() {
        RemoteError::Connectivity(format!("{} timed out", operation))
    } else {
        RemoteError::Connectivity(format!("{}: {}", operation, err))
    }
}

/// Classify a non-200 answer. 401/403 mean the session is gone.
pub(crate) fn status_error(operation: &str, status: StatusCode, body: &[u8]) -> RemoteError {
    let reason = serde_json::from_slice::<Value>(body)
        .ok()
        .as_ref()
        .and_then(err_msg);
    let detail = match reason {
        Some(msg) => format!("{} returned HTTP {}: {}", operation, status.as_u16(), msg),
        None => format!("{} returned HTTP {}", operation, status.as_u16()),
    };

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RemoteError::Auth(detail),
        _ => RemoteError::Connectivity(detail),
    }
}

pub(crate) async fn json_body(operation: &str, response: Response) -> RemoteResult<Value> {
    let body = response
        .bytes()
        .await
        .map_err(|e| transport_error(operation, e))?;
    serde_json::from_slice(&body)
        .map_err(|e| RemoteError::Parse(format!("{} answer is not JSON: {}", operation, e)))
}

pub(crate) fn err_msg(value: &Value) -> Option<String> {
    text_field(value, "Err_Msg")
}

pub(crate) fn text_field(value: &Value, field: &str) -> Option<String> {
    value
        .get(field)
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Ids arrive as JSON strings or numbers
pub(crate) fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
