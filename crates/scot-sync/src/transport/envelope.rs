//! Response Envelope
//!
//! Every backend answer is `{ok, error?, ...data}`.

use serde_json::Value;

use super::client::HttpResponse;
use crate::error::{SyncError, SyncResult};

const GENERIC_FAILURE: &str = "Request failed";

/// Loose truthiness, matching how the backend's own clients read `ok`
pub fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn error_text(v: &Value) -> Option<String> {
    match v.get("error")? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Null | Value::String(_) | Value::Bool(false) => None,
        other => Some(other.to_string()),
    }
}

/// Accept a parsed body only when it is an object with a truthy `ok`
pub fn parse_envelope(value: Value) -> SyncResult<Value> {
    let ok = value.is_object() && value.get("ok").is_some_and(is_truthy);
    if ok {
        Ok(value)
    } else {
        Err(SyncError::api(error_text(&value).unwrap_or_else(|| GENERIC_FAILURE.to_string())))
    }
}

/// Classify a readable response: non-2xx is a network failure (carrying the
/// envelope's message when one is readable), an unreadable 2xx body is an API
/// failure, everything else goes through `parse_envelope`.
pub fn read_response(resp: HttpResponse) -> SyncResult<Value> {
    let parsed: Option<Value> = serde_json::from_str(&resp.body).ok();
    if !resp.is_success() {
        let message = parsed
            .as_ref()
            .and_then(error_text)
            .unwrap_or_else(|| format!("HTTP {}", resp.status));
        return Err(SyncError::Network(message));
    }
    match parsed {
        Some(value) => parse_envelope(value),
        None => Err(SyncError::api(GENERIC_FAILURE)),
    }
}
