use axum::http::HeaderMap;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::errors::HookError;

/// Header value as trimmed text; `None` when absent, empty, or not UTF-8.
pub fn get_header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Parse a raw body as JSON, rejecting empty input.
pub fn parse_json_body(body: &[u8]) -> Result<Value, HookError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(HookError::Parse("empty body".to_string()));
    }
    serde_json::from_slice(body).map_err(|e| HookError::Parse(format!("Invalid JSON payload: {e}")))
}

/// Decode an already-parsed JSON value into a typed payload.
pub fn decode_payload<T: DeserializeOwned>(value: Value) -> Result<T, HookError> {
    serde_json::from_value(value)
        .map_err(|e| HookError::Parse(format!("Unexpected payload shape: {e}")))
}
