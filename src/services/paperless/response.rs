//! Response normalization
//!
//! Turns a status code and raw body into either a payload or an [`ApiError`].
//! Payloads are always a JSON object or array so callers can index into them
//! without first checking the shape.

use reqwest::StatusCode;
use serde_json::{json, Map, Value};

use crate::error::ApiError;

/// Normalize a complete response
pub fn normalize(status: StatusCode, body: &[u8]) -> Result<Value, ApiError> {
    if status.is_success() {
        Ok(success_payload(body))
    } else {
        Err(failure(status, body))
    }
}

/// Payload of a successful response.
///
/// Objects and arrays pass through. A bare JSON string (the upload endpoint
/// returns the task id this way) becomes `{"id": s}`. Anything else, including
/// an empty or non-JSON body, becomes `{}`.
pub fn success_payload(body: &[u8]) -> Value {
    match serde_json::from_slice::<Value>(body) {
        Ok(value @ (Value::Object(_) | Value::Array(_))) => value,
        Ok(Value::String(s)) => json!({ "id": s }),
        _ => Value::Object(Map::new()),
    }
}

/// Build the error for a failure status.
///
/// The message starts with `Paperless API Error: <status>` and collects every
/// human-readable detail the server sent.
pub fn failure(status: StatusCode, body: &[u8]) -> ApiError {
    let mut message = format!("Paperless API Error: {}", status.as_u16());

    let response = match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => {
            append_details(&mut message, &map);
            map
        }
        Ok(other) => {
            if let Some(text) = other.as_str().filter(|s| !s.trim().is_empty()) {
                message.push_str(" - ");
                message.push_str(text.trim());
            }
            wrap_raw(other)
        }
        Err(_) => {
            let text = String::from_utf8_lossy(body);
            let text = text.trim();
            if !text.is_empty() {
                message.push_str(" - ");
                message.push_str(text);
            }
            if text.is_empty() {
                Map::new()
            } else {
                wrap_raw(Value::String(text.to_string()))
            }
        }
    };

    ApiError::new(message, status.as_u16(), response)
}

fn wrap_raw(value: Value) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("raw".to_string(), value);
    map
}

fn append_details(message: &mut String, body: &Map<String, Value>) {
    const SCALAR_KEYS: [&str; 3] = ["detail", "message", "error"];

    for key in SCALAR_KEYS {
        if let Some(text) = body.get(key).and_then(render) {
            message.push_str(" - ");
            message.push_str(&text);
        }
    }

    if let Some(Value::Array(errors)) = body.get("non_field_errors") {
        let joined = join_strings(errors);
        if !joined.is_empty() {
            message.push_str(" - ");
            message.push_str(&joined);
        }
    }

    for (field, value) in body {
        if SCALAR_KEYS.contains(&field.as_str()) || field == "non_field_errors" {
            continue;
        }
        if let Value::Array(errors) = value {
            let joined = join_strings(errors);
            if !joined.is_empty() {
                message.push_str(&format!(" - {}: {}", field, joined));
            }
        }
    }
}

fn render(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => Some(join_strings(items)).filter(|s| !s.is_empty()),
        other => Some(other.to_string()),
    }
}

fn join_strings(items: &[Value]) -> String {
    items
        .iter()
        .filter_map(|item| match item {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse a bare integer body such as the one returned by `next_asn`
pub fn integer_payload(status: StatusCode, body: &[u8]) -> Result<i64, ApiError> {
    if !status.is_success() {
        return Err(failure(status, body));
    }

    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Number(n)) => n.as_i64(),
        Ok(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
    .ok_or_else(|| {
        let raw = String::from_utf8_lossy(body).trim().to_string();
        ApiError::new(
            format!("Paperless API Error: {} - expected an integer response", status.as_u16()),
            status.as_u16(),
            wrap_raw(Value::String(raw)),
        )
    })
}
