//! Conversions between SQLite cell values and JSON.
//!
//! The registry accepts user records as JSON objects and reports user
//! attributes as JSON, so both directions live here.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use rusqlite::types::Value;

use crate::error::{StoreError, StoreResult};

/// Convert a JSON scalar into a SQLite value.
///
/// Booleans become `0`/`1`, integral numbers become `Integer`, every other
/// number becomes `Real`. Arrays and objects have no column representation
/// and are rejected.
pub fn json_to_value(field: &str, json: &serde_json::Value) -> StoreResult<Value> {
    use serde_json::Value as Json;

    match json {
        Json::Null => Ok(Value::Null),
        Json::Bool(b) => Ok(Value::Integer(i64::from(*b))),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Ok(Value::Integer(i)),
            None => n.as_f64().map(Value::Real).ok_or_else(|| {
                StoreError::InvalidArgument(format!("field {field}: number out of range: {n}"))
            }),
        },
        Json::String(s) => Ok(Value::Text(s.clone())),
        Json::Array(_) | Json::Object(_) => Err(StoreError::InvalidArgument(format!(
            "field {field}: nested JSON values cannot be stored"
        ))),
    }
}

/// Convert a SQLite value into JSON. Blobs are base64-encoded strings.
pub fn value_to_json(value: &Value) -> serde_json::Value {
    use serde_json::Value as Json;

    match value {
        Value::Null => Json::Null,
        Value::Integer(i) => Json::from(*i),
        // NaN and infinities have no JSON form.
        Value::Real(f) => serde_json::Number::from_f64(*f)
            .map(Json::Number)
            .unwrap_or(Json::Null),
        Value::Text(s) => Json::String(s.clone()),
        Value::Blob(b) => Json::String(BASE64.encode(b)),
    }
}

/// Render a value for plain-text output.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Real(f) => f.to_string(),
        Value::Text(s) => s.clone(),
        Value::Blob(b) => format!("<blob {} bytes>", b.len()),
    }
}

// ── tests ────────────────────────────────────────────────────────────
