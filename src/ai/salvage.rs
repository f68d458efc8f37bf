// src/ai/salvage.rs

//! Fallback decoder for provider errors that still carry the model's output.
//!
//! When strict structured output fails validation on the provider side, some providers reply
//! with an error envelope like
//! `{"error":{"message":"...","failed_generation":"{\"title\":...}"}}`.
//! The escaped text is often a perfectly usable result. This stage finds it, unescapes it and
//! parses it. It is only tried after the primary parse path has nothing to work with.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

static FAILED_GENERATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""failed_generation"\s*:\s*"((?:[^"\\]|\\.)*)""#)
        .expect("failed_generation pattern is valid")
});

/// Extracts and decodes the `failed_generation` payload from a provider error body.
///
/// A well-formed envelope is read as JSON, whatever the key order. Bodies that are not valid
/// JSON fall back to locating the string literal textually.
///
/// Returns the decoded JSON value with a single-element array or a tool-call wrapper removed,
/// or `None` when the body has no recoverable payload.
pub fn salvage_failed_generation(error_body: &str) -> Option<Value> {
    let parsed = from_envelope(error_body).or_else(|| from_raw_text(error_body))?;
    Some(unwrap_payload(parsed))
}

/// Reads `error.failed_generation` from a body that parses as JSON.
fn from_envelope(error_body: &str) -> Option<Value> {
    let body: Value = serde_json::from_str(error_body).ok()?;
    let text = body
        .get("error")
        .and_then(|e| e.get("failed_generation"))
        .or_else(|| body.get("failed_generation"))?
        .as_str()?;

    serde_json::from_str::<Value>(text)
        .ok()
        .or_else(|| serde_json::from_str::<Value>(&text.replace('\n', "")).ok())
}

/// Locates the escaped string literal in a body that is not valid JSON.
fn from_raw_text(error_body: &str) -> Option<Value> {
    let escaped = FAILED_GENERATION.captures(error_body)?.get(1)?.as_str();

    decode_json_string(escaped)
        .and_then(|text| serde_json::from_str::<Value>(&text).ok())
        .or_else(|| serde_json::from_str::<Value>(&unescape_loosely(escaped)).ok())
}

/// Decodes the fragment as the body of a JSON string literal.
fn decode_json_string(escaped: &str) -> Option<String> {
    serde_json::from_str::<String>(&format!("\"{}\"", escaped)).ok()
}

/// Drops `\n` escapes and unescapes `\"`, for fragments that are not a well-formed string body.
fn unescape_loosely(escaped: &str) -> String {
    escaped.replace("\\n", "").replace("\\\"", "\"")
}

/// Unwraps `[x]` into `x`, then a `{"name": .., "parameters"|"arguments": x}` tool call into `x`.
pub fn unwrap_payload(value: Value) -> Value {
    let value = match value {
        Value::Array(mut items) if items.len() == 1 => items.remove(0),
        other => other,
    };

    match value {
        Value::Object(mut map) if !map.contains_key("questions") => {
            let inner = map
                .remove("parameters")
                .or_else(|| map.remove("arguments"))
                .map(|inner| match inner {
                    // Some providers double-encode tool arguments.
                    Value::String(raw) => serde_json::from_str(&raw).unwrap_or(Value::String(raw)),
                    other => other,
                });
            match inner {
                Some(inner @ Value::Object(_)) => inner,
                Some(other) => {
                    map.insert("parameters".to_string(), other);
                    Value::Object(map)
                }
                None => Value::Object(map),
            }
        }
        other => other,
    }
}
