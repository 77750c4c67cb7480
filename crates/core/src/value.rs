//! Helpers for the loosely typed values that flow in from upstream.

use serde_json::Value;

/// Truthiness of a config or signal value.
///
/// `false`, `0`, `null`, empty strings and empty collections are falsy;
/// everything else is truthy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Format a signal value for display.
///
/// Floating-point numbers become strings with 8 decimal places; every
/// other value passes through unchanged.
pub fn format_signal(value: &Value) -> Value {
    match value {
        Value::Number(n) if n.is_f64() => match n.as_f64() {
            Some(f) => Value::String(format!("{f:.8}")),
            None => value.clone(),
        },
        other => other.clone(),
    }
}

/// Plain-text rendering of a scalar, without JSON quoting.
pub fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
