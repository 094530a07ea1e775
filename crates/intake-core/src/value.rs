//! Coercions over loosely-typed answer values
//!
//! Answers are stored as raw JSON: a value may be a string, number,
//! boolean, array, or an object wrapping the real value under a
//! `value` or `text` key (older client payloads did this). Every
//! consumer goes through one of the explicit coercions here instead of
//! unwrapping ad hoc.

use serde_json::Value;

/// Unwrap one level of `{"value": x}` / `{"text": x}` wrapper objects,
/// recursing through arrays. Anything else passes through unchanged.
pub fn to_primitive(v: &Value) -> Value {
    match v {
        Value::Array(items) => Value::Array(items.iter().map(to_primitive).collect()),
        Value::Object(map) => {
            if let Some(inner) = map.get("value") {
                to_primitive(inner)
            } else if let Some(inner) = map.get("text") {
                to_primitive(inner)
            } else {
                v.clone()
            }
        }
        _ => v.clone(),
    }
}

/// Render an answer for a PDF text widget.
///
/// Null becomes empty, booleans become "Yes"/"No", numbers render as
/// decimal strings (integral values without a trailing `.0`), and
/// anything still non-primitive after unwrapping is JSON-serialized.
pub fn to_display_string(v: &Value) -> String {
    let p = to_primitive(v);
    match &p {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => {
            if *b {
                "Yes".to_string()
            } else {
                "No".to_string()
            }
        }
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else {
                n.to_string()
            }
        }
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

/// Coerce an answer to a number for the calculation engine.
///
/// Null, empty strings, and unparseable values are 0 rather than an
/// error: a half-filled form must still calculate. Currency strings
/// are stripped of everything outside `0-9.-` before parsing, and
/// arrays sum element-wise.
pub fn to_number(v: &Value) -> f64 {
    let p = to_primitive(v);
    match &p {
        Value::Null => 0.0,
        Value::Number(n) => {
            let f = n.as_f64().unwrap_or(0.0);
            if f.is_finite() {
                f
            } else {
                0.0
            }
        }
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Value::String(s) => parse_numeric_string(s),
        Value::Array(items) => items.iter().map(to_number).sum(),
        Value::Object(_) => 0.0,
    }
}

fn parse_numeric_string(s: &str) -> f64 {
    let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    if cleaned.is_empty() {
        return 0.0;
    }
    match cleaned.parse::<f64>() {
        Ok(n) if n.is_finite() => n,
        _ => 0.0,
    }
}

/// Whether a value counts as "answered" for progress / required-field
/// checks. Null, blank strings, and empty arrays do not.
pub fn is_answered(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        _ => true,
    }
}
