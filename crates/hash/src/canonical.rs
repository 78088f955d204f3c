//! Canonical serialization.
//!
//! Two records that are structurally equal must hash identically no matter
//! what order their keys were inserted in, so the digest is computed over a
//! canonical byte form: object keys sorted lexicographically at every
//! nesting depth, compact separators, no trailing whitespace.

use serde_json::Value;

/// Serialize `value` into its canonical UTF-8 byte form.
///
/// Object keys are emitted in lexicographic order at every depth; arrays
/// keep their element order (element order is data, key order is not).
pub fn to_bytes(value: &Value) -> Vec<u8> {
    let mut out = String::new();
    write_value(&mut out, value);
    out.into_bytes()
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        // serde_json's Display for numbers is already minimal and stable.
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => write_string(out, s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(']');
        },
        Value::Object(map) => {
            // Don't rely on the map's internal ordering; sort explicitly so
            // canonical form holds even if `preserve_order` is enabled by a
            // downstream dependency.
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_unstable();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(out, key);
                out.push(':');
                write_value(out, &map[key]);
            }
            out.push('}');
        },
    }
}

fn write_string(out: &mut String, s: &str) {
    // Reuse serde_json's escaping rather than reimplementing it; a String
    // value can always be serialized.
    out.push_str(&serde_json::to_string(s).expect("string serialization is infallible"));
}
