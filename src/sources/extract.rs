//! Tolerant field extraction for exchange API payloads.
//!
//! Exchange endpoints disagree on field names and on whether numbers
//! arrive as strings. These helpers try a list of candidate fields and
//! accept either representation.

use serde_json::Value;

/// Numeric field value, accepting JSON numbers and numeric strings.
pub fn field_f64(row: &Value, field: &str) -> Option<f64> {
    match row.get(field)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// First candidate field holding a positive amount.
///
/// Zero is treated as absent so that a fallback field can still supply
/// the real value, e.g. Binance staking rows that carry `amount: "0"`
/// next to a populated `totalAmount`.
pub fn pluck_f64(row: &Value, fields: &[&str]) -> Option<f64> {
    fields
        .iter()
        .filter_map(|f| field_f64(row, f))
        .find(|v| *v > 0.0)
}

/// First candidate field holding a non-empty string.
pub fn pluck_str<'a>(row: &'a Value, fields: &[&str]) -> Option<&'a str> {
    fields
        .iter()
        .filter_map(|f| row.get(f).and_then(Value::as_str))
        .find(|s| !s.is_empty())
}

/// Extract the row array from a response body.
///
/// Endpoints wrap their rows inconsistently: a bare array, `{rows: []}`,
/// `{data: []}`, or a single object standing in for a one-row list.
pub fn pluck_rows(body: &Value) -> Vec<Value> {
    if let Some(rows) = body.as_array() {
        return rows.clone();
    }
    for key in ["rows", "data"] {
        if let Some(rows) = body.get(key).and_then(Value::as_array) {
            return rows.clone();
        }
    }
    if body.is_object() {
        return vec![body.clone()];
    }
    Vec::new()
}
