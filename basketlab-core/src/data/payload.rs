//! Defensive decoding of loosely-typed JSON payloads.
//!
//! Snapshot rows carry `pair_details` as a JSON array, a JSON-encoded string
//! holding an array, or null. Lot maps arrive in the same shapes. Both go
//! through [`json_array`] so there is exactly one place that handles the
//! three-way shape check.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::keys::normalize_symbol;
use crate::domain::Direction;

/// One symbol opinion inside a snapshot row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairDetail {
    pub pair: String,
    pub direction: Direction,
    /// Realized move for the week, when the snapshot was priced.
    pub percent: Option<f64>,
    #[serde(default)]
    pub reason: Vec<String>,
}

/// Decode a value that should be a JSON array.
///
/// Array → its elements; string → parsed, elements if it holds an array;
/// anything else (null, object, number, invalid JSON) → empty.
pub fn json_array(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.clone(),
        Value::String(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

/// Parse `pair_details` into typed details. Elements without a pair are dropped.
pub fn parse_pair_details(value: &Value) -> Vec<PairDetail> {
    json_array(value).iter().filter_map(parse_detail).collect()
}

fn parse_detail(item: &Value) -> Option<PairDetail> {
    let obj = item.as_object()?;
    let pair = obj.get("pair").and_then(Value::as_str).map(normalize_symbol)?;
    if pair.is_empty() {
        return None;
    }
    let direction = obj
        .get("direction")
        .and_then(Value::as_str)
        .map(Direction::parse_lenient)
        .unwrap_or(Direction::Neutral);
    let percent = obj.get("percent").and_then(number_like);
    let reason = match obj.get("reason") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Some(Value::String(s)) if !s.is_empty() => vec![s.clone()],
        _ => Vec::new(),
    };
    Some(PairDetail { pair, direction, percent, reason })
}

/// Numbers sometimes arrive as strings ("1.25"). Non-finite values are rejected.
pub(crate) fn number_like(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}
