//! Per-symbol dollar conversion and margin, with broker alias resolution.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::payload::{json_array, number_like};
use super::provider::DataError;
use super::resolver::{resolve_first, LookupStrategy, Resolution};
use crate::domain::keys::normalize_symbol;

/// Broker naming differences for the same instrument.
const ALIASES: &[(&str, &[&str])] = &[
    ("SPXUSD", &["SPX500", "SPXUSD"]),
    ("NDXUSD", &["NDX100", "NDXUSD"]),
    ("NIKKEIUSD", &["JPN225", "NIKKEIUSD"]),
    ("WTIUSD", &["USOUSD", "WTIUSD"]),
];

/// Sizing facts for one broker symbol at the reference lot size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LotSpec {
    pub symbol: String,
    pub margin_per_leg_usd: f64,
    /// Dollar P&L of a 1% move.
    pub move_1pct_usd: f64,
}

/// Ordered lot-map rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LotMap {
    entries: Vec<LotSpec>,
}

impl LotMap {
    pub fn new(entries: Vec<LotSpec>) -> Self {
        Self { entries }
    }

    /// Decode a stored lot map (array, JSON-encoded array, or nothing).
    ///
    /// Accepts `margin_required` or `margin_per_leg_usd` for margin and
    /// `move_1pct_usd` or `move_1pct_per_lot_usd` for the dollar move. Rows
    /// without a symbol are dropped; missing numbers default to zero.
    pub fn from_json(value: &Value) -> Self {
        let entries = json_array(value)
            .iter()
            .filter_map(|row| {
                let obj = row.as_object()?;
                let symbol = obj.get("symbol").and_then(Value::as_str).map(normalize_symbol)?;
                if symbol.is_empty() {
                    return None;
                }
                let pick = |names: &[&str]| {
                    names
                        .iter()
                        .find_map(|n| obj.get(*n).and_then(number_like))
                        .unwrap_or(0.0)
                };
                Some(LotSpec {
                    symbol,
                    margin_per_leg_usd: pick(&["margin_required", "margin_per_leg_usd"]),
                    move_1pct_usd: pick(&["move_1pct_usd", "move_1pct_per_lot_usd"]),
                })
            })
            .collect();
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Resolve a symbol, reporting which lookup step matched.
    ///
    /// Order: exact (including aliases), prefix (broker suffixes such as
    /// `EURUSD.r`), six-letter FX prefix, then alphanumeric containment.
    pub fn resolve(&self, symbol: &str) -> Option<Resolution<&LotSpec>> {
        let target = normalize_symbol(symbol);
        if target.is_empty() {
            return None;
        }
        let candidates = candidates_for(&target);

        let strategies: Vec<LookupStrategy<'_, str, &LotSpec>> = vec![
            LookupStrategy::new("exact", |_: &str| {
                candidates
                    .iter()
                    .find_map(|c| self.entries.iter().find(|e| &e.symbol == c))
            }),
            LookupStrategy::new("prefix", |_: &str| {
                candidates
                    .iter()
                    .find_map(|c| self.entries.iter().find(|e| e.symbol.starts_with(c.as_str())))
            }),
            LookupStrategy::new("fx_prefix", |t: &str| {
                if t.len() != 6 {
                    return None;
                }
                self.entries.iter().find(|e| e.symbol.starts_with(t))
            }),
            LookupStrategy::new("fuzzy", |_: &str| {
                candidates.iter().find_map(|c| {
                    let stripped = strip_non_alnum(c);
                    if stripped.is_empty() {
                        return None;
                    }
                    self.entries
                        .iter()
                        .find(|e| strip_non_alnum(&e.symbol).contains(&stripped))
                })
            }),
        ];
        resolve_first(&strategies, target.as_str())
    }

    pub fn find(&self, symbol: &str) -> Option<&LotSpec> {
        self.resolve(symbol).map(|r| r.value)
    }

    /// Like [`find`](Self::find) but reports a data gap on a miss.
    pub fn require(&self, symbol: &str) -> Result<&LotSpec, DataError> {
        self.find(symbol).ok_or_else(|| DataError::MissingLotEntry {
            symbol: symbol.to_string(),
        })
    }
}

fn candidates_for(target: &str) -> Vec<String> {
    let mut out = vec![target.to_string()];
    if let Some((_, aliases)) = ALIASES.iter().find(|(k, _)| *k == target) {
        for alias in aliases.iter() {
            if !out.iter().any(|c| c == alias) {
                out.push(alias.to_string());
            }
        }
    }
    out
}

fn strip_non_alnum(s: &str) -> String {
    s.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}
