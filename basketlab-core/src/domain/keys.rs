//! Structured composite keys.
//!
//! Every map in the engine is keyed by one of these types instead of a
//! formatted string, so two keys are equal exactly when their fields are.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::asset::AssetClass;
use super::model::ModelId;

/// One tradable symbol within an asset class. The symbol is stored upper-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SymbolKey {
    pub asset_class: AssetClass,
    pub symbol: String,
}

impl SymbolKey {
    pub fn new(asset_class: AssetClass, symbol: impl AsRef<str>) -> Self {
        Self {
            asset_class,
            symbol: normalize_symbol(symbol.as_ref()),
        }
    }
}

impl fmt::Display for SymbolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.asset_class, self.symbol)
    }
}

/// Identity of a position.
///
/// `scope` is the owning model in hedged mode and `None` when votes are netted
/// per symbol, so a hedged and a netted position on the same symbol never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PositionKey {
    pub scope: Option<ModelId>,
    pub symbol: SymbolKey,
}

impl PositionKey {
    pub fn netted(symbol: SymbolKey) -> Self {
        Self { scope: None, symbol }
    }

    pub fn scoped(model: ModelId, symbol: SymbolKey) -> Self {
        Self { scope: Some(model), symbol }
    }
}

impl fmt::Display for PositionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.scope {
            Some(model) => write!(f, "{model}/{}", self.symbol),
            None => write!(f, "{}", self.symbol),
        }
    }
}

/// Cache key for one price series request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeriesKey {
    pub week_open_utc: DateTime<Utc>,
    pub symbol: SymbolKey,
    pub report_date: Option<NaiveDate>,
}

/// Upper-case and trim a raw symbol. Broker suffixes are left intact.
pub fn normalize_symbol(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}
