//! Signal aggregation for one trading week.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::data::{PairDetail, SnapshotRow};
use crate::domain::{AssetClass, Direction, ModelId, SymbolKey};

/// Reasons attached to derived composite details.
pub const DERIVED_V2_REASONS: [&str; 2] =
    ["Dealer COT bias aligned", "Sentiment bias aligned (derived)"];

/// One model's opinion on one symbol for one week. Never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasketSignal {
    pub asset_class: AssetClass,
    pub symbol: String,
    pub model: ModelId,
    pub direction: Direction,
    pub report_date: Option<NaiveDate>,
}

impl BasketSignal {
    pub fn key(&self) -> SymbolKey {
        SymbolKey::new(self.asset_class, &self.symbol)
    }
}

/// Synthesize `antikythera_v2` rows where the store has none.
///
/// Per asset class with both a dealer and a sentiment row, keep the sentiment
/// details whose pair and direction the dealer row repeats. Existing v2 rows
/// are never overwritten. Returns only the derived rows.
pub fn derive_antikythera_v2(rows: &[SnapshotRow]) -> Vec<SnapshotRow> {
    let mut derived = Vec::new();
    for asset_class in AssetClass::ALL {
        let find = |model: ModelId| {
            rows.iter()
                .find(|r| r.asset_class == asset_class && r.model == model)
        };
        if find(ModelId::AntikytheraV2).is_some() {
            continue;
        }
        let (Some(dealer), Some(sentiment)) = (find(ModelId::Dealer), find(ModelId::Sentiment))
        else {
            continue;
        };

        let dealer_calls: BTreeSet<(&str, Direction)> = dealer
            .pair_details
            .iter()
            .map(|d| (d.pair.as_str(), d.direction))
            .collect();
        let details = sentiment
            .pair_details
            .iter()
            .filter(|d| d.direction.is_directional())
            .filter(|d| dealer_calls.contains(&(d.pair.as_str(), d.direction)))
            .map(|d| PairDetail {
                pair: d.pair.clone(),
                direction: d.direction,
                percent: None,
                reason: DERIVED_V2_REASONS.iter().map(|s| s.to_string()).collect(),
            })
            .collect();

        derived.push(SnapshotRow {
            week_open_utc: sentiment.week_open_utc,
            asset_class,
            model: ModelId::AntikytheraV2,
            report_date: sentiment.report_date.or(dealer.report_date),
            pair_details: details,
        });
    }
    derived
}

/// Flatten a week's rows into basket signals.
///
/// - Only `models` contribute. `antikythera_v2` is derived when requested and absent.
/// - Each model contributes at most one signal per symbol (first detail wins).
/// - Every `(model, symbol)` in `models × universe` without a signal gets a
///   NEUTRAL placeholder, so coverage stays explicit downstream.
///
/// Output is sorted by asset class, symbol, then model.
pub fn aggregate_signals(
    rows: &[SnapshotRow],
    models: &[ModelId],
    universe: &[SymbolKey],
) -> Vec<BasketSignal> {
    let derived = if models.contains(&ModelId::AntikytheraV2) {
        derive_antikythera_v2(rows)
    } else {
        Vec::new()
    };

    let mut by_key: BTreeMap<(SymbolKey, ModelId), BasketSignal> = BTreeMap::new();
    for row in rows.iter().chain(derived.iter()) {
        if !models.contains(&row.model) {
            continue;
        }
        for detail in &row.pair_details {
            let key = SymbolKey::new(row.asset_class, &detail.pair);
            by_key
                .entry((key.clone(), row.model))
                .or_insert_with(|| BasketSignal {
                    asset_class: key.asset_class,
                    symbol: key.symbol,
                    model: row.model,
                    direction: detail.direction,
                    report_date: row.report_date,
                });
        }
    }

    for sym in universe {
        for &model in models {
            by_key
                .entry((sym.clone(), model))
                .or_insert_with(|| BasketSignal {
                    asset_class: sym.asset_class,
                    symbol: sym.symbol.clone(),
                    model,
                    direction: Direction::Neutral,
                    report_date: None,
                });
        }
    }

    by_key.into_values().collect()
}
