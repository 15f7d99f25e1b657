//! Pair netting: per-symbol signed vote over a model scope.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::aggregate::BasketSignal;
use crate::domain::{AssetClass, Direction, ModelId, Side, SymbolKey};

/// One model's directional vote on a symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leg {
    pub model: ModelId,
    pub direction: Direction,
}

/// Net vote for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedPair {
    pub asset_class: AssetClass,
    pub symbol: String,
    /// Signed sum of votes: +1 per LONG leg, -1 per SHORT leg.
    pub net: i32,
    pub legs: Vec<Leg>,
    /// Report date of the first leg that carried one.
    pub report_date: Option<NaiveDate>,
}

impl PlannedPair {
    pub fn key(&self) -> SymbolKey {
        SymbolKey::new(self.asset_class, &self.symbol)
    }

    /// Tradable side, `None` when fully netted out.
    pub fn side(&self) -> Option<Side> {
        Side::from_net(self.net)
    }
}

/// Grouping policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupOptions {
    /// Exclude pairs whose net vote is exactly zero.
    pub drop_netted: bool,
}

impl Default for GroupOptions {
    fn default() -> Self {
        Self { drop_netted: true }
    }
}

/// Group directional signals from `scope` by `(asset class, symbol)`.
///
/// NEUTRAL signals and models outside `scope` are skipped. Output is sorted by
/// symbol, then asset class.
pub fn group_signals(
    signals: &[BasketSignal],
    scope: &[ModelId],
    options: GroupOptions,
) -> Vec<PlannedPair> {
    let mut grouped: BTreeMap<SymbolKey, PlannedPair> = BTreeMap::new();
    for signal in signals {
        if !scope.contains(&signal.model) || !signal.direction.is_directional() {
            continue;
        }
        let key = signal.key();
        let pair = grouped.entry(key.clone()).or_insert_with(|| PlannedPair {
            asset_class: key.asset_class,
            symbol: key.symbol,
            net: 0,
            legs: Vec::new(),
            report_date: None,
        });
        pair.net += signal.direction.vote();
        pair.report_date = pair.report_date.or(signal.report_date);
        pair.legs.push(Leg {
            model: signal.model,
            direction: signal.direction,
        });
    }

    let mut pairs: Vec<PlannedPair> = grouped
        .into_values()
        .filter(|p| !options.drop_netted || p.net != 0)
        .collect();
    pairs.sort_by(|a, b| {
        a.symbol
            .cmp(&b.symbol)
            .then_with(|| a.asset_class.cmp(&b.asset_class))
    });
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(symbol: &str, model: ModelId, direction: Direction) -> BasketSignal {
        BasketSignal {
            asset_class: AssetClass::Fx,
            symbol: symbol.into(),
            model,
            direction,
            report_date: None,
        }
    }

    #[test]
    fn offsetting_legs_net_to_zero() {
        let signals = vec![
            sig("EURUSD", ModelId::Dealer, Direction::Long),
            sig("EURUSD", ModelId::Sentiment, Direction::Short),
            sig("GBPUSD", ModelId::Dealer, Direction::Short),
        ];
        let scope = [ModelId::Dealer, ModelId::Sentiment];

        let dropped = group_signals(&signals, &scope, GroupOptions::default());
        assert_eq!(dropped.len(), 1);
        assert_eq!(dropped[0].symbol, "GBPUSD");
        assert_eq!(dropped[0].net, -1);

        let kept = group_signals(&signals, &scope, GroupOptions { drop_netted: false });
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].symbol, "EURUSD");
        assert_eq!(kept[0].net, 0);
        assert_eq!(kept[0].legs.len(), 2);
        assert_eq!(kept[0].side(), None);
    }

    #[test]
    fn neutral_and_out_of_scope_are_skipped() {
        let signals = vec![
            sig("EURUSD", ModelId::Dealer, Direction::Neutral),
            sig("EURUSD", ModelId::Blended, Direction::Long),
            sig("EURUSD", ModelId::Commercial, Direction::Long),
        ];
        let models = [ModelId::Dealer, ModelId::Commercial];
        let pairs = group_signals(&signals, &models, GroupOptions::default());
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].net, 1);
        assert_eq!(
            pairs[0].legs,
            vec![Leg {
                model: ModelId::Commercial,
                direction: Direction::Long
            }]
        );
    }

    #[test]
    fn output_sorted_by_symbol() {
        let signals = vec![
            sig("USDJPY", ModelId::Dealer, Direction::Long),
            sig("AUDUSD", ModelId::Dealer, Direction::Long),
            sig("EURUSD", ModelId::Dealer, Direction::Short),
        ];
        let pairs = group_signals(&signals, &[ModelId::Dealer], GroupOptions::default());
        let symbols: Vec<&str> = pairs.iter().map(|p| p.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["AUDUSD", "EURUSD", "USDJPY"]);
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(group_signals(&[], &ModelId::UNIVERSAL, GroupOptions::default()).is_empty());
    }
}
