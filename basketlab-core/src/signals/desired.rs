//! The desired book: which positions a variant wants to hold this week.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::aggregate::BasketSignal;
use super::netting::{group_signals, GroupOptions};
use super::tier::tally_votes;
use crate::domain::{ModelId, PositionKey, Side, SymbolKey, Tier};

/// How signals become positions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionMode {
    /// One position per (model, symbol) following that model's vote.
    Hedged {
        #[serde(default = "universal_models")]
        models: Vec<ModelId>,
    },
    /// One position per symbol in the direction of the net vote, sized by |net|.
    Net {
        #[serde(default = "universal_models")]
        models: Vec<ModelId>,
    },
    /// One position per symbol that earns a tier from the given voters.
    Tiered { voters: Vec<ModelId> },
}

fn universal_models() -> Vec<ModelId> {
    ModelId::UNIVERSAL.to_vec()
}

impl Default for PositionMode {
    fn default() -> Self {
        PositionMode::Hedged {
            models: universal_models(),
        }
    }
}

impl PositionMode {
    /// Models whose rows must be read for this mode.
    pub fn models(&self) -> &[ModelId] {
        match self {
            PositionMode::Hedged { models } | PositionMode::Net { models } => models,
            PositionMode::Tiered { voters } => voters,
        }
    }
}

/// One wanted position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesiredPosition {
    pub key: PositionKey,
    pub side: Side,
    /// Vote units backing the position (|net| in net mode, otherwise 1).
    pub units: f64,
    pub tier: Option<Tier>,
    pub report_date: Option<NaiveDate>,
}

/// Desired positions for one week, ordered by key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DesiredBook {
    entries: BTreeMap<PositionKey, DesiredPosition>,
}

impl DesiredBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, desired: DesiredPosition) {
        self.entries.insert(desired.key.clone(), desired);
    }

    pub fn get(&self, key: &PositionKey) -> Option<&DesiredPosition> {
        self.entries.get(key)
    }

    /// True when `key` is wanted on `side`.
    pub fn wants(&self, key: &PositionKey, side: Side) -> bool {
        self.entries.get(key).is_some_and(|d| d.side == side)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DesiredPosition> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Distinct symbols with the report date their series should be windowed on.
    pub fn symbols(&self) -> BTreeMap<SymbolKey, Option<NaiveDate>> {
        let mut out: BTreeMap<SymbolKey, Option<NaiveDate>> = BTreeMap::new();
        for d in self.entries.values() {
            let slot = out.entry(d.key.symbol.clone()).or_insert(None);
            *slot = slot.or(d.report_date);
        }
        out
    }
}

impl FromIterator<DesiredPosition> for DesiredBook {
    fn from_iter<T: IntoIterator<Item = DesiredPosition>>(iter: T) -> Self {
        let mut book = DesiredBook::new();
        for d in iter {
            book.insert(d);
        }
        book
    }
}

/// Build the desired book for one week.
pub fn build_desired(signals: &[BasketSignal], mode: &PositionMode) -> DesiredBook {
    match mode {
        PositionMode::Hedged { models } => signals
            .iter()
            .filter(|s| models.contains(&s.model))
            .filter_map(|s| {
                s.direction.side().map(|side| DesiredPosition {
                    key: PositionKey::scoped(s.model, s.key()),
                    side,
                    units: 1.0,
                    tier: None,
                    report_date: s.report_date,
                })
            })
            .collect(),
        PositionMode::Net { models } => group_signals(signals, models, GroupOptions::default())
            .into_iter()
            .filter_map(|pair| {
                pair.side().map(|side| DesiredPosition {
                    key: PositionKey::netted(pair.key()),
                    side,
                    units: f64::from(pair.net.unsigned_abs()),
                    tier: None,
                    report_date: pair.report_date,
                })
            })
            .collect(),
        PositionMode::Tiered { voters } => {
            let report_dates: BTreeMap<SymbolKey, NaiveDate> = signals
                .iter()
                .filter(|s| voters.contains(&s.model))
                .filter_map(|s| s.report_date.map(|d| (s.key(), d)))
                .collect();
            tally_votes(signals, voters)
                .into_iter()
                .filter_map(|(key, count)| {
                    count.classify().map(|call| DesiredPosition {
                        report_date: report_dates.get(&key).copied(),
                        key: PositionKey::netted(key),
                        side: call.side,
                        units: 1.0,
                        tier: Some(call.tier),
                    })
                })
                .collect()
        }
    }
}
