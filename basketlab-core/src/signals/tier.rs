//! Tier classification from voter counts.
//!
//! The rule depends only on how many voters went each way, never on which
//! models they are:
//! 1. Unanimous → tier 1.
//! 2. Two voters: one directional plus one neutral → tier 2, anything else → none.
//! 3. Three or more: a `voters - 1` majority → tier 2; otherwise a strict
//!    winner (even 1 vs 0 with the rest neutral) → tier 3; a tie → none.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::aggregate::BasketSignal;
use crate::domain::{Direction, ModelId, Side, SymbolKey, Tier};

/// A classified symbol: confidence tier and resolved side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierCall {
    pub tier: Tier,
    pub side: Side,
}

/// Vote counts for one symbol.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteCount {
    pub long: u32,
    pub short: u32,
    pub neutral: u32,
}

impl VoteCount {
    pub fn voters(&self) -> u32 {
        self.long + self.short + self.neutral
    }

    pub fn classify(&self) -> Option<TierCall> {
        classify_votes(self.long, self.short, self.neutral, self.voters())
    }
}

/// Classify one symbol's votes.
pub fn classify_votes(long: u32, short: u32, neutral: u32, voters: u32) -> Option<TierCall> {
    let call = |tier, side| Some(TierCall { tier, side });

    if voters == 0 {
        return None;
    }

    if voters == 2 {
        return match (long, short, neutral) {
            (2, _, _) => call(Tier::One, Side::Long),
            (_, 2, _) => call(Tier::One, Side::Short),
            (1, _, 1) => call(Tier::Two, Side::Long),
            (_, 1, 1) => call(Tier::Two, Side::Short),
            _ => None,
        };
    }

    if long == voters {
        return call(Tier::One, Side::Long);
    }
    if short == voters {
        return call(Tier::One, Side::Short);
    }

    let leader = long.max(short);
    if leader > 0 && leader == voters - 1 {
        return if long > short {
            call(Tier::Two, Side::Long)
        } else {
            call(Tier::Two, Side::Short)
        };
    }

    match long.cmp(&short) {
        std::cmp::Ordering::Greater => call(Tier::Three, Side::Long),
        std::cmp::Ordering::Less => call(Tier::Three, Side::Short),
        std::cmp::Ordering::Equal => None,
    }
}

/// Count each voter once per symbol. A voter with no signal counts as neutral.
///
/// Symbols appear when at least one voter mentioned them.
pub fn tally_votes(signals: &[BasketSignal], voters: &[ModelId]) -> BTreeMap<SymbolKey, VoteCount> {
    let mut seen: BTreeMap<SymbolKey, BTreeMap<ModelId, Direction>> = BTreeMap::new();
    for signal in signals {
        if !voters.contains(&signal.model) {
            continue;
        }
        seen.entry(signal.key())
            .or_default()
            .entry(signal.model)
            .or_insert(signal.direction);
    }

    seen.into_iter()
        .map(|(key, by_model)| {
            let mut count = VoteCount::default();
            for voter in voters {
                match by_model.get(voter).copied().unwrap_or(Direction::Neutral) {
                    Direction::Long => count.long += 1,
                    Direction::Short => count.short += 1,
                    Direction::Neutral => count.neutral += 1,
                }
            }
            (key, count)
        })
        .collect()
}
