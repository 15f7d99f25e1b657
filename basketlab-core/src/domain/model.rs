//! Bias models that vote on symbol direction, and the model sets used by the engine.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelId {
    Antikythera,
    AntikytheraV2,
    AntikytheraV3,
    Blended,
    Dealer,
    Commercial,
    Sentiment,
}

impl ModelId {
    /// Models feeding the universal (non-tiered) basket.
    pub const UNIVERSAL: [ModelId; 5] = [
        ModelId::Antikythera,
        ModelId::Blended,
        ModelId::Dealer,
        ModelId::Commercial,
        ModelId::Sentiment,
    ];

    /// Voters for the v1 tier system.
    pub const TIER_V1: [ModelId; 4] = [
        ModelId::Blended,
        ModelId::Dealer,
        ModelId::Commercial,
        ModelId::Sentiment,
    ];

    /// Voters for the v2 tier system.
    pub const TIER_V2: [ModelId; 2] = [ModelId::Dealer, ModelId::Sentiment];

    /// Voters for the v3 tier system.
    pub const TIER_V3: [ModelId; 3] = [ModelId::Dealer, ModelId::Commercial, ModelId::Sentiment];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelId::Antikythera => "antikythera",
            ModelId::AntikytheraV2 => "antikythera_v2",
            ModelId::AntikytheraV3 => "antikythera_v3",
            ModelId::Blended => "blended",
            ModelId::Dealer => "dealer",
            ModelId::Commercial => "commercial",
            ModelId::Sentiment => "sentiment",
        }
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_serde_name() {
        for model in [
            ModelId::Antikythera,
            ModelId::AntikytheraV2,
            ModelId::AntikytheraV3,
            ModelId::Blended,
            ModelId::Dealer,
            ModelId::Commercial,
            ModelId::Sentiment,
        ] {
            let json = serde_json::to_string(&model).unwrap();
            assert_eq!(json, format!("\"{model}\""));
        }
    }

    #[test]
    fn tier_sets_are_subsets_of_known_models() {
        assert!(ModelId::TIER_V3.iter().all(|m| ModelId::TIER_V1.contains(m)));
        assert!(ModelId::TIER_V2.iter().all(|m| ModelId::TIER_V3.contains(m)));
    }
}
