//! Serializable run configuration.

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use thiserror::Error;

use basketlab_core::domain::SymbolKey;
use basketlab_core::engine::{ConfigError as PolicyError, PolicyConfig};
use basketlab_core::signals::PositionMode;
use basketlab_core::sizing::DEFAULT_ACCOUNT_SIZE_USD;
use basketlab_core::week::canonical_week_open;

/// Content hash identifying a variant's behavior.
pub type VariantId = String;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid run config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("variant '{variant}': {source}")]
    Policy {
        variant: String,
        #[source]
        source: PolicyError,
    },

    #[error("run config has no variants")]
    NoVariants,

    #[error("duplicate variant name '{0}'")]
    DuplicateVariant(String),

    #[error("variant '{0}' has an empty model list")]
    NoModels(String),

    #[error("variant '{variant}' normalizes to unknown variant '{reference}'")]
    UnknownReference { variant: String, reference: String },

    #[error("variant '{variant}' normalizes to '{reference}', which is itself normalized")]
    ChainedNormalization { variant: String, reference: String },

    #[error("end week {end} is before start week {start}")]
    InvalidWeekRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("account size must be positive, got {0}")]
    AccountSize(f64),

    #[error("variant fingerprint failed: {0}")]
    Fingerprint(#[from] serde_json::Error),
}

/// One policy variant to simulate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantConfig {
    pub name: String,
    #[serde(default)]
    pub mode: PositionMode,
    #[serde(default)]
    pub policy: PolicyConfig,
    /// Name of the variant whose weekly margin this one is rescaled to.
    #[serde(default)]
    pub normalize_margin_to: Option<String>,
}

impl VariantConfig {
    /// Deterministic id over mode and policy. The name is not part of it, so
    /// two variants that behave identically share an id.
    pub fn variant_id(&self) -> Result<VariantId, ConfigError> {
        let json = serde_json::to_string(&(&self.mode, &self.policy))?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }
}

fn default_account_size() -> f64 {
    DEFAULT_ACCOUNT_SIZE_USD
}

fn default_true() -> bool {
    true
}

/// A multi-week comparison of policy variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// First week to simulate; any timestamp inside the week works.
    pub start_week: DateTime<Utc>,

    /// Last week to simulate (inclusive). Open-ended when absent.
    #[serde(default)]
    pub end_week: Option<DateTime<Utc>>,

    /// Symbols that always appear in the signal list, as neutral when no model covers them.
    #[serde(default)]
    pub universe: Vec<SymbolKey>,

    pub variants: Vec<VariantConfig>,

    /// Reference account for dollar sizing.
    #[serde(default = "default_account_size")]
    pub account_size_usd: f64,

    /// Live account equity the lot map was sized for. Lot sizes are scaled
    /// by `account_size_usd / baseline_equity_usd`.
    #[serde(default)]
    pub baseline_equity_usd: Option<f64>,

    /// Fetch a week's price series in parallel before simulating it.
    #[serde(default = "default_true")]
    pub prefetch_parallel: bool,
}

impl RunConfig {
    /// Parse and validate a TOML run config.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: RunConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a TOML run config from disk.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read run config {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("invalid run config {}", path.display()))
    }

    /// Reject configurations that cannot be simulated. Fatal before any week runs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.variants.is_empty() {
            return Err(ConfigError::NoVariants);
        }
        if !(self.account_size_usd.is_finite() && self.account_size_usd > 0.0) {
            return Err(ConfigError::AccountSize(self.account_size_usd));
        }
        if let Some(end) = self.end_week {
            if canonical_week_open(end) < canonical_week_open(self.start_week) {
                return Err(ConfigError::InvalidWeekRange {
                    start: self.start_week,
                    end,
                });
            }
        }

        let mut names = BTreeSet::new();
        for variant in &self.variants {
            if !names.insert(variant.name.as_str()) {
                return Err(ConfigError::DuplicateVariant(variant.name.clone()));
            }
            if variant.mode.models().is_empty() {
                return Err(ConfigError::NoModels(variant.name.clone()));
            }
            variant.policy.validate().map_err(|source| ConfigError::Policy {
                variant: variant.name.clone(),
                source,
            })?;
        }

        for variant in &self.variants {
            let Some(reference) = &variant.normalize_margin_to else {
                continue;
            };
            let target = self.variants.iter().find(|v| &v.name == reference).ok_or_else(|| {
                ConfigError::UnknownReference {
                    variant: variant.name.clone(),
                    reference: reference.clone(),
                }
            })?;
            if target.normalize_margin_to.is_some() {
                return Err(ConfigError::ChainedNormalization {
                    variant: variant.name.clone(),
                    reference: reference.clone(),
                });
            }
        }
        Ok(())
    }

    /// Universe with symbols normalized the same way snapshot pairs are.
    pub fn universe_keys(&self) -> Vec<SymbolKey> {
        self.universe
            .iter()
            .map(|k| SymbolKey::new(k.asset_class, &k.symbol))
            .collect()
    }

    pub fn variant(&self, name: &str) -> Option<&VariantConfig> {
        self.variants.iter().find(|v| v.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use basketlab_core::domain::ModelId;
    use basketlab_core::engine::TrailPolicy;

    const SAMPLE: &str = r#"
start_week = "2026-01-19T00:00:00Z"
end_week = "2026-02-02T00:00:00Z"
universe = [{ asset_class = "fx", symbol = "eurusd" }]

[[variants]]
name = "universal"

[[variants]]
name = "tiered-v3"
mode = { type = "TIERED", voters = ["dealer", "commercial", "sentiment"] }
normalize_margin_to = "universal"

[variants.policy]
hard_stop_move_pct = 8.0
tier_weights = [1.0, 0.75, 0.5]
trail = { type = "FIXED", start_pct = 2.0, offset_pct = 1.0 }
"#;

    #[test]
    fn parses_sample() {
        let config = RunConfig::from_toml(SAMPLE).unwrap();
        assert_eq!(config.variants.len(), 2);
        assert_eq!(config.account_size_usd, DEFAULT_ACCOUNT_SIZE_USD);
        assert!(config.prefetch_parallel);
        assert_eq!(config.universe_keys()[0].symbol, "EURUSD");

        let tiered = config.variant("tiered-v3").unwrap();
        assert_eq!(tiered.mode.models(), &ModelId::TIER_V3);
        assert_eq!(tiered.policy.hard_stop_move_pct, 8.0);
        assert_eq!(
            tiered.policy.trail,
            TrailPolicy::Fixed {
                start_pct: 2.0,
                offset_pct: 1.0
            }
        );
        assert_eq!(config.variant("universal").unwrap().mode, PositionMode::default());
    }

    #[test]
    fn variant_id_ignores_name() {
        let config = RunConfig::from_toml(SAMPLE).unwrap();
        let mut renamed = config.variants[1].clone();
        renamed.name = "other".into();
        let id = config.variants[1].variant_id().unwrap();
        assert_eq!(id, renamed.variant_id().unwrap());
        assert_eq!(id.len(), 64);
        assert_ne!(id, config.variants[0].variant_id().unwrap());
    }

    #[test]
    fn rejects_bad_policy_with_variant_name() {
        let toml = r#"
start_week = "2026-01-19T00:00:00Z"
[[variants]]
name = "broken"
[variants.policy]
hard_stop_move_pct = -1.0
"#;
        let err = RunConfig::from_toml(toml).unwrap_err();
        assert!(matches!(err, ConfigError::Policy { ref variant, .. } if variant == "broken"));
    }

    #[test]
    fn rejects_structural_errors() {
        let base = r#"start_week = "2026-01-19T00:00:00Z""#;
        assert!(matches!(
            RunConfig::from_toml(&format!("{base}\nvariants = []")).unwrap_err(),
            ConfigError::NoVariants
        ));
        let dup = format!("{base}\n[[variants]]\nname = \"a\"\n[[variants]]\nname = \"a\"\n");
        assert!(matches!(
            RunConfig::from_toml(&dup).unwrap_err(),
            ConfigError::DuplicateVariant(_)
        ));
        let unknown =
            format!("{base}\n[[variants]]\nname = \"a\"\nnormalize_margin_to = \"zzz\"\n");
        assert!(matches!(
            RunConfig::from_toml(&unknown).unwrap_err(),
            ConfigError::UnknownReference { .. }
        ));
        let backwards = r#"
start_week = "2026-02-02T00:00:00Z"
end_week = "2026-01-19T00:00:00Z"
[[variants]]
name = "a"
"#;
        assert!(matches!(
            RunConfig::from_toml(backwards).unwrap_err(),
            ConfigError::InvalidWeekRange { .. }
        ));
        assert!(matches!(RunConfig::from_toml("not toml [").unwrap_err(), ConfigError::Parse(_)));
    }
}
