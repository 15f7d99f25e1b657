//! Dollar sizing against a broker lot map.
//!
//! Simulated returns are unit-free percentages. This module converts them to
//! dollars for a reference account so variants that commit different margin
//! can be compared on the same budget:
//!
//! 1. `margin_usage`: margin committed by a desired book
//! 2. `normalization_scale`: factor that brings a variant to a reference margin
//! 3. `evaluate_tiered_week`: open-to-close P&L per confidence tier

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::data::LotMap;
use crate::domain::{SymbolKey, Tier};
use crate::engine::{PolicyConfig, WeekSeries};
use crate::signals::{DesiredBook, DesiredPosition};

/// Reference account size for dollar-denominated comparisons.
pub const DEFAULT_ACCOUNT_SIZE_USD: f64 = 100_000.0;

/// Multiplier from a live account's baseline equity to the reference size.
/// Falls back to 1 when the baseline is unknown.
pub fn account_scale(account_size_usd: f64, baseline_equity_usd: f64) -> f64 {
    if baseline_equity_usd.is_finite() && baseline_equity_usd > 0.0 {
        account_size_usd / baseline_equity_usd
    } else {
        1.0
    }
}

/// Margin committed by a book.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarginUsage {
    pub total_usd: f64,
    /// Positions with a lot-map entry.
    pub sized: u32,
    /// Symbols with no usable lot-map entry; they commit no margin.
    pub missing: Vec<SymbolKey>,
}

/// Margin of every desired position: `margin_per_leg × account_scale × weight`.
pub fn margin_usage(
    book: &DesiredBook,
    lots: &LotMap,
    policy: &PolicyConfig,
    account_scale: f64,
) -> MarginUsage {
    let mut usage = MarginUsage::default();
    for desired in book.iter() {
        match lots.find(&desired.key.symbol.symbol).filter(|l| l.margin_per_leg_usd > 0.0) {
            Some(lot) => {
                usage.total_usd +=
                    lot.margin_per_leg_usd * account_scale * policy.position_weight(desired);
                usage.sized += 1;
            }
            None => {
                if !usage.missing.contains(&desired.key.symbol) {
                    usage.missing.push(desired.key.symbol.clone());
                }
            }
        }
    }
    usage
}

/// Factor bringing a variant's margin to the reference margin. Zero when the
/// variant commits no margin.
pub fn normalization_scale(reference_margin_usd: f64, variant_margin_usd: f64) -> f64 {
    if variant_margin_usd.is_finite()
        && variant_margin_usd > 0.0
        && reference_margin_usd.is_finite()
    {
        reference_margin_usd / variant_margin_usd
    } else {
        0.0
    }
}

// ─── Tiered evaluation ──────────────────────────────────────────────

/// Totals for one group of positions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TierBucket {
    pub legs: u32,
    pub priced: u32,
    pub wins: u32,
    pub pnl_usd: f64,
    pub margin_usd: f64,
}

impl TierBucket {
    fn absorb(&mut self, other: &TierBucket) {
        self.legs += other.legs;
        self.priced += other.priced;
        self.wins += other.wins;
        self.pnl_usd += other.pnl_usd;
        self.margin_usd += other.margin_usd;
    }

    fn scaled(&self, factor: f64) -> Self {
        Self {
            pnl_usd: self.pnl_usd * factor,
            margin_usd: self.margin_usd * factor,
            ..*self
        }
    }
}

/// Dollar outcome of one week, split by tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TieredEvaluation {
    /// Indexed by [`Tier::index`].
    pub tiers: [TierBucket; 3],
    /// Positions that carry no tier (hedged or net books).
    pub untiered: TierBucket,
    pub total: TierBucket,
    pub account_size_usd: f64,
    pub account_return_pct: f64,
}

impl TieredEvaluation {
    pub fn tier(&self, tier: Tier) -> &TierBucket {
        &self.tiers[tier.index()]
    }

    /// Same evaluation resized by `factor` (counts are unchanged).
    pub fn scaled(&self, factor: f64) -> Self {
        let total = self.total.scaled(factor);
        Self {
            tiers: self.tiers.map(|b| b.scaled(factor)),
            untiered: self.untiered.scaled(factor),
            total,
            account_size_usd: self.account_size_usd,
            account_return_pct: return_on(total.pnl_usd, self.account_size_usd),
        }
    }
}

/// Hold every desired position from the week open to the last close and
/// book `return × move_1pct × account_scale × weight` dollars.
///
/// Positions whose weight is not positive are counted as legs but never
/// sized. Positions without a price path or a dollar conversion commit
/// margin but contribute no P&L.
pub fn evaluate_tiered_week(
    book: &DesiredBook,
    series: &WeekSeries,
    lots: &LotMap,
    policy: &PolicyConfig,
    account_scale: f64,
    account_size_usd: f64,
) -> TieredEvaluation {
    let mut tiers = [TierBucket::default(); 3];
    let mut untiered = TierBucket::default();

    for desired in book.iter() {
        let bucket = match desired.tier {
            Some(tier) => &mut tiers[tier.index()],
            None => &mut untiered,
        };
        bucket.legs += 1;
        price_leg(bucket, desired, series, lots, policy, account_scale);
    }

    let mut total = untiered;
    for bucket in &tiers {
        total.absorb(bucket);
    }
    TieredEvaluation {
        tiers,
        untiered,
        total,
        account_size_usd,
        account_return_pct: return_on(total.pnl_usd, account_size_usd),
    }
}

fn price_leg(
    bucket: &mut TierBucket,
    desired: &DesiredPosition,
    series: &WeekSeries,
    lots: &LotMap,
    policy: &PolicyConfig,
    account_scale: f64,
) {
    let weight = policy.position_weight(desired);
    if !(weight.is_finite() && weight > 0.0) {
        return;
    }
    let Some(lot) = lots.find(&desired.key.symbol.symbol) else {
        warn!(symbol = %desired.key.symbol, "no lot-map entry; leg left unsized");
        return;
    };
    if lot.margin_per_leg_usd > 0.0 {
        bucket.margin_usd += lot.margin_per_leg_usd * account_scale * weight;
    }
    let week_return = series
        .get(&desired.key.symbol)
        .and_then(|s| s.week_return_pct())
        .map(|r| r * desired.side.sign());
    let Some(week_return) = week_return.filter(|_| lot.move_1pct_usd > 0.0) else {
        return;
    };
    let pnl = week_return * lot.move_1pct_usd * account_scale * weight;
    bucket.pnl_usd += pnl;
    bucket.priced += 1;
    if pnl > 0.0 {
        bucket.wins += 1;
    }
}

fn return_on(pnl_usd: f64, account_size_usd: f64) -> f64 {
    if account_size_usd > 0.0 {
        pnl_usd / account_size_usd * 100.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::LotSpec;
    use crate::domain::{AssetClass, PositionKey, SeriesPoint, Side, SymbolSeries};
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;

    fn lots() -> LotMap {
        LotMap::new(vec![
            LotSpec {
                symbol: "EURUSD".into(),
                margin_per_leg_usd: 1_000.0,
                move_1pct_usd: 100.0,
            },
            LotSpec {
                symbol: "SPX500".into(),
                margin_per_leg_usd: 2_000.0,
                move_1pct_usd: 500.0,
            },
        ])
    }

    fn desired(sym: &str, class: AssetClass, side: Side, tier: Option<Tier>) -> DesiredPosition {
        DesiredPosition {
            key: PositionKey::netted(SymbolKey::new(class, sym)),
            side,
            units: 1.0,
            tier,
            report_date: None,
        }
    }

    fn week(sym: &str, class: AssetClass, close: f64) -> (SymbolKey, Arc<SymbolSeries>) {
        let ts = Utc.with_ymd_and_hms(2026, 1, 23, 21, 0, 0).unwrap();
        (
            SymbolKey::new(class, sym),
            Arc::new(SymbolSeries::new(100.0, vec![SeriesPoint { ts, close }])),
        )
    }

    #[test]
    fn account_scale_defaults_to_one() {
        assert_eq!(account_scale(100_000.0, 50_000.0), 2.0);
        assert_eq!(account_scale(100_000.0, 0.0), 1.0);
    }

    #[test]
    fn margin_resolves_aliases_and_reports_missing() {
        let book: DesiredBook = vec![
            desired("EURUSD", AssetClass::Fx, Side::Long, None),
            desired("SPXUSD", AssetClass::Indices, Side::Short, None),
            desired("XAGUSD", AssetClass::Commodities, Side::Long, None),
        ]
        .into_iter()
        .collect();
        let usage = margin_usage(&book, &lots(), &PolicyConfig::default(), 0.5);
        assert!((usage.total_usd - 1_500.0).abs() < 1e-9);
        assert_eq!(usage.sized, 2);
        assert_eq!(usage.missing, vec![SymbolKey::new(AssetClass::Commodities, "XAGUSD")]);
    }

    #[test]
    fn normalization_guards_zero_margin() {
        assert_eq!(normalization_scale(1_000.0, 500.0), 2.0);
        assert_eq!(normalization_scale(1_000.0, 0.0), 0.0);
    }

    #[test]
    fn tiered_week_buckets_by_tier() {
        let book: DesiredBook = vec![
            desired("EURUSD", AssetClass::Fx, Side::Long, Some(Tier::One)),
            desired("SPXUSD", AssetClass::Indices, Side::Short, Some(Tier::Three)),
        ]
        .into_iter()
        .collect();
        let series: WeekSeries = [
            week("EURUSD", AssetClass::Fx, 102.0),
            week("SPXUSD", AssetClass::Indices, 101.0),
        ]
        .into_iter()
        .collect();
        let policy = PolicyConfig {
            tier_weights: [1.0, 1.0, 0.5],
            ..PolicyConfig::default()
        };

        let eval =
            evaluate_tiered_week(&book, &series, &lots(), &policy, 1.0, DEFAULT_ACCOUNT_SIZE_USD);
        // EURUSD long +2% × $100.
        assert!((eval.tier(Tier::One).pnl_usd - 200.0).abs() < 1e-9);
        // SPX short −1% × $500 × 0.5.
        assert!((eval.tier(Tier::Three).pnl_usd + 250.0).abs() < 1e-9);
        assert!((eval.tier(Tier::Three).margin_usd - 1_000.0).abs() < 1e-9);
        assert_eq!(eval.total.legs, 2);
        assert_eq!(eval.total.wins, 1);
        assert!((eval.account_return_pct + 0.05).abs() < 1e-9);

        let doubled = eval.scaled(2.0);
        assert!((doubled.total.pnl_usd + 100.0).abs() < 1e-9);
        assert_eq!(doubled.total.priced, 2);
    }

    #[test]
    fn unpriced_leg_commits_margin_only() {
        let book: DesiredBook = vec![desired("EURUSD", AssetClass::Fx, Side::Long, Some(Tier::Two))]
            .into_iter()
            .collect();
        let eval = evaluate_tiered_week(
            &book,
            &WeekSeries::new(),
            &lots(),
            &PolicyConfig::default(),
            1.0,
            DEFAULT_ACCOUNT_SIZE_USD,
        );
        assert_eq!(eval.tier(Tier::Two).legs, 1);
        assert_eq!(eval.tier(Tier::Two).priced, 0);
        assert!((eval.total.margin_usd - 1_000.0).abs() < 1e-9);
    }
}
