//! Property tests for engine invariants.
//!
//! Uses proptest to verify:
//! 1. Netting — `net` is the signed sum of directional votes
//! 2. Tier voter-count invariance — unanimity is always tier 1
//! 3. Equity identity — the curve always equals realized plus floating
//! 4. Drawdown bounds — giveback, underwater and left-on-table are never negative
//! 5. Dedup determinism — `pick_best` ignores input order

use basketlab_core::analytics::{analyze, left_on_table, EquityPoint};
use basketlab_core::domain::{
    AssetClass, Direction, ModelId, PositionKey, SeriesPoint, Side, SymbolKey, SymbolSeries, Tier,
};
use basketlab_core::engine::{
    EngineState, LoserCarry, PolicyConfig, TrailPolicy, WeekInput, WeekSeries,
};
use basketlab_core::signals::{
    classify_votes, group_signals, BasketSignal, DesiredBook, DesiredPosition, GroupOptions,
};
use basketlab_core::week::{pick_best, WeekCandidate};
use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use std::sync::Arc;

const SYMBOLS: [&str; 4] = ["EURUSD", "GBPUSD", "USDJPY", "AUDUSD"];

fn week_open() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 19, 0, 0, 0).unwrap()
}

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_direction() -> impl Strategy<Value = Direction> {
    prop_oneof![Just(Direction::Long), Just(Direction::Short), Just(Direction::Neutral)]
}

fn arb_model() -> impl Strategy<Value = ModelId> {
    prop::sample::select(ModelId::TIER_V1.to_vec())
}

fn arb_signal() -> impl Strategy<Value = BasketSignal> {
    (prop::sample::select(SYMBOLS.to_vec()), arb_model(), arb_direction()).prop_map(
        |(symbol, model, direction)| BasketSignal {
            asset_class: AssetClass::Fx,
            symbol: symbol.to_string(),
            model,
            direction,
            report_date: None,
        },
    )
}

/// Closes within ±15% of a 100.0 open, one per hour.
fn arb_path() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(85.0..115.0_f64, 1..24)
}

fn arb_side() -> impl Strategy<Value = Side> {
    prop_oneof![Just(Side::Long), Just(Side::Short)]
}

fn arb_policy() -> impl Strategy<Value = PolicyConfig> {
    (
        prop_oneof![
            Just(TrailPolicy::Disabled),
            Just(TrailPolicy::default()),
            (0.5..5.0_f64, 0.1..2.0_f64).prop_map(|(start_pct, offset_pct)| TrailPolicy::Fixed {
                start_pct,
                offset_pct
            }),
        ],
        prop_oneof![Just(LoserCarry::HoldLosers), Just(LoserCarry::CloseAllWeekly)],
        2.0..20.0_f64,
    )
        .prop_map(|(trail, loser_carry, hard_stop_move_pct)| PolicyConfig {
            trail,
            loser_carry,
            hard_stop_move_pct,
            ..PolicyConfig::default()
        })
}

fn arb_candidate() -> impl Strategy<Value = WeekCandidate> {
    (0u32..4, 0u32..4, 0i64..3, prop::option::of(0i64..3), prop::option::of(0i64..3)).prop_map(
        |(priced, extra, offset_h, report, created)| WeekCandidate {
            id: String::new(),
            week_open_utc: week_open() + Duration::hours(offset_h * 5),
            report_date: report.map(|d| {
                chrono::NaiveDate::from_ymd_opt(2026, 1, 12).unwrap() + Duration::days(d)
            }),
            priced_legs: priced,
            total_legs: priced + extra,
            created_at: created.map(|h| week_open() + Duration::hours(h)),
        },
    )
}

/// Helper: build a week from per-symbol paths and sides.
fn build_week(legs: &[(Side, Vec<f64>)]) -> (DesiredBook, WeekSeries) {
    let mut book = DesiredBook::new();
    let mut series = WeekSeries::new();
    for (i, (side, closes)) in legs.iter().enumerate() {
        let key = SymbolKey::new(AssetClass::Fx, SYMBOLS[i]);
        book.insert(DesiredPosition {
            key: PositionKey::netted(key.clone()),
            side: *side,
            units: 1.0,
            tier: None,
            report_date: None,
        });
        let points = closes
            .iter()
            .enumerate()
            .map(|(h, &close)| SeriesPoint {
                ts: week_open() + Duration::hours(h as i64 + 1),
                close,
            })
            .collect();
        series.insert(key, Arc::new(SymbolSeries::new(100.0, points)));
    }
    (book, series)
}

// ── 1. Netting ───────────────────────────────────────────────────────

proptest! {
    #[test]
    fn net_is_signed_vote_sum(signals in prop::collection::vec(arb_signal(), 0..30)) {
        let options = GroupOptions { drop_netted: false };
        let pairs = group_signals(&signals, ModelId::TIER_V1.as_slice(), options);
        for pair in &pairs {
            let expected: i32 = signals
                .iter()
                .filter(|s| s.symbol == pair.symbol)
                .map(|s| s.direction.vote())
                .sum();
            prop_assert_eq!(pair.net, expected);
        }

        let dropped = group_signals(&signals, ModelId::TIER_V1.as_slice(), GroupOptions::default());
        prop_assert!(dropped.iter().all(|p| p.net != 0));
        prop_assert_eq!(
            dropped.len(),
            pairs.iter().filter(|p| p.net != 0).count()
        );
    }
}

// ── 2. Tier voter-count invariance ───────────────────────────────────

proptest! {
    #[test]
    fn unanimity_is_always_tier_one(voters in 1u32..10) {
        let long = classify_votes(voters, 0, 0, voters).unwrap();
        prop_assert_eq!(long.tier, Tier::One);
        prop_assert_eq!(long.side, Side::Long);
        let short = classify_votes(0, voters, 0, voters).unwrap();
        prop_assert_eq!(short.tier, Tier::One);
        prop_assert_eq!(short.side, Side::Short);
    }

    #[test]
    fn ties_never_trade(split in 1u32..5, neutral in 0u32..4) {
        prop_assert!(classify_votes(split, split, neutral, 2 * split + neutral).is_none());
    }
}

// ── 3 & 4. Equity identity and drawdown bounds ───────────────────────

proptest! {
    #[test]
    fn equity_identity_and_bounds_hold_across_weeks(
        legs in prop::collection::vec((arb_side(), arb_path()), 1..4),
        next_legs in prop::collection::vec((arb_side(), arb_path()), 1..4),
        policy in arb_policy(),
    ) {
        let mut state = EngineState::new();
        for (week, legs) in [legs, next_legs].iter().enumerate() {
            let (book, series) = build_week(legs);
            let open = week_open() + Duration::weeks(week as i64);
            // Shift the path into this week.
            let series: WeekSeries = series
                .into_iter()
                .map(|(key, s)| {
                    let points = s
                        .points
                        .iter()
                        .map(|p| SeriesPoint {
                            ts: p.ts + Duration::weeks(week as i64),
                            close: p.close,
                        })
                        .collect();
                    (key, Arc::new(SymbolSeries::new(s.open_price, points)))
                })
                .collect();

            let metrics = state.simulate_week(
                &policy,
                &WeekInput { week_open_utc: open, desired: &book, series: &series },
            );

            let last = metrics.equity_curve.last().map(|p| p.ts).unwrap();
            let identity = state.equity_at(&series, last);
            prop_assert!((identity - metrics.end_equity_pct).abs() < 1e-9);
            prop_assert!(metrics.giveback_dd_pct >= 0.0);
            prop_assert!(metrics.underwater_dd_pct >= 0.0);
            prop_assert!(metrics.left_on_table_pct >= 0.0);
            prop_assert!(metrics.peak_profit_pct >= metrics.end_profit_pct - 1e-9);
            prop_assert!(state.positions().all(|p| p.remaining >= 0.0));
            // Closes at the mark never move equity within a timestamp.
            prop_assert_eq!(metrics.invariant_violations, 0);
        }
        prop_assert_eq!(state.weeks_simulated(), 2);
    }

    #[test]
    fn curve_stats_are_bounded(values in prop::collection::vec(-50.0..50.0_f64, 1..50)) {
        let points: Vec<EquityPoint> = values
            .iter()
            .enumerate()
            .map(|(i, &equity_pct)| EquityPoint {
                ts: week_open() + Duration::hours(i as i64),
                equity_pct,
                lock_pct: None,
            })
            .collect();
        let stats = analyze(&points);
        prop_assert!(stats.max_giveback_dd >= 0.0);
        prop_assert!(stats.peak >= stats.close && stats.close >= stats.low);
        prop_assert!(stats.max_giveback_dd <= stats.peak - stats.low + 1e-12);
    }

    #[test]
    fn left_on_table_zero_at_peak(peak in -20.0..20.0_f64, above in 0.0..5.0_f64) {
        prop_assert_eq!(left_on_table(peak, peak + above), 0.0);
        prop_assert!(left_on_table(peak, peak - above) >= 0.0);
    }
}

// ── 5. Dedup determinism ─────────────────────────────────────────────

proptest! {
    #[test]
    fn pick_best_ignores_order(
        (rows, shuffled) in prop::collection::vec(arb_candidate(), 1..8)
            .prop_map(|rows| {
                rows.into_iter()
                    .enumerate()
                    .map(|(i, mut c)| { c.id = format!("row-{i}"); c })
                    .collect::<Vec<_>>()
            })
            .prop_flat_map(|rows| (Just(rows.clone()), Just(rows).prop_shuffle()))
    ) {
        let a = pick_best(&rows, week_open()).map(|c| c.id.clone());
        let b = pick_best(&shuffled, week_open()).map(|c| c.id.clone());
        prop_assert_eq!(a, b);
    }
}
