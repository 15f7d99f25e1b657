//! Criterion benchmarks for BasketLab hot paths.
//!
//! Benchmarks:
//! 1. Weekly lifecycle (hourly path, growing basket size)
//! 2. Multi-week run with adaptive trail calibration
//! 3. Signal aggregation and desired-book construction
//! 4. Equity curve analysis

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;

use basketlab_core::analytics::{analyze, EquityPoint};
use basketlab_core::data::{PairDetail, SnapshotRow};
use basketlab_core::domain::{
    AssetClass, Direction, ModelId, PositionKey, SeriesPoint, Side, SymbolKey, SymbolSeries,
};
use basketlab_core::engine::{run_weeks, EngineState, PolicyConfig, WeekInput, WeekSeries};
use basketlab_core::signals::{
    aggregate_signals, build_desired, DesiredBook, DesiredPosition, PositionMode,
};
use chrono::{DateTime, Duration, TimeZone, Utc};

// ── Helpers ──────────────────────────────────────────────────────────

fn week_open(week: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 19, 0, 0, 0).unwrap() + Duration::weeks(week)
}

fn symbol(i: usize) -> String {
    format!("SYM{i:03}")
}

/// `n` positions, each with a 120-hour wavy path.
fn make_week(n: usize, week: i64) -> (DesiredBook, WeekSeries) {
    let mut book = DesiredBook::new();
    let mut series = WeekSeries::new();
    for i in 0..n {
        let key = SymbolKey::new(AssetClass::Fx, symbol(i));
        book.insert(DesiredPosition {
            key: PositionKey::netted(key.clone()),
            side: if i % 2 == 0 { Side::Long } else { Side::Short },
            units: 1.0,
            tier: None,
            report_date: None,
        });
        let points = (0..120)
            .map(|h| SeriesPoint {
                ts: week_open(week) + Duration::hours(h + 1),
                close: 100.0 + ((h as f64 + i as f64) * 0.1).sin() * 3.0,
            })
            .collect();
        series.insert(key, Arc::new(SymbolSeries::new(100.0, points)));
    }
    (book, series)
}

fn make_rows(n: usize) -> Vec<SnapshotRow> {
    ModelId::UNIVERSAL
        .iter()
        .enumerate()
        .map(|(m, &model)| SnapshotRow {
            week_open_utc: week_open(0),
            asset_class: AssetClass::Fx,
            model,
            report_date: None,
            pair_details: (0..n)
                .map(|i| PairDetail {
                    pair: symbol(i),
                    direction: if (i + m) % 3 == 0 { Direction::Short } else { Direction::Long },
                    percent: Some(0.5),
                    reason: Vec::new(),
                })
                .collect(),
        })
        .collect()
}

// ── 1. Weekly lifecycle ──────────────────────────────────────────────

fn bench_week(c: &mut Criterion) {
    let mut group = c.benchmark_group("simulate_week");
    let policy = PolicyConfig::default();
    for n in [8usize, 32, 128] {
        let (book, series) = make_week(n, 0);
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| {
                let mut state = EngineState::new();
                black_box(state.simulate_week(
                    &policy,
                    &WeekInput {
                        week_open_utc: week_open(0),
                        desired: &book,
                        series: &series,
                    },
                ))
            })
        });
    }
    group.finish();
}

// ── 2. Multi-week run ────────────────────────────────────────────────

fn bench_run(c: &mut Criterion) {
    let weeks: Vec<(DesiredBook, WeekSeries)> = (0..12).map(|w| make_week(32, w)).collect();
    let inputs: Vec<WeekInput<'_>> = weeks
        .iter()
        .enumerate()
        .map(|(w, (book, series))| WeekInput {
            week_open_utc: week_open(w as i64),
            desired: book,
            series,
        })
        .collect();
    let policy = PolicyConfig::default();
    c.bench_function("run_weeks_12x32", |b| b.iter(|| black_box(run_weeks(&policy, &inputs))));
}

// ── 3. Signals ───────────────────────────────────────────────────────

fn bench_signals(c: &mut Criterion) {
    let rows = make_rows(64);
    let mode = PositionMode::Net {
        models: ModelId::UNIVERSAL.to_vec(),
    };
    c.bench_function("aggregate_and_net_64", |b| {
        b.iter(|| {
            let signals = aggregate_signals(&rows, &ModelId::UNIVERSAL, &[]);
            black_box(build_desired(&signals, &mode))
        })
    });
}

// ── 4. Curve analysis ────────────────────────────────────────────────

fn bench_analyze(c: &mut Criterion) {
    let points: Vec<EquityPoint> = (0..10_000)
        .map(|i| EquityPoint {
            ts: week_open(0) + Duration::minutes(i),
            equity_pct: (i as f64 * 0.01).sin() * 5.0,
            lock_pct: None,
        })
        .collect();
    c.bench_function("analyze_10k", |b| b.iter(|| black_box(analyze(&points))));
}

criterion_group!(benches, bench_week, bench_run, bench_signals, bench_analyze);
criterion_main!(benches);
