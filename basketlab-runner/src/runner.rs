//! Multi-week runner — wires snapshots, desired books, prices and the engine.
//!
//! Two entry points:
//! - `run_variant()`: one policy variant over a resolved list of weeks.
//! - `run_all()`: resolves weeks once, runs every variant, then rescales
//!   variants that normalize their margin to a reference variant.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use basketlab_core::analytics::{DrawdownTracker, RunSummary};
use basketlab_core::data::{read_week_rows, DataError};
use basketlab_core::domain::SymbolKey;
use basketlab_core::engine::{EngineState, WeekInput, WeekMetrics};
use basketlab_core::signals::{aggregate_signals, build_desired, DesiredBook};
use basketlab_core::sizing::{
    evaluate_tiered_week, margin_usage, normalization_scale, TieredEvaluation,
};

use crate::config::{ConfigError, RunConfig, VariantConfig, VariantId};
use crate::context::RunContext;
use crate::weeks::{resolve_weeks, ResolvedWeek};

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] DataError),
    #[error("variant '{0}' normalizes margin but no lot map was provided")]
    MissingLotMap(String),
}

/// Current schema version for emitted reports.
pub const SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// A week that could not be simulated. Positions carry through it untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedWeek {
    pub week_open_utc: DateTime<Utc>,
    pub reason: String,
}

/// Variant results rescaled to a reference variant's weekly margin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedView {
    pub reference: String,
    /// Scale applied to each week, in week order.
    pub scales: Vec<f64>,
    pub weeks: Vec<WeekMetrics>,
    pub tiered: Vec<TieredEvaluation>,
    pub summary: RunSummary,
}

/// Complete result of one variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantReport {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub variant_id: VariantId,
    pub name: String,
    pub weeks: Vec<WeekMetrics>,
    /// Dollar evaluation per simulated week; empty without a lot map.
    #[serde(default)]
    pub tiered: Vec<TieredEvaluation>,
    pub summary: RunSummary,
    pub skipped_weeks: Vec<SkippedWeek>,
    #[serde(default)]
    pub normalized: Option<NormalizedView>,
}

/// Every variant of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub weeks: Vec<ResolvedWeek>,
    pub variants: Vec<VariantReport>,
}

impl RunReport {
    pub fn variant(&self, name: &str) -> Option<&VariantReport> {
        self.variants.iter().find(|v| v.name == name)
    }
}

/// Simulate one variant over `weeks`, in order.
///
/// A week whose snapshot rows cannot be read is logged and skipped; the run
/// continues with the positions carried as they were.
pub fn run_variant(
    ctx: &RunContext<'_>,
    config: &RunConfig,
    variant: &VariantConfig,
    weeks: &[ResolvedWeek],
) -> Result<VariantReport, RunError> {
    let variant_id = variant.variant_id()?;
    let universe = config.universe_keys();
    let scale = ctx.account_scale(config.account_size_usd, config.baseline_equity_usd);

    let mut state = EngineState::new();
    let mut metrics = Vec::with_capacity(weeks.len());
    let mut tiered = Vec::new();
    let mut skipped = Vec::new();

    for week in weeks {
        let rows = match read_week_rows(ctx.store(), week.source.week_open_utc) {
            Ok(rows) => rows,
            Err(err) => {
                warn!(
                    variant = %variant.name,
                    week = %week.week_open_utc,
                    error = %err,
                    "week skipped"
                );
                skipped.push(SkippedWeek {
                    week_open_utc: week.week_open_utc,
                    reason: err.to_string(),
                });
                continue;
            }
        };

        let signals = aggregate_signals(&rows, variant.mode.models(), &universe);
        let desired = build_desired(&signals, &variant.mode);
        let symbols = week_symbols(&desired, &state);
        let series = ctx.week_series(week.week_open_utc, &symbols, config.prefetch_parallel);

        let mut week_metrics = state.simulate_week(
            &variant.policy,
            &WeekInput {
                week_open_utc: week.week_open_utc,
                desired: &desired,
                series: &series,
            },
        );
        if let Some(lots) = ctx.lots() {
            let usage = margin_usage(&desired, lots, &variant.policy, scale);
            week_metrics.margin_used_usd = Some(usage.total_usd);
            tiered.push(evaluate_tiered_week(
                &desired,
                &series,
                lots,
                &variant.policy,
                scale,
                config.account_size_usd,
            ));
        }
        metrics.push(week_metrics);
    }

    let summary = RunSummary::compute(&metrics, state.overall());
    info!(
        variant = %variant.name,
        weeks = summary.weeks,
        skipped = skipped.len(),
        total_return_pct = summary.total_return_pct,
        win_rate_pct = summary.win_rate_pct,
        "variant complete"
    );

    Ok(VariantReport {
        schema_version: SCHEMA_VERSION,
        variant_id,
        name: variant.name.clone(),
        weeks: metrics,
        tiered,
        summary,
        skipped_weeks: skipped,
        normalized: None,
    })
}

/// Symbols to price for a week: the desired book plus every carried position.
///
/// A carried position that is no longer desired still needs its week-open
/// price to be closed at a real mark.
fn week_symbols(
    desired: &DesiredBook,
    state: &EngineState,
) -> BTreeMap<SymbolKey, Option<NaiveDate>> {
    let mut symbols = desired.symbols();
    for p in state.positions() {
        symbols.entry(p.key.symbol.clone()).or_insert(None);
    }
    symbols
}

/// Resolve weeks, run every variant and apply margin normalization.
///
/// Variants are independent of each other and run on the rayon pool; each
/// variant's weeks still run strictly in order.
pub fn run_all(ctx: &RunContext<'_>, config: &RunConfig) -> Result<RunReport, RunError> {
    config.validate()?;
    if ctx.lots().is_none() {
        if let Some(v) = config.variants.iter().find(|v| v.normalize_margin_to.is_some()) {
            return Err(RunError::MissingLotMap(v.name.clone()));
        }
    }

    let weeks = resolve_weeks(ctx.store(), config.start_week, config.end_week)?;
    info!(weeks = weeks.len(), variants = config.variants.len(), "run starting");

    let mut reports = config
        .variants
        .par_iter()
        .map(|variant| run_variant(ctx, config, variant, &weeks))
        .collect::<Result<Vec<_>, _>>()?;

    let views: Vec<Option<NormalizedView>> = config
        .variants
        .iter()
        .map(|variant| {
            let reference = variant.normalize_margin_to.as_deref()?;
            let own = reports.iter().find(|r| r.name == variant.name)?;
            let base = reports.iter().find(|r| r.name == reference)?;
            Some(normalize(own, base))
        })
        .collect();
    for (report, view) in reports.iter_mut().zip(views) {
        report.normalized = view;
    }

    Ok(RunReport {
        schema_version: SCHEMA_VERSION,
        weeks,
        variants: reports,
    })
}

/// Rescale `own` week by week so its margin matches `reference`.
///
/// Weeks the reference did not simulate, or without margin on either side,
/// get a scale of zero.
pub fn normalize(own: &VariantReport, reference: &VariantReport) -> NormalizedView {
    let reference_margin: BTreeMap<DateTime<Utc>, f64> = reference
        .weeks
        .iter()
        .filter_map(|w| w.margin_used_usd.map(|m| (w.week_open_utc, m)))
        .collect();

    let scales: Vec<f64> = own
        .weeks
        .iter()
        .map(|w| match (reference_margin.get(&w.week_open_utc), w.margin_used_usd) {
            (Some(&base), Some(margin)) => normalization_scale(base, margin),
            _ => 0.0,
        })
        .collect();

    let weeks: Vec<WeekMetrics> =
        own.weeks.iter().zip(&scales).map(|(w, &s)| w.scaled(s)).collect();
    let tiered: Vec<TieredEvaluation> =
        own.tiered.iter().zip(&scales).map(|(t, &s)| t.scaled(s)).collect();
    let summary = RunSummary::compute(&weeks, &rebased_tracker(&weeks));

    NormalizedView {
        reference: reference.name.clone(),
        scales,
        weeks,
        tiered,
        summary,
    }
}

/// Run-wide tracker over a chain of independently scaled weeks.
///
/// Each week's curve is re-anchored on the cumulative return of the weeks
/// before it, measured from the previous week's close so weekend gaps count.
fn rebased_tracker(weeks: &[WeekMetrics]) -> DrawdownTracker {
    let mut tracker = DrawdownTracker::new();
    let mut base = 0.0;
    for week in weeks {
        let prior_close = week.end_equity_pct - week.return_pct;
        for point in &week.equity_curve {
            tracker.observe(base + point.equity_pct - prior_close);
        }
        base += week.return_pct;
    }
    tracker
}
