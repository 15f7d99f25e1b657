//! Equity curve and drawdown analytics: pure functions over equity points and week records.
//!
//! Every figure here is in percent of account. No dependency on the lifecycle
//! loop beyond the record types it produces.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::report::{CloseCounts, LegCoverage, WeekMetrics};

/// One observation of account equity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub ts: DateTime<Utc>,
    pub equity_pct: f64,
    /// Trailing lock level at this point, if armed.
    pub lock_pct: Option<f64>,
}

/// Single-pass statistics of an equity curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurveStats {
    pub close: f64,
    pub peak: f64,
    /// First time the peak was reached.
    pub peak_at: Option<DateTime<Utc>>,
    pub low: f64,
    /// First time the low was reached.
    pub low_at: Option<DateTime<Utc>>,
    /// Largest peak-to-current decline.
    pub max_giveback_dd: f64,
}

/// Analyze an equity curve in timestamp order.
///
/// An empty curve yields zeros with no timestamps.
pub fn analyze(points: &[EquityPoint]) -> CurveStats {
    let mut ordered: Vec<&EquityPoint> =
        points.iter().filter(|p| p.equity_pct.is_finite()).collect();
    ordered.sort_by_key(|p| p.ts);

    let Some(first) = ordered.first() else {
        return CurveStats {
            close: 0.0,
            peak: 0.0,
            peak_at: None,
            low: 0.0,
            low_at: None,
            max_giveback_dd: 0.0,
        };
    };

    let mut stats = CurveStats {
        close: first.equity_pct,
        peak: first.equity_pct,
        peak_at: Some(first.ts),
        low: first.equity_pct,
        low_at: Some(first.ts),
        max_giveback_dd: 0.0,
    };
    for p in ordered.iter().skip(1) {
        let eq = p.equity_pct;
        if eq > stats.peak {
            stats.peak = eq;
            stats.peak_at = Some(p.ts);
        }
        if eq < stats.low {
            stats.low = eq;
            stats.low_at = Some(p.ts);
        }
        stats.max_giveback_dd = stats.max_giveback_dd.max(stats.peak - eq);
        stats.close = eq;
    }
    stats
}

/// Running peak, low and giveback of an equity stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DrawdownTracker {
    peak: Option<f64>,
    low: Option<f64>,
    max_giveback: f64,
}

impl DrawdownTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, equity: f64) {
        let peak = self.peak.map_or(equity, |p| p.max(equity));
        self.peak = Some(peak);
        self.low = Some(self.low.map_or(equity, |l| l.min(equity)));
        self.max_giveback = self.max_giveback.max(peak - equity);
    }

    pub fn peak(&self) -> Option<f64> {
        self.peak
    }

    pub fn low(&self) -> Option<f64> {
        self.low
    }

    /// Largest peak-to-current decline observed. Never negative.
    pub fn giveback(&self) -> f64 {
        self.max_giveback
    }

    /// How far the stream sank below zero. Never negative.
    pub fn baseline_underwater(&self) -> f64 {
        self.low.map_or(0.0, |l| (-l).max(0.0))
    }
}

/// Aggregate statistics over a multi-week run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub weeks: usize,
    pub total_return_pct: f64,
    pub avg_week_return_pct: f64,
    pub win_rate_pct: f64,
    pub best_week_return_pct: f64,
    pub worst_week_return_pct: f64,
    pub avg_left_on_table_pct: f64,
    pub worst_left_on_table_pct: f64,
    pub avg_week_underwater_dd_pct: f64,
    pub worst_week_underwater_dd_pct: f64,
    pub avg_week_giveback_dd_pct: f64,
    pub worst_week_giveback_dd_pct: f64,
    /// `max(0, -lowest equity)` across the whole run.
    pub overall_baseline_underwater_dd_pct: f64,
    /// Largest peak-to-current equity decline across the whole run.
    pub overall_peak_to_now_giveback_dd_pct: f64,
    pub close_counts: CloseCounts,
    pub coverage: LegCoverage,
    pub emergency_weeks: usize,
}

impl RunSummary {
    /// Summarize week records plus the run-wide equity tracker.
    pub fn compute(weeks: &[WeekMetrics], overall: &DrawdownTracker) -> Self {
        let returns: Vec<f64> = weeks.iter().map(|w| w.return_pct).collect();
        let left: Vec<f64> = weeks.iter().map(|w| w.left_on_table_pct).collect();
        let underwater: Vec<f64> = weeks.iter().map(|w| w.underwater_dd_pct).collect();
        let giveback: Vec<f64> = weeks.iter().map(|w| w.giveback_dd_pct).collect();

        let mut close_counts = CloseCounts::default();
        let mut coverage = LegCoverage::default();
        for w in weeks {
            close_counts.merge(&w.close_counts);
            coverage.merge(&w.coverage);
        }

        Self {
            weeks: weeks.len(),
            total_return_pct: returns.iter().sum(),
            avg_week_return_pct: mean(&returns),
            win_rate_pct: win_rate_pct(&returns),
            best_week_return_pct: max_or_zero(&returns),
            worst_week_return_pct: min_or_zero(&returns),
            avg_left_on_table_pct: mean(&left),
            worst_left_on_table_pct: max_or_zero(&left),
            avg_week_underwater_dd_pct: mean(&underwater),
            worst_week_underwater_dd_pct: max_or_zero(&underwater),
            avg_week_giveback_dd_pct: mean(&giveback),
            worst_week_giveback_dd_pct: max_or_zero(&giveback),
            overall_baseline_underwater_dd_pct: overall.baseline_underwater(),
            overall_peak_to_now_giveback_dd_pct: overall.giveback(),
            close_counts,
            coverage,
            emergency_weeks: weeks.iter().filter(|w| w.emergency_triggered).count(),
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Portion of the week's best profit surrendered by week end. Never negative.
pub fn left_on_table(peak_profit: f64, end_profit: f64) -> f64 {
    (peak_profit - end_profit).max(0.0)
}

/// Deepest point below `baseline` in a curve. Never negative.
pub fn underwater_dd(baseline: f64, points: &[EquityPoint]) -> f64 {
    points
        .iter()
        .map(|p| baseline - p.equity_pct)
        .filter(|d| d.is_finite())
        .fold(0.0, f64::max)
}

/// Arithmetic mean; 0.0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Share of strictly positive values, in percent.
pub fn win_rate_pct(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().filter(|v| **v > 0.0).count() as f64 * 100.0 / values.len() as f64
}

fn max_or_zero(values: &[f64]) -> f64 {
    values.iter().copied().reduce(f64::max).unwrap_or(0.0)
}

fn min_or_zero(values: &[f64]) -> f64 {
    values.iter().copied().reduce(f64::min).unwrap_or(0.0)
}
