//! Week records emitted by the lifecycle engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analytics::EquityPoint;

/// Why a position (or part of one) was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CloseReason {
    /// No longer desired, or desired on the other side. Closed at the week-open price.
    Flip,
    HardStop,
    PerTradeStop,
    EmergencyStop,
    TrailingLock,
    BasketTarget,
    ScaleOut,
    FridayClose,
}

/// Close events per reason, plus loser adds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseCounts {
    pub flip: u32,
    pub hard_stop: u32,
    pub per_trade_stop: u32,
    pub emergency_stop: u32,
    pub trailing_lock: u32,
    pub basket_target: u32,
    pub scale_out: u32,
    pub friday_close: u32,
    pub loser_adds: u32,
}

impl CloseCounts {
    pub fn record(&mut self, reason: CloseReason) {
        let slot = match reason {
            CloseReason::Flip => &mut self.flip,
            CloseReason::HardStop => &mut self.hard_stop,
            CloseReason::PerTradeStop => &mut self.per_trade_stop,
            CloseReason::EmergencyStop => &mut self.emergency_stop,
            CloseReason::TrailingLock => &mut self.trailing_lock,
            CloseReason::BasketTarget => &mut self.basket_target,
            CloseReason::ScaleOut => &mut self.scale_out,
            CloseReason::FridayClose => &mut self.friday_close,
        };
        *slot += 1;
    }

    pub fn get(&self, reason: CloseReason) -> u32 {
        match reason {
            CloseReason::Flip => self.flip,
            CloseReason::HardStop => self.hard_stop,
            CloseReason::PerTradeStop => self.per_trade_stop,
            CloseReason::EmergencyStop => self.emergency_stop,
            CloseReason::TrailingLock => self.trailing_lock,
            CloseReason::BasketTarget => self.basket_target,
            CloseReason::ScaleOut => self.scale_out,
            CloseReason::FridayClose => self.friday_close,
        }
    }

    pub fn merge(&mut self, other: &CloseCounts) {
        self.flip += other.flip;
        self.hard_stop += other.hard_stop;
        self.per_trade_stop += other.per_trade_stop;
        self.emergency_stop += other.emergency_stop;
        self.trailing_lock += other.trailing_lock;
        self.basket_target += other.basket_target;
        self.scale_out += other.scale_out;
        self.friday_close += other.friday_close;
        self.loser_adds += other.loser_adds;
    }
}

/// How much of the desired book actually traded this week.
///
/// Unsized legs (no price series) are counted, never silently dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegCoverage {
    pub desired: u32,
    pub opened: u32,
    pub carried: u32,
    /// Open positions with a usable series this week.
    pub priced: u32,
    /// Desired or carried positions without a usable series.
    pub unpriced: u32,
    /// Opens skipped because an emergency stop blocks new positions.
    pub blocked: u32,
}

impl LegCoverage {
    pub fn merge(&mut self, other: &LegCoverage) {
        self.desired += other.desired;
        self.opened += other.opened;
        self.carried += other.carried;
        self.priced += other.priced;
        self.unpriced += other.unpriced;
        self.blocked += other.blocked;
    }
}

/// One simulated week for one policy variant. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekMetrics {
    pub week_open_utc: DateTime<Utc>,
    pub week_label: String,
    pub trail_start_pct: Option<f64>,
    pub trail_offset_pct: Option<f64>,
    /// Account equity at the week's first tick, after flips and opens.
    /// Weekly profit figures are measured from here.
    pub start_equity_pct: f64,
    pub end_equity_pct: f64,
    /// Change in account equity since the previous week's close.
    pub return_pct: f64,
    /// Best weekly profit seen, relative to the start baseline.
    pub peak_profit_pct: f64,
    pub end_profit_pct: f64,
    pub left_on_table_pct: f64,
    pub underwater_dd_pct: f64,
    pub giveback_dd_pct: f64,
    pub close_counts: CloseCounts,
    pub coverage: LegCoverage,
    pub emergency_triggered: bool,
    pub invariant_violations: u32,
    /// Margin used by the opened book, when a lot map is available.
    pub margin_used_usd: Option<f64>,
    pub equity_curve: Vec<EquityPoint>,
}

impl WeekMetrics {
    /// Uniformly rescale every percent figure, e.g. for margin normalization.
    pub fn scaled(&self, factor: f64) -> Self {
        let scale = |v: f64| v * factor;
        Self {
            start_equity_pct: scale(self.start_equity_pct),
            end_equity_pct: scale(self.end_equity_pct),
            return_pct: scale(self.return_pct),
            peak_profit_pct: scale(self.peak_profit_pct),
            end_profit_pct: scale(self.end_profit_pct),
            left_on_table_pct: scale(self.left_on_table_pct),
            underwater_dd_pct: scale(self.underwater_dd_pct),
            giveback_dd_pct: scale(self.giveback_dd_pct),
            margin_used_usd: self.margin_used_usd.map(scale),
            equity_curve: self
                .equity_curve
                .iter()
                .map(|p| EquityPoint {
                    ts: p.ts,
                    equity_pct: scale(p.equity_pct),
                    lock_pct: p.lock_pct.map(scale),
                })
                .collect(),
            ..self.clone()
        }
    }
}
