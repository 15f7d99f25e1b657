//! Weekly position lifecycle.
//!
//! One call to [`EngineState::simulate_week`] advances the carried positions
//! through one trading week:
//!
//! 1. Week open: close positions that are no longer desired (or flipped) at
//!    the week-open price, then open newly desired ones at that price.
//! 2. Calibrate trailing thresholds from past weekly peaks. They stay fixed
//!    for the rest of the week.
//! 3. Optional loser adds at the first timestamp. Weekly profit is measured
//!    from equity at that timestamp.
//! 4. For every timestamp in ascending order:
//!    a. hard stops (and per-trade stops)
//!    b. floating P&L and equity
//!    c. emergency stop
//!    d. weekly peak, giveback and underwater trackers
//!    e. trailing lock
//!    then basket targets and scheduled scale-outs. Once a timestamp's
//!    closes are done the book must still mark to the equity seen in (b).
//! 5. Friday close of winners, or of everything when losers are not carried.
//!
//! The order inside step 4 changes outcomes and must not be rearranged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, warn};

use super::config::{
    LoserCarry, PolicyConfig, ScaleOutBasis, ScaleOutCadence, ScaleOutSchedule, StopFill,
    TrailScope, TrailTrigger,
};
use super::report::{CloseCounts, CloseReason, LegCoverage, WeekMetrics};
use super::state::{mark, EngineState, WeekSeries};
use super::trail::{TrailLock, TrailThresholds};
use crate::analytics::{left_on_table, DrawdownTracker, EquityPoint, RunSummary};
use crate::domain::{Position, PositionKey};
use crate::signals::DesiredBook;
use crate::week::{hourly_events_et, week_label, weekday_events_et};

/// Everything the lifecycle needs to know about one week.
#[derive(Debug, Clone, Copy)]
pub struct WeekInput<'a> {
    pub week_open_utc: DateTime<Utc>,
    pub desired: &'a DesiredBook,
    pub series: &'a WeekSeries,
}

/// Weekly metrics of a whole run plus its summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub weeks: Vec<WeekMetrics>,
    pub summary: RunSummary,
}

/// Simulate `weeks` in order from a fresh state.
pub fn run_weeks(policy: &PolicyConfig, weeks: &[WeekInput<'_>]) -> RunResult {
    let mut state = EngineState::new();
    let metrics: Vec<WeekMetrics> = weeks
        .iter()
        .map(|input| state.simulate_week(policy, input))
        .collect();
    let summary = RunSummary::compute(&metrics, state.overall());
    RunResult {
        weeks: metrics,
        summary,
    }
}

impl EngineState {
    /// Simulate one week and return its metrics.
    pub fn simulate_week(&mut self, policy: &PolicyConfig, input: &WeekInput<'_>) -> WeekMetrics {
        let series = input.series;
        let mut counts = CloseCounts::default();
        let mut coverage = LegCoverage {
            desired: input.desired.len() as u32,
            ..LegCoverage::default()
        };

        // ─── Phase 1: Week open ─────────────────────────────────────
        self.close_flips(input, &mut counts);
        self.open_desired(policy, input, &mut coverage);
        let mut violations = self.enforce_invariants(input.desired);
        for p in self.positions.values_mut() {
            p.trail_lock = None;
        }
        for p in self.positions.values() {
            let has_path = series.get(&p.key.symbol).is_some_and(|s| !s.points.is_empty());
            if has_path {
                coverage.priced += 1;
            } else {
                coverage.unpriced += 1;
            }
        }

        let timeline = self.timeline(series);
        let first_ts = timeline.first().copied();
        // Baseline: equity at the first tick, after flips and opens.
        let start_equity = first_ts.map_or(self.realized_pct, |ts| self.equity_at(series, ts));

        // ─── Phase 2: Calibration ───────────────────────────────────
        let thresholds = policy.trail.thresholds(&self.peak_history);

        // ─── Phase 3: Loser adds ────────────────────────────────────
        if let (Some(adds), Some(ts)) = (policy.loser_adds, first_ts) {
            let target = adds.target_cap.min((1.0 + start_equity / 100.0).max(1.0));
            for p in self.positions.values_mut() {
                if p.add_count >= adds.max_adds {
                    continue;
                }
                let Some(close) = series.get(&p.key.symbol).and_then(|s| s.latest_close(ts)) else {
                    continue;
                };
                if p.unit_move_pct(close).map_or(true, |u| u >= 0.0) {
                    continue;
                }
                let needed = (target - p.remaining).max(0.0);
                if needed > 0.0 && p.add_at(needed.min(adds.add_cap), target, close) > 0.0 {
                    counts.loser_adds += 1;
                }
            }
        }

        // ─── Phase 4: Intraweek path ────────────────────────────────
        let hard_stop = policy.hard_stop_move_pct.abs();
        let emergency_stop = policy.emergency_baseline_stop_pct.abs();
        let stop_fill = policy.stop_fill;
        let events = policy
            .scale_out
            .map(|s| scale_out_events(s.cadence, input.week_open_utc))
            .unwrap_or_default();

        let mut next_event = 0;
        let mut week_dd = DrawdownTracker::new();
        let mut peak_profit: Option<f64> = None;
        let mut underwater = 0.0_f64;
        let mut basket_lock = TrailLock::new();
        let mut trail_fired = false;
        let mut basket_closed = false;
        let mut emergency_this_week = false;
        let mut curve = Vec::with_capacity(timeline.len());

        for &ts in &timeline {
            // (a) Hard stops, then per-trade stops
            self.close_where(series, ts, CloseReason::HardStop, &mut counts, |p, u| {
                (u <= -hard_stop).then(|| match stop_fill {
                    StopFill::AtThreshold => p.contribution(-hard_stop),
                    StopFill::AtMark => p.contribution(u),
                })
            });
            if let Some(limit) = policy.per_trade_stop_pct {
                let limit = limit.abs();
                self.close_where(series, ts, CloseReason::PerTradeStop, &mut counts, |p, u| {
                    let pnl = p.contribution(u);
                    (pnl <= -limit).then_some(match stop_fill {
                        StopFill::AtThreshold => -limit,
                        StopFill::AtMark => pnl,
                    })
                });
            }

            // (b) Floating P&L and equity
            let (floating, winners_floating) = self.mark_to_market(series, ts);
            let equity = self.realized_pct + floating;

            // (c) Emergency stop
            if equity <= -emergency_stop {
                let flattened = self.close_where(
                    series,
                    ts,
                    CloseReason::EmergencyStop,
                    &mut counts,
                    |p, u| Some(p.contribution(u)),
                );
                if flattened > 0 {
                    warn!(
                        week = %input.week_open_utc,
                        %ts,
                        equity,
                        flattened,
                        "emergency stop flattened the book"
                    );
                }
                self.emergency_triggered = true;
                emergency_this_week = true;
            }

            // (d) Weekly trackers
            let week_profit = equity - start_equity;
            peak_profit = Some(peak_profit.map_or(week_profit, |p| p.max(week_profit)));
            week_dd.observe(equity);
            underwater = underwater.max(-week_profit);

            // (e) Trailing lock
            if let Some(th) = thresholds {
                match policy.trail_scope {
                    TrailScope::Basket if !trail_fired => {
                        let (trigger, gate_open) = match policy.trail_trigger {
                            TrailTrigger::NetPeak => (week_profit, true),
                            TrailTrigger::WinnersPeak => (winners_floating, true),
                            TrailTrigger::WinnersPeakWithNetGate { gate_fraction } => {
                                (winners_floating, week_profit >= th.start_pct * gate_fraction)
                            }
                        };
                        basket_lock.observe(trigger, &th);
                        if gate_open && basket_lock.is_breached(trigger) {
                            self.close_where(
                                series,
                                ts,
                                CloseReason::TrailingLock,
                                &mut counts,
                                |p, u| (u > 0.0).then(|| p.contribution(u)),
                            );
                            trail_fired = true;
                        }
                    }
                    TrailScope::Basket => {}
                    TrailScope::Position => self.trail_positions(series, ts, &th, &mut counts),
                }
            }

            if let Some(targets) = policy.basket_targets {
                let hit = week_profit >= targets.take_profit_pct
                    || week_profit <= -targets.stop_loss_pct;
                if !basket_closed && hit {
                    self.close_where(series, ts, CloseReason::BasketTarget, &mut counts, |p, u| {
                        Some(p.contribution(u))
                    });
                    basket_closed = true;
                }
            }

            if let Some(schedule) = &policy.scale_out {
                while next_event < events.len() && ts >= events[next_event] {
                    self.scale_out(series, ts, schedule, &mut counts);
                    next_event += 1;
                }
            }

            if let Err(v) = self.verify_equity(series, ts, equity) {
                warn!(violation = %v, "equity accounting drift");
                violations.push(v);
            }

            self.overall.observe(equity);
            curve.push(EquityPoint {
                ts,
                equity_pct: equity,
                lock_pct: basket_lock.level(),
            });
        }

        // ─── Phase 5: Friday close ──────────────────────────────────
        let end_equity = match timeline.last().copied() {
            Some(last) => {
                let carry = policy.loser_carry;
                self.close_where(
                    series,
                    last,
                    CloseReason::FridayClose,
                    &mut counts,
                    |p, u| match carry {
                        LoserCarry::HoldLosers => (u > 0.0).then(|| p.contribution(u)),
                        LoserCarry::CloseAllWeekly => Some(p.contribution(u)),
                    },
                );
                self.equity_at(series, last)
            }
            None => self.realized_pct,
        };
        self.positions.retain(|_, p| !p.is_exhausted());

        let peak_profit = peak_profit.unwrap_or(0.0);
        let end_profit = end_equity - start_equity;
        let metrics = WeekMetrics {
            week_open_utc: input.week_open_utc,
            week_label: week_label(input.week_open_utc),
            trail_start_pct: thresholds.map(|t| t.start_pct),
            trail_offset_pct: thresholds.map(|t| t.offset_pct),
            start_equity_pct: start_equity,
            end_equity_pct: end_equity,
            return_pct: end_equity - self.last_equity_pct,
            peak_profit_pct: peak_profit,
            end_profit_pct: end_profit,
            left_on_table_pct: left_on_table(peak_profit, end_profit),
            underwater_dd_pct: underwater,
            giveback_dd_pct: week_dd.giveback(),
            close_counts: counts,
            coverage,
            emergency_triggered: emergency_this_week,
            invariant_violations: violations.len() as u32,
            margin_used_usd: None,
            equity_curve: curve,
        };

        self.peak_history.push(peak_profit.max(0.0));
        self.last_equity_pct = end_equity;
        self.weeks_simulated += 1;

        debug!(
            week = %metrics.week_label,
            return_pct = metrics.return_pct,
            peak_profit_pct = metrics.peak_profit_pct,
            open_positions = self.positions.len(),
            "week simulated"
        );
        metrics
    }

    /// Close positions not wanted on their current side, at the week-open price.
    fn close_flips(&mut self, input: &WeekInput<'_>, counts: &mut CloseCounts) {
        let flipped: Vec<PositionKey> = self
            .positions
            .iter()
            .filter(|(key, p)| !input.desired.wants(key, p.side))
            .map(|(key, _)| key.clone())
            .collect();

        for key in flipped {
            let Some(p) = self.positions.remove(&key) else {
                continue;
            };
            let open = input
                .series
                .get(&key.symbol)
                .filter(|s| s.is_tradable())
                .map(|s| s.open_price);
            match open.and_then(|price| p.unit_move_pct(price)) {
                Some(u) => self.realized_pct += p.contribution(u),
                None => warn!(position = %key, "flip close without a week-open price; booked flat"),
            }
            counts.record(CloseReason::Flip);
        }
    }

    /// Open every desired position that is not already held.
    fn open_desired(
        &mut self,
        policy: &PolicyConfig,
        input: &WeekInput<'_>,
        coverage: &mut LegCoverage,
    ) {
        let blocked = self.emergency_triggered && policy.emergency_blocks_new_opens;
        for desired in input.desired.iter() {
            if self.positions.contains_key(&desired.key) {
                coverage.carried += 1;
                continue;
            }
            if blocked {
                coverage.blocked += 1;
                continue;
            }
            let Some(s) = input.series.get(&desired.key.symbol).filter(|s| s.is_tradable()) else {
                warn!(position = %desired.key, "no price series; leg left unpriced");
                coverage.unpriced += 1;
                continue;
            };
            let position = Position::open(
                desired.key.clone(),
                desired.side,
                s.open_price,
                policy.position_weight(desired),
                desired.tier,
                input.week_open_utc,
            );
            self.positions.insert(desired.key.clone(), position);
            coverage.opened += 1;
        }
    }

    /// Sorted union of timestamps across the series of open positions.
    fn timeline(&self, series: &WeekSeries) -> Vec<DateTime<Utc>> {
        let symbols: BTreeSet<_> = self.positions.keys().map(|k| &k.symbol).collect();
        let stamps: BTreeSet<DateTime<Utc>> = symbols
            .into_iter()
            .filter_map(|sym| series.get(sym))
            .flat_map(|s| s.points.iter().map(|p| p.ts))
            .collect();
        stamps.into_iter().collect()
    }

    /// Floating P&L of the book and of its winners. Updates each position's peak move.
    fn mark_to_market(&mut self, series: &WeekSeries, ts: DateTime<Utc>) -> (f64, f64) {
        let mut floating = 0.0;
        let mut winners = 0.0;
        for p in self.positions.values_mut() {
            let Some(u) = mark(series, p, ts) else {
                continue;
            };
            p.trail_peak = p.trail_peak.max(u);
            let pnl = p.contribution(u);
            floating += pnl;
            if u > 0.0 {
                winners += pnl;
            }
        }
        (floating, winners)
    }

    /// Close every priced position for which `rule` returns the P&L to book.
    /// Returns the number closed.
    fn close_where(
        &mut self,
        series: &WeekSeries,
        ts: DateTime<Utc>,
        reason: CloseReason,
        counts: &mut CloseCounts,
        rule: impl Fn(&Position, f64) -> Option<f64>,
    ) -> usize {
        let closing: Vec<(PositionKey, f64)> = self
            .positions
            .values()
            .filter_map(|p| {
                let u = mark(series, p, ts)?;
                rule(p, u).map(|pnl| (p.key.clone(), pnl))
            })
            .collect();

        for (key, pnl) in &closing {
            self.positions.remove(key);
            self.realized_pct += pnl;
            counts.record(reason);
        }
        closing.len()
    }

    /// Per-position trailing: each position ratchets its own lock on its unit move.
    fn trail_positions(
        &mut self,
        series: &WeekSeries,
        ts: DateTime<Utc>,
        thresholds: &TrailThresholds,
        counts: &mut CloseCounts,
    ) {
        let mut closing = Vec::new();
        for p in self.positions.values_mut() {
            let Some(u) = mark(series, p, ts) else {
                continue;
            };
            let mut lock = TrailLock::from_level(p.trail_lock);
            lock.observe(u, thresholds);
            p.trail_lock = lock.level();
            if lock.is_breached(u) {
                closing.push((p.key.clone(), p.contribution(u)));
            }
        }
        for (key, pnl) in closing {
            self.positions.remove(&key);
            self.realized_pct += pnl;
            counts.record(CloseReason::TrailingLock);
        }
    }

    /// Trim positions at one scheduled event, booking the closed slice at the mark.
    fn scale_out(
        &mut self,
        series: &WeekSeries,
        ts: DateTime<Utc>,
        schedule: &ScaleOutSchedule,
        counts: &mut CloseCounts,
    ) {
        let mut exhausted = Vec::new();
        for p in self.positions.values_mut() {
            let Some(u) = mark(series, p, ts) else {
                continue;
            };
            if schedule.winners_only && u <= 0.0 {
                continue;
            }
            let closed = match schedule.fraction_of {
                ScaleOutBasis::Remaining => p.reduce(schedule.close_fraction),
                ScaleOutBasis::Original => p.reduce_size(schedule.close_fraction),
            };
            if closed <= 0.0 {
                continue;
            }
            self.realized_pct += u * closed * p.weight;
            counts.record(CloseReason::ScaleOut);
            if p.is_exhausted() {
                exhausted.push(p.key.clone());
            }
        }
        for key in exhausted {
            self.positions.remove(&key);
        }
    }
}

fn scale_out_events(cadence: ScaleOutCadence, week_open_utc: DateTime<Utc>) -> Vec<DateTime<Utc>> {
    match cadence {
        ScaleOutCadence::Daily { hour_et, minute_et } => {
            weekday_events_et(week_open_utc, hour_et, minute_et)
        }
        ScaleOutCadence::Hourly {
            pause_start_hour_et,
            pause_end_hour_et,
        } => hourly_events_et(week_open_utc, pause_start_hour_et, pause_end_hour_et),
    }
}
