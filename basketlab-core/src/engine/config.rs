//! Policy configuration for one variant of the lifecycle engine.
//!
//! Every behavioral difference between policy variants is a field here, never
//! a code branch in the caller. All thresholds are in percent of account
//! (equity) or percent of price (unit moves), matching the metrics they gate.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use super::trail::AdaptiveTrailParams;
use crate::domain::{AssetClass, Tier};
use crate::signals::DesiredPosition;

/// Invalid numeric configuration. Fatal at run start.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{field} must be finite and > 0, got {value}")]
    NotPositive { field: &'static str, value: f64 },

    #[error("{field} must be finite and >= 0, got {value}")]
    Negative { field: &'static str, value: f64 },

    #[error("{field} must be within [{min}, {max}], got {value}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("{field}: lower bound {min} exceeds upper bound {max}")]
    InvertedBounds { field: &'static str, min: f64, max: f64 },

    #[error("invalid scale-out time {hour:02}:{minute:02} ET")]
    InvalidTime { hour: u32, minute: u32 },

    #[error("invalid scale-out pause {start:02}:00-{end:02}:00 ET")]
    InvalidPause { start: u32, end: u32 },
}

/// Price at which a stop-triggered close is booked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StopFill {
    /// Book exactly the threshold loss, even when the observed move gapped past it.
    #[default]
    AtThreshold,
    /// Book the observed move.
    AtMark,
}

/// How the week's trailing thresholds are chosen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrailPolicy {
    /// Calibrated each week from the history of weekly peaks.
    Adaptive(AdaptiveTrailParams),
    /// Same thresholds every week.
    Fixed { start_pct: f64, offset_pct: f64 },
    Disabled,
}

impl Default for TrailPolicy {
    fn default() -> Self {
        TrailPolicy::Adaptive(AdaptiveTrailParams::default())
    }
}

/// The value compared against the trailing thresholds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrailTrigger {
    /// Weekly basket profit.
    #[default]
    NetPeak,
    /// Floating profit of currently winning positions only.
    WinnersPeak,
    /// Winners' floating profit, but only fire while weekly profit is at
    /// least `gate_fraction * trail_start`.
    WinnersPeakWithNetGate { gate_fraction: f64 },
}

/// Whether the trail watches the whole basket or each position on its own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrailScope {
    /// One lock on the basket; a breach closes every winner once per week.
    #[default]
    Basket,
    /// A lock per position on its unit move; a breach closes that position.
    Position,
}

/// What happens to losing positions at the end of the week.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoserCarry {
    /// Only winners are force-closed on Friday; losers carry into next week.
    #[default]
    HoldLosers,
    /// Every priced position is closed on Friday.
    CloseAllWeekly,
}

/// Weekly basket take-profit / stop-loss on weekly profit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BasketTargets {
    pub take_profit_pct: f64,
    pub stop_loss_pct: f64,
}

impl Default for BasketTargets {
    fn default() -> Self {
        Self {
            take_profit_pct: 6.0,
            stop_loss_pct: 3.0,
        }
    }
}

/// What `close_fraction` of a scale-out is measured against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScaleOutBasis {
    /// A fraction of the size still open.
    #[default]
    Remaining,
    /// A fixed slice of the original size, until nothing is left.
    Original,
}

/// When scheduled scale-outs fire, on the New York clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScaleOutCadence {
    /// Monday through Friday at one fixed time.
    Daily { hour_et: u32, minute_et: u32 },
    /// Every hour on the hour after the week open, skipping
    /// `[pause_start_hour_et, pause_end_hour_et)` each day. Friday ends at
    /// the pause.
    Hourly {
        pause_start_hour_et: u32,
        pause_end_hour_et: u32,
    },
}

impl Default for ScaleOutCadence {
    fn default() -> Self {
        ScaleOutCadence::Daily {
            hour_et: 16,
            minute_et: 30,
        }
    }
}

/// Scheduled partial closes during the week.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaleOutSchedule {
    /// Size closed at each event, per `fraction_of`.
    pub close_fraction: f64,
    pub fraction_of: ScaleOutBasis,
    /// Only trim positions that are in profit at the event.
    pub winners_only: bool,
    pub cadence: ScaleOutCadence,
}

impl Default for ScaleOutSchedule {
    fn default() -> Self {
        Self {
            close_fraction: 0.20,
            fraction_of: ScaleOutBasis::Remaining,
            winners_only: true,
            cadence: ScaleOutCadence::default(),
        }
    }
}

/// Add to losing positions at the start of the week.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoserAddPolicy {
    pub max_adds: u32,
    /// Largest single add, as a fraction of original size.
    pub add_cap: f64,
    /// Upper bound on a position's total size.
    pub target_cap: f64,
}

impl Default for LoserAddPolicy {
    fn default() -> Self {
        Self {
            max_adds: 1,
            add_cap: 0.5,
            target_cap: 2.0,
        }
    }
}

/// Full policy for one variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Close a position once its unit move reaches `-hard_stop_move_pct`.
    pub hard_stop_move_pct: f64,
    pub stop_fill: StopFill,
    /// Flatten everything once account equity reaches `-emergency_baseline_stop_pct`.
    pub emergency_baseline_stop_pct: f64,
    /// After an emergency flatten, open nothing for the rest of the run.
    pub emergency_blocks_new_opens: bool,
    pub trail: TrailPolicy,
    pub trail_trigger: TrailTrigger,
    pub trail_scope: TrailScope,
    pub loser_carry: LoserCarry,
    pub basket_targets: Option<BasketTargets>,
    /// Close a position once its equity contribution reaches `-per_trade_stop_pct`.
    pub per_trade_stop_pct: Option<f64>,
    pub scale_out: Option<ScaleOutSchedule>,
    /// Risk multiplier per tier (tier 1, 2, 3). Untiered positions use 1.0.
    pub tier_weights: [f64; 3],
    /// Risk multiplier per asset class. Missing classes use 1.0.
    pub asset_risk_scale: BTreeMap<AssetClass, f64>,
    pub loser_adds: Option<LoserAddPolicy>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            hard_stop_move_pct: 10.0,
            stop_fill: StopFill::AtThreshold,
            emergency_baseline_stop_pct: 30.0,
            emergency_blocks_new_opens: false,
            trail: TrailPolicy::default(),
            trail_trigger: TrailTrigger::NetPeak,
            trail_scope: TrailScope::Basket,
            loser_carry: LoserCarry::HoldLosers,
            basket_targets: None,
            per_trade_stop_pct: None,
            scale_out: None,
            tier_weights: [1.0, 1.0, 1.0],
            asset_risk_scale: BTreeMap::new(),
            loser_adds: None,
        }
    }
}

impl PolicyConfig {
    /// Check every numeric threshold.
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("hard_stop_move_pct", self.hard_stop_move_pct)?;
        positive("emergency_baseline_stop_pct", self.emergency_baseline_stop_pct)?;

        match &self.trail {
            TrailPolicy::Adaptive(params) => params.validate()?,
            TrailPolicy::Fixed { start_pct, offset_pct } => {
                positive("trail.start_pct", *start_pct)?;
                positive("trail.offset_pct", *offset_pct)?;
            }
            TrailPolicy::Disabled => {}
        }

        if let TrailTrigger::WinnersPeakWithNetGate { gate_fraction } = self.trail_trigger {
            within("trail_trigger.gate_fraction", gate_fraction, 0.0, 1.0)?;
        }

        if let Some(targets) = &self.basket_targets {
            positive("basket_targets.take_profit_pct", targets.take_profit_pct)?;
            positive("basket_targets.stop_loss_pct", targets.stop_loss_pct)?;
        }

        if let Some(stop) = self.per_trade_stop_pct {
            positive("per_trade_stop_pct", stop)?;
        }

        if let Some(schedule) = &self.scale_out {
            positive("scale_out.close_fraction", schedule.close_fraction)?;
            within("scale_out.close_fraction", schedule.close_fraction, 0.0, 1.0)?;
            match schedule.cadence {
                ScaleOutCadence::Daily { hour_et, minute_et } if hour_et > 23 || minute_et > 59 => {
                    return Err(ConfigError::InvalidTime {
                        hour: hour_et,
                        minute: minute_et,
                    });
                }
                ScaleOutCadence::Hourly {
                    pause_start_hour_et: start,
                    pause_end_hour_et: end,
                } if start > end || end > 24 => {
                    return Err(ConfigError::InvalidPause { start, end });
                }
                _ => {}
            }
        }

        for weight in self.tier_weights {
            non_negative("tier_weights", weight)?;
        }
        for scale in self.asset_risk_scale.values() {
            non_negative("asset_risk_scale", *scale)?;
        }

        if let Some(adds) = &self.loser_adds {
            positive("loser_adds.add_cap", adds.add_cap)?;
            if !adds.target_cap.is_finite() || adds.target_cap < 1.0 {
                return Err(ConfigError::OutOfRange {
                    field: "loser_adds.target_cap",
                    value: adds.target_cap,
                    min: 1.0,
                    max: f64::INFINITY,
                });
            }
        }

        Ok(())
    }

    pub fn tier_weight(&self, tier: Option<Tier>) -> f64 {
        tier.map_or(1.0, |t| self.tier_weights[t.index()])
    }

    pub fn asset_scale(&self, asset_class: AssetClass) -> f64 {
        self.asset_risk_scale.get(&asset_class).copied().unwrap_or(1.0)
    }

    /// Risk multiplier for a newly opened position.
    pub fn position_weight(&self, desired: &DesiredPosition) -> f64 {
        desired.units
            * self.tier_weight(desired.tier)
            * self.asset_scale(desired.key.symbol.asset_class)
    }
}

pub(crate) fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NotPositive { field, value })
    }
}

pub(crate) fn non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Negative { field, value })
    }
}

pub(crate) fn within(
    field: &'static str,
    value: f64,
    min: f64,
    max: f64,
) -> Result<(), ConfigError> {
    if value.is_finite() && value >= min && value <= max {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange { field, value, min, max })
    }
}
