//! Adaptive trail calibration and the trailing lock ratchet.
//!
//! **Core Rule:** once armed, a lock may rise but never fall within a week.

use serde::{Deserialize, Serialize};

use super::config::{positive, ConfigError, TrailPolicy};

/// This week's trailing thresholds, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrailThresholds {
    /// Profit at which the lock arms.
    pub start_pct: f64,
    /// Distance kept between the running peak and the lock.
    pub offset_pct: f64,
}

/// Parameters for calibrating thresholds from past weekly peaks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveTrailParams {
    pub start_multiplier: f64,
    pub offset_fraction: f64,
    pub min_start_pct: f64,
    pub max_start_pct: f64,
    pub min_offset_pct: f64,
    pub max_offset_pct: f64,
    /// Thresholds for the first week, before any history exists.
    pub warmup_start_pct: f64,
    pub warmup_offset_pct: f64,
}

impl Default for AdaptiveTrailParams {
    fn default() -> Self {
        Self {
            start_multiplier: 0.65,
            offset_fraction: 0.25,
            min_start_pct: 30.0,
            max_start_pct: 130.0,
            min_offset_pct: 8.0,
            max_offset_pct: 45.0,
            warmup_start_pct: 30.0,
            warmup_offset_pct: 10.0,
        }
    }
}

impl AdaptiveTrailParams {
    /// Tighter preset: arms earlier, keeps less room.
    pub fn conservative() -> Self {
        Self {
            start_multiplier: 0.35,
            offset_fraction: 0.35,
            min_start_pct: 20.0,
            max_start_pct: 90.0,
            min_offset_pct: 6.0,
            max_offset_pct: 35.0,
            warmup_start_pct: 30.0,
            warmup_offset_pct: 10.0,
        }
    }

    /// Derive this week's thresholds.
    ///
    /// `history` holds `max(0, peak profit)` of each closed week. With no
    /// history the warm-up constants are used; otherwise
    /// `start = clamp(mean * multiplier, min_start, max_start)` and
    /// `offset = clamp(start * fraction, min_offset, max_offset)`.
    pub fn calibrate(&self, history: &[f64]) -> TrailThresholds {
        if history.is_empty() {
            return TrailThresholds {
                start_pct: self.warmup_start_pct,
                offset_pct: self.warmup_offset_pct,
            };
        }
        let mean = history.iter().sum::<f64>() / history.len() as f64;
        let start_pct = bound(mean * self.start_multiplier, self.min_start_pct, self.max_start_pct);
        let offset_pct =
            bound(start_pct * self.offset_fraction, self.min_offset_pct, self.max_offset_pct);
        TrailThresholds { start_pct, offset_pct }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("trail.start_multiplier", self.start_multiplier)?;
        positive("trail.offset_fraction", self.offset_fraction)?;
        positive("trail.min_start_pct", self.min_start_pct)?;
        positive("trail.min_offset_pct", self.min_offset_pct)?;
        positive("trail.warmup_start_pct", self.warmup_start_pct)?;
        positive("trail.warmup_offset_pct", self.warmup_offset_pct)?;
        if self.min_start_pct > self.max_start_pct {
            return Err(ConfigError::InvertedBounds {
                field: "trail.start_pct",
                min: self.min_start_pct,
                max: self.max_start_pct,
            });
        }
        if self.min_offset_pct > self.max_offset_pct {
            return Err(ConfigError::InvertedBounds {
                field: "trail.offset_pct",
                min: self.min_offset_pct,
                max: self.max_offset_pct,
            });
        }
        Ok(())
    }
}

/// Clamp without panicking on unvalidated bounds (the lower bound wins).
fn bound(value: f64, min: f64, max: f64) -> f64 {
    value.min(max).max(min)
}

impl TrailPolicy {
    /// Thresholds for the coming week, `None` when trailing is off.
    pub fn thresholds(&self, history: &[f64]) -> Option<TrailThresholds> {
        match self {
            TrailPolicy::Adaptive(params) => Some(params.calibrate(history)),
            TrailPolicy::Fixed { start_pct, offset_pct } => Some(TrailThresholds {
                start_pct: *start_pct,
                offset_pct: *offset_pct,
            }),
            TrailPolicy::Disabled => None,
        }
    }
}

/// Ratcheting lock level.
///
/// Unarmed until the tracked value first reaches the start threshold. After
/// that, each observation proposes `value - offset` and the lock keeps the max.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TrailLock {
    level: Option<f64>,
}

impl TrailLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume a lock persisted on a position.
    pub fn from_level(level: Option<f64>) -> Self {
        Self { level }
    }

    /// Feed one observation. Arms or raises the lock when `value >= start`.
    pub fn observe(&mut self, value: f64, thresholds: &TrailThresholds) -> Option<f64> {
        if value >= thresholds.start_pct {
            let proposed = value - thresholds.offset_pct;
            self.level = Some(self.level.map_or(proposed, |current| current.max(proposed)));
        }
        self.level
    }

    /// True once armed and `value` has fallen to or below the lock.
    pub fn is_breached(&self, value: f64) -> bool {
        self.level.is_some_and(|lock| value <= lock)
    }

    pub fn level(&self) -> Option<f64> {
        self.level
    }
}
