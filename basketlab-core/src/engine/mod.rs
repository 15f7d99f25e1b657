//! Weekly basket engine — policy configuration, trailing calibration and the
//! position lifecycle.
//!
//! Each week runs in five phases:
//!
//! 1. Week open: flip closes, then opens at the week-open price
//! 2. Trail calibration from the history of weekly peaks
//! 3. Loser adds at the first timestamp
//! 4. Intraweek path: stops, equity, emergency, trackers, trailing lock
//! 5. Friday close

pub mod config;
pub mod lifecycle;
pub mod report;
pub mod state;
pub mod trail;

pub use config::{
    BasketTargets, ConfigError, LoserAddPolicy, LoserCarry, PolicyConfig, ScaleOutBasis,
    ScaleOutCadence, ScaleOutSchedule, StopFill, TrailPolicy, TrailScope, TrailTrigger,
};
pub use lifecycle::{run_weeks, RunResult, WeekInput};
pub use report::{CloseCounts, CloseReason, LegCoverage, WeekMetrics};
pub use state::{EngineState, InvariantViolation, WeekSeries};
pub use trail::{AdaptiveTrailParams, TrailLock, TrailThresholds};
