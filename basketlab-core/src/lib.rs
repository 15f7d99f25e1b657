//! BasketLab Core — signal aggregation, netting, tiering and the weekly
//! basket lifecycle engine.
//!
//! This crate contains the simulation itself:
//! - Domain types (asset classes, models, structured keys, price series, positions)
//! - Signal aggregation from model snapshots, pair netting and tier voting
//! - Desired-book construction for hedged, net and tiered position modes
//! - The week-by-week lifecycle with stops, trailing locks and emergency flattening
//! - Adaptive trail calibration from past weekly peaks
//! - Equity curve and drawdown analytics
//! - Week anchoring and duplicate-week resolution
//! - Lot-map sizing and margin normalization
//!
//! Storage and price feeds are collaborator traits in [`data`]; nothing here
//! performs I/O.

pub mod analytics;
pub mod data;
pub mod domain;
pub mod engine;
pub mod signals;
pub mod sizing;
pub mod week;
