//! From model snapshots to desired positions.
//!
//! 1. [`aggregate`]: snapshot rows → flat `BasketSignal` list with neutral placeholders
//! 2. [`netting`]: signals → per-symbol net votes (`PlannedPair`)
//! 3. [`tier`]: voter counts → confidence tier and direction
//! 4. [`desired`]: signals + position mode → the week's desired book

pub mod aggregate;
pub mod desired;
pub mod netting;
pub mod tier;

pub use aggregate::{aggregate_signals, derive_antikythera_v2, BasketSignal};
pub use desired::{build_desired, DesiredBook, DesiredPosition, PositionMode};
pub use netting::{group_signals, GroupOptions, Leg, PlannedPair};
pub use tier::{classify_votes, tally_votes, TierCall, VoteCount};
