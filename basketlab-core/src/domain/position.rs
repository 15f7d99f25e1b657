use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::asset::Side;
use super::keys::PositionKey;
use super::tier::Tier;

/// Sizes at or below this are treated as fully closed.
pub const SIZE_EPSILON: f64 = 1e-9;

/// An open basket position.
///
/// `side` never changes after creation; a direction change closes this
/// position and opens a new one. `remaining` is a fraction of the original
/// size (1.0 = full) and never goes negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub key: PositionKey,
    pub side: Side,
    pub entry_price: f64,
    pub remaining: f64,
    pub add_count: u32,
    /// Risk multiplier: vote units x tier weight x asset risk scale.
    pub weight: f64,
    pub tier: Option<Tier>,
    /// Best unit move seen while open (percent).
    pub trail_peak: f64,
    /// Ratcheted per-position lock, once armed.
    pub trail_lock: Option<f64>,
    pub opened_at: DateTime<Utc>,
}

impl Position {
    pub fn open(
        key: PositionKey,
        side: Side,
        entry_price: f64,
        weight: f64,
        tier: Option<Tier>,
        opened_at: DateTime<Utc>,
    ) -> Self {
        Self {
            key,
            side,
            entry_price,
            remaining: 1.0,
            add_count: 0,
            weight,
            tier,
            trail_peak: 0.0,
            trail_lock: None,
            opened_at,
        }
    }

    /// Signed percent move from entry to `price`, positive when in profit.
    pub fn unit_move_pct(&self, price: f64) -> Option<f64> {
        if self.entry_price <= 0.0 || !price.is_finite() {
            return None;
        }
        Some((price - self.entry_price) / self.entry_price * 100.0 * self.side.sign())
    }

    /// Equity contribution of a given unit move at the current size.
    pub fn contribution(&self, unit_move_pct: f64) -> f64 {
        unit_move_pct * self.remaining * self.weight
    }

    /// Close `fraction` of the remaining size. Returns the size actually closed.
    pub fn reduce(&mut self, fraction: f64) -> f64 {
        let fraction = fraction.clamp(0.0, 1.0);
        let closed = self.remaining * fraction;
        self.remaining = (self.remaining - closed).max(0.0);
        closed
    }

    /// Close `size` of the original size, at most what remains. Returns the
    /// size actually closed.
    pub fn reduce_size(&mut self, size: f64) -> f64 {
        let closed = size.max(0.0).min(self.remaining);
        self.remaining = (self.remaining - closed).max(0.0);
        closed
    }

    /// Grow the position by `size` at `mark_price`, never beyond `cap`.
    ///
    /// The entry price is re-averaged so the floating contribution at
    /// `mark_price` is unchanged by the add. Returns the size added.
    pub fn add_at(&mut self, size: f64, cap: f64, mark_price: f64) -> f64 {
        let target = (self.remaining + size.max(0.0)).min(cap);
        let added = (target - self.remaining).max(0.0);
        if added <= 0.0 || mark_price <= 0.0 || self.entry_price <= 0.0 {
            return 0.0;
        }
        let before = self.remaining;
        let after = before + added;
        let drift = mark_price / self.entry_price - 1.0;
        self.entry_price = mark_price / (1.0 + drift * before / after);
        self.remaining = after;
        self.add_count += 1;
        added
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining <= SIZE_EPSILON
    }
}
