use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One close observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub ts: DateTime<Utc>,
    pub close: f64,
}

/// Read-only price path for one symbol over one trading week.
///
/// Points are kept sorted by timestamp so lookups can binary search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolSeries {
    pub open_price: f64,
    pub points: Vec<SeriesPoint>,
}

impl SymbolSeries {
    /// Build a series, sorting points and dropping non-finite or non-positive closes.
    pub fn new(open_price: f64, mut points: Vec<SeriesPoint>) -> Self {
        points.retain(|p| p.close.is_finite() && p.close > 0.0);
        points.sort_by_key(|p| p.ts);
        Self { open_price, points }
    }

    /// A usable series has a positive open price.
    pub fn is_tradable(&self) -> bool {
        self.open_price.is_finite() && self.open_price > 0.0
    }

    /// Latest close at or before `ts`, if any.
    pub fn latest_close(&self, ts: DateTime<Utc>) -> Option<f64> {
        let idx = self.points.partition_point(|p| p.ts <= ts);
        if idx == 0 {
            None
        } else {
            Some(self.points[idx - 1].close)
        }
    }

    pub fn last_close(&self) -> Option<f64> {
        self.points.last().map(|p| p.close)
    }

    /// Open-to-last-close move in percent.
    pub fn week_return_pct(&self) -> Option<f64> {
        if !self.is_tradable() {
            return None;
        }
        self.last_close()
            .map(|close| (close - self.open_price) / self.open_price * 100.0)
    }
}
