//! Week resolution: canonical week keys in range, one stored row each.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use basketlab_core::data::{DataError, SnapshotStore};
use basketlab_core::week::{canonical_week_open, dedupe_weeks, WeekCandidate};

/// A canonical week and the stored row chosen to represent it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedWeek {
    pub week_open_utc: DateTime<Utc>,
    pub source: WeekCandidate,
    /// Number of stored rows that collapsed into this week.
    pub duplicates: usize,
}

/// Canonical weeks from `start` through `end` (inclusive), ascending.
pub fn resolve_weeks(
    store: &dyn SnapshotStore,
    start: DateTime<Utc>,
    end: Option<DateTime<Utc>>,
) -> Result<Vec<ResolvedWeek>, DataError> {
    let start = canonical_week_open(start);
    let end = end.map(canonical_week_open);
    let candidates: Vec<WeekCandidate> = store
        .week_candidates()?
        .into_iter()
        .filter(|c| {
            let week = c.canonical_key();
            week >= start && end.map_or(true, |e| week <= e)
        })
        .collect();

    let weeks: Vec<ResolvedWeek> = dedupe_weeks(&candidates)
        .into_iter()
        .map(|(week_open_utc, source)| ResolvedWeek {
            duplicates: candidates.iter().filter(|c| c.canonical_key() == week_open_utc).count(),
            week_open_utc,
            source,
        })
        .collect();

    debug!(
        store = store.name(),
        candidates = candidates.len(),
        weeks = weeks.len(),
        "weeks resolved"
    );
    Ok(weeks)
}
