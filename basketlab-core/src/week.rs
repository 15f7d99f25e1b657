//! Canonical week anchors and duplicate-week resolution.
//!
//! A trading week is keyed by Sunday 19:00 America/New_York, stored in UTC.
//! Older data used Sunday 17:00 ET or Monday 00:00 ET; both collapse onto the
//! same canonical anchor. When several stored keys map to one canonical week,
//! [`pick_best`] chooses the most complete one with a total, deterministic order.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::America::New_York;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Canonical week open hour, New York clock.
pub const WEEK_OPEN_HOUR_ET: u32 = 19;

/// Canonical anchor for a stored week timestamp.
///
/// Any instant on a New York Sunday maps to that Sunday 19:00 ET; Monday
/// through Saturday map to the preceding Sunday.
pub fn canonical_week_open(ts: DateTime<Utc>) -> DateTime<Utc> {
    let date = ts.with_timezone(&New_York).date_naive();
    sunday_open_utc(sunday_on_or_before(date))
}

/// Anchor of the week in progress at `now`.
///
/// Unlike [`canonical_week_open`], a Sunday before 19:00 ET still belongs to
/// the previous week because the new week has not opened yet.
pub fn current_week_open(now: DateTime<Utc>) -> DateTime<Utc> {
    let local = now.with_timezone(&New_York);
    let sunday = sunday_on_or_before(local.date_naive());
    let open = sunday_open_utc(sunday);
    if now < open {
        sunday_open_utc(sunday - Duration::days(7))
    } else {
        open
    }
}

/// Week that trades a report published on `report_date`: the next Sunday
/// (the same day when it is a Sunday) at 19:00 ET.
pub fn week_open_for_report_date(report_date: NaiveDate) -> DateTime<Utc> {
    let ahead = (7 - report_date.weekday().num_days_from_sunday()) % 7;
    sunday_open_utc(report_date + Duration::days(i64::from(ahead)))
}

/// Display label, e.g. `"Week of Jan 18, 2026"`.
pub fn week_label(week_open_utc: DateTime<Utc>) -> String {
    let local = week_open_utc.with_timezone(&New_York);
    format!("Week of {}", local.format("%b %d, %Y"))
}

/// Monday through Friday at `hour:minute` New York time, for the week opening
/// at `week_open_utc`. Used for scheduled intraweek events.
pub fn weekday_events_et(
    week_open_utc: DateTime<Utc>,
    hour: u32,
    minute: u32,
) -> Vec<DateTime<Utc>> {
    let Some(time) = NaiveTime::from_hms_opt(hour, minute, 0) else {
        return Vec::new();
    };
    let sunday = week_open_utc.with_timezone(&New_York).date_naive();
    (1..=5)
        .filter_map(|day| {
            let local = (sunday + Duration::days(day)).and_time(time);
            New_York
                .from_local_datetime(&local)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc))
        })
        .collect()
}

/// Hour at which the Friday session closes, New York clock.
pub const FRIDAY_CLOSE_HOUR_ET: u32 = 17;

/// Every top of the hour (New York time) after `week_open_utc` through
/// Friday, skipping `[pause_start, pause_end)` each day.
///
/// Friday's events stop at the pause, or at the Friday close when there is
/// no pause. Local times that do not exist on a DST change are skipped.
pub fn hourly_events_et(
    week_open_utc: DateTime<Utc>,
    pause_start: u32,
    pause_end: u32,
) -> Vec<DateTime<Utc>> {
    let sunday = week_open_utc.with_timezone(&New_York).date_naive();
    let paused = |hour: u32| hour >= pause_start && hour < pause_end;
    let friday_end = if pause_start < pause_end {
        pause_start.min(FRIDAY_CLOSE_HOUR_ET)
    } else {
        FRIDAY_CLOSE_HOUR_ET
    };
    (0..=5_i64)
        .flat_map(|day| (0..24_u32).map(move |hour| (day, hour)))
        .filter(|&(day, hour)| !paused(hour) && (day < 5 || hour < friday_end))
        .filter_map(|(day, hour)| {
            let local = (sunday + Duration::days(day)).and_hms_opt(hour, 0, 0)?;
            New_York
                .from_local_datetime(&local)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc))
        })
        .filter(|ts| *ts > week_open_utc)
        .collect()
}

fn sunday_on_or_before(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_sunday()))
}

fn sunday_open_utc(sunday: NaiveDate) -> DateTime<Utc> {
    let local = sunday.and_hms_opt(WEEK_OPEN_HOUR_ET, 0, 0).unwrap_or_default();
    New_York
        .from_local_datetime(&local)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&local))
}

// ─── Duplicate resolution ───────────────────────────────────────────

/// One stored week key with its completeness stats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekCandidate {
    /// Stable row identity; the last tie-breaker.
    pub id: String,
    pub week_open_utc: DateTime<Utc>,
    pub report_date: Option<NaiveDate>,
    pub priced_legs: u32,
    pub total_legs: u32,
    pub created_at: Option<DateTime<Utc>>,
}

impl WeekCandidate {
    pub fn canonical_key(&self) -> DateTime<Utc> {
        canonical_week_open(self.week_open_utc)
    }

    /// Ranking against a requested key. `Greater` means `self` is the better row.
    ///
    /// 1. more priced legs, then more total legs
    /// 2. stored key equal to the requested key
    /// 3. later report date
    /// 4. stored key closer to the requested key
    /// 5. later creation time
    /// 6. larger id
    pub fn rank(&self, other: &Self, requested: DateTime<Utc>) -> Ordering {
        let distance = |c: &Self| (c.week_open_utc - requested).num_seconds().abs();
        let exact = |c: &Self| c.week_open_utc == requested;
        (self.priced_legs, self.total_legs)
            .cmp(&(other.priced_legs, other.total_legs))
            .then_with(|| exact(self).cmp(&exact(other)))
            .then_with(|| self.report_date.cmp(&other.report_date))
            .then_with(|| distance(other).cmp(&distance(self)))
            .then_with(|| self.created_at.cmp(&other.created_at))
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Pick the best row among duplicates for `requested`. Independent of input order.
pub fn pick_best(candidates: &[WeekCandidate], requested: DateTime<Utc>) -> Option<&WeekCandidate> {
    candidates.iter().max_by(|a, b| a.rank(b, requested))
}

/// Collapse candidates to one per canonical week, ascending by week.
pub fn dedupe_weeks(candidates: &[WeekCandidate]) -> Vec<(DateTime<Utc>, WeekCandidate)> {
    let mut by_week: std::collections::BTreeMap<DateTime<Utc>, Vec<&WeekCandidate>> =
        std::collections::BTreeMap::new();
    for c in candidates {
        by_week.entry(c.canonical_key()).or_default().push(c);
    }
    by_week
        .into_iter()
        .filter_map(|(week, group)| {
            group
                .into_iter()
                .max_by(|a, b| a.rank(b, week))
                .map(|best| (week, best.clone()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn anchors_collapse_to_sunday_evening_et() {
        // Sunday 2026-01-18 19:00 EST = 2026-01-19 00:00 UTC.
        let anchor = utc(2026, 1, 19, 0, 0);
        assert_eq!(canonical_week_open(anchor), anchor);
        // Legacy Monday 00:00 ET = 05:00 UTC.
        assert_eq!(canonical_week_open(utc(2026, 1, 19, 5, 0)), anchor);
        // Legacy Sunday 17:00 ET = 22:00 UTC on Sunday.
        assert_eq!(canonical_week_open(utc(2026, 1, 18, 22, 0)), anchor);
        // Friday close.
        assert_eq!(canonical_week_open(utc(2026, 1, 23, 21, 0)), anchor);
    }

    #[test]
    fn summer_anchor_uses_edt() {
        // Sunday 2026-07-12 19:00 EDT = 23:00 UTC.
        assert_eq!(canonical_week_open(utc(2026, 7, 14, 12, 0)), utc(2026, 7, 12, 23, 0));
    }

    #[test]
    fn current_week_rolls_at_open() {
        let anchor = utc(2026, 1, 19, 0, 0);
        assert_eq!(current_week_open(utc(2026, 1, 18, 22, 0)), utc(2026, 1, 12, 0, 0));
        assert_eq!(current_week_open(anchor), anchor);
        assert_eq!(current_week_open(utc(2026, 1, 21, 15, 0)), anchor);
    }

    #[test]
    fn report_date_maps_to_next_sunday() {
        let tue = NaiveDate::from_ymd_opt(2026, 1, 13).unwrap();
        assert_eq!(week_open_for_report_date(tue), utc(2026, 1, 19, 0, 0));
        let sun = NaiveDate::from_ymd_opt(2026, 1, 18).unwrap();
        assert_eq!(week_open_for_report_date(sun), utc(2026, 1, 19, 0, 0));
    }

    #[test]
    fn label_format() {
        assert_eq!(week_label(utc(2026, 1, 19, 0, 0)), "Week of Jan 18, 2026");
    }

    #[test]
    fn weekday_events_are_monday_to_friday() {
        let events = weekday_events_et(utc(2026, 1, 19, 0, 0), 16, 30);
        assert_eq!(events.len(), 5);
        // Monday 16:30 EST = 21:30 UTC.
        assert_eq!(events[0], utc(2026, 1, 19, 21, 30));
        assert_eq!(events[4], utc(2026, 1, 23, 21, 30));
        assert!(weekday_events_et(utc(2026, 1, 19, 0, 0), 25, 0).is_empty());
    }

    #[test]
    fn hourly_events_skip_the_afternoon_pause() {
        let events = hourly_events_et(utc(2026, 1, 19, 0, 0), 16, 20);
        // Sunday 20-23, Monday to Thursday 20 a day, Friday 00-15.
        assert_eq!(events.len(), 100);
        // Sunday 20:00 EST = Monday 01:00 UTC; Friday 15:00 EST = 20:00 UTC.
        assert_eq!(events[0], utc(2026, 1, 19, 1, 0));
        assert_eq!(events[99], utc(2026, 1, 23, 20, 0));
        assert!(!events.contains(&utc(2026, 1, 19, 21, 0)));
        assert!(events.windows(2).all(|w| w[0] < w[1]));

        let unpaused = hourly_events_et(utc(2026, 1, 19, 0, 0), 0, 0);
        assert_eq!(unpaused.len(), 4 + 4 * 24 + 17);
    }

    fn cand(id: &str, ts: DateTime<Utc>, priced: u32, total: u32) -> WeekCandidate {
        WeekCandidate {
            id: id.into(),
            week_open_utc: ts,
            report_date: None,
            priced_legs: priced,
            total_legs: total,
            created_at: None,
        }
    }

    #[test]
    fn most_complete_row_wins() {
        let anchor = utc(2026, 1, 19, 0, 0);
        let rows = vec![
            cand("a", anchor, 10, 40),
            cand("b", utc(2026, 1, 19, 5, 0), 12, 30),
            cand("c", anchor, 12, 28),
        ];
        assert_eq!(pick_best(&rows, anchor).unwrap().id, "b");
    }

    #[test]
    fn exact_key_breaks_score_ties() {
        let anchor = utc(2026, 1, 19, 0, 0);
        let rows = vec![cand("legacy", utc(2026, 1, 19, 5, 0), 5, 5), cand("exact", anchor, 5, 5)];
        assert_eq!(pick_best(&rows, anchor).unwrap().id, "exact");
    }

    #[test]
    fn report_date_then_created_at_then_id() {
        let anchor = utc(2026, 1, 19, 0, 0);
        let mut a = cand("a", anchor, 1, 1);
        let mut b = cand("b", anchor, 1, 1);
        a.report_date = NaiveDate::from_ymd_opt(2026, 1, 13);
        b.report_date = NaiveDate::from_ymd_opt(2026, 1, 12);
        assert_eq!(pick_best(&[b.clone(), a.clone()], anchor).unwrap().id, "a");
        b.report_date = a.report_date;
        b.created_at = Some(utc(2026, 1, 20, 0, 0));
        assert_eq!(pick_best(&[a.clone(), b.clone()], anchor).unwrap().id, "b");
        b.created_at = None;
        assert_eq!(pick_best(&[b, a], anchor).unwrap().id, "b");
    }

    #[test]
    fn dedupe_groups_by_canonical_week() {
        let rows = vec![
            cand("w2", utc(2026, 1, 26, 5, 0), 3, 3),
            cand("w1-legacy", utc(2026, 1, 19, 5, 0), 3, 3),
            cand("w1", utc(2026, 1, 19, 0, 0), 3, 3),
        ];
        let weeks = dedupe_weeks(&rows);
        assert_eq!(weeks.len(), 2);
        assert_eq!(weeks[0].1.id, "w1");
        assert_eq!(weeks[1].0, utc(2026, 1, 26, 0, 0));
    }
}
