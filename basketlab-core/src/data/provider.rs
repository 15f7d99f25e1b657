//! Collaborator traits and structured data-gap errors.
//!
//! Storage and price access live outside the engine. These traits let the
//! runner plug in a database, a broker client, or an in-memory fixture.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::payload::{parse_pair_details, PairDetail};
use crate::domain::{AssetClass, ModelId, SeriesKey, SymbolKey, SymbolSeries};
use crate::week::WeekCandidate;

/// Data gaps and collaborator failures.
///
/// Inside a week these are recovered locally: the affected leg is treated as
/// unpriced and the simulation continues.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("missing price series for {0}")]
    MissingSeries(SymbolKey),

    #[error("no lot map entry for symbol '{symbol}'")]
    MissingLotEntry { symbol: String },

    #[error("no snapshot rows for week {0}")]
    MissingRows(DateTime<Utc>),

    #[error("snapshot store error: {0}")]
    Store(String),

    #[error("price provider error: {0}")]
    Provider(String),
}

/// A snapshot row as it comes out of storage, `pair_details` still untyped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSnapshotRow {
    pub week_open_utc: DateTime<Utc>,
    pub asset_class: AssetClass,
    pub model: ModelId,
    pub report_date: Option<NaiveDate>,
    #[serde(default)]
    pub pair_details: Value,
}

/// A snapshot row with typed pair details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRow {
    pub week_open_utc: DateTime<Utc>,
    pub asset_class: AssetClass,
    pub model: ModelId,
    pub report_date: Option<NaiveDate>,
    pub pair_details: Vec<PairDetail>,
}

impl From<RawSnapshotRow> for SnapshotRow {
    fn from(raw: RawSnapshotRow) -> Self {
        Self {
            pair_details: parse_pair_details(&raw.pair_details),
            week_open_utc: raw.week_open_utc,
            asset_class: raw.asset_class,
            model: raw.model,
            report_date: raw.report_date,
        }
    }
}

/// Per-(asset class, model) directional rows keyed by week.
pub trait SnapshotStore: Send + Sync {
    /// Human-readable name of this store.
    fn name(&self) -> &str;

    /// Every stored week key with its completeness stats, possibly with
    /// several raw keys per canonical week.
    fn week_candidates(&self) -> Result<Vec<WeekCandidate>, DataError>;

    /// Rows stored under one raw week key.
    fn rows_for_week(&self, week_open_utc: DateTime<Utc>) -> Result<Vec<RawSnapshotRow>, DataError>;
}

/// Weekly price paths.
///
/// Asset-class windowing (FX Sunday open through Friday close in New York,
/// crypto Monday to Monday) is the provider's job.
pub trait PriceSeriesProvider: Send + Sync {
    fn name(&self) -> &str;

    /// `Ok(None)` means the provider has no data for this key.
    fn fetch(&self, key: &SeriesKey) -> Result<Option<SymbolSeries>, DataError>;
}

/// Read and type one week of snapshot rows.
pub fn read_week_rows(
    store: &dyn SnapshotStore,
    week_open_utc: DateTime<Utc>,
) -> Result<Vec<SnapshotRow>, DataError> {
    let rows: Vec<SnapshotRow> = store
        .rows_for_week(week_open_utc)?
        .into_iter()
        .map(SnapshotRow::from)
        .collect();
    if rows.is_empty() {
        return Err(DataError::MissingRows(week_open_utc));
    }
    Ok(rows)
}
