//! Explicit run context: collaborator handles plus the memoized series cache.
//!
//! Every top-level run call takes a `RunContext`; the crate keeps no global
//! state. The cache is shared by all variants of a run, so a series is
//! fetched at most once per key.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, warn};

use basketlab_core::data::{LotMap, PriceSeriesProvider, SnapshotStore};
use basketlab_core::domain::{SeriesKey, SymbolKey, SymbolSeries};
use basketlab_core::engine::WeekSeries;
use basketlab_core::sizing::account_scale;

use crate::prefetch::prefetch_series;

/// Memoized provider answers. `None` records a confirmed miss.
#[derive(Debug, Default)]
pub struct SeriesCache {
    entries: Mutex<HashMap<SeriesKey, Option<Arc<SymbolSeries>>>>,
}

impl SeriesCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &SeriesKey) -> Option<Option<Arc<SymbolSeries>>> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn insert(&self, key: SeriesKey, series: Option<Arc<SymbolSeries>>) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, series);
    }

    pub fn contains(&self, key: &SeriesKey) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Collaborators and shared caches for one run.
pub struct RunContext<'a> {
    store: &'a dyn SnapshotStore,
    provider: &'a dyn PriceSeriesProvider,
    lots: Option<LotMap>,
    cache: SeriesCache,
}

impl<'a> RunContext<'a> {
    pub fn new(store: &'a dyn SnapshotStore, provider: &'a dyn PriceSeriesProvider) -> Self {
        Self {
            store,
            provider,
            lots: None,
            cache: SeriesCache::new(),
        }
    }

    /// Enable dollar sizing and margin normalization.
    pub fn with_lot_map(mut self, lots: LotMap) -> Self {
        self.lots = Some(lots);
        self
    }

    pub fn store(&self) -> &dyn SnapshotStore {
        self.store
    }

    pub fn provider(&self) -> &dyn PriceSeriesProvider {
        self.provider
    }

    pub fn lots(&self) -> Option<&LotMap> {
        self.lots.as_ref()
    }

    pub fn cache(&self) -> &SeriesCache {
        &self.cache
    }

    /// Lot-size multiplier for a configured reference account.
    pub fn account_scale(&self, account_size_usd: f64, baseline_equity_usd: Option<f64>) -> f64 {
        baseline_equity_usd.map_or(1.0, |baseline| account_scale(account_size_usd, baseline))
    }

    /// Price paths for every symbol in `symbols`, fetching what the cache lacks.
    ///
    /// Missing or failed series are left out of the map; the lifecycle treats
    /// those legs as unpriced.
    pub fn week_series(
        &self,
        week_open_utc: DateTime<Utc>,
        symbols: &BTreeMap<SymbolKey, Option<NaiveDate>>,
        parallel: bool,
    ) -> WeekSeries {
        let keys: Vec<SeriesKey> = symbols
            .iter()
            .map(|(symbol, report_date)| SeriesKey {
                week_open_utc,
                symbol: symbol.clone(),
                report_date: *report_date,
            })
            .collect();

        let missing: Vec<SeriesKey> =
            keys.iter().filter(|k| !self.cache.contains(k)).cloned().collect();
        if !missing.is_empty() {
            debug!(
                week = %week_open_utc,
                fetching = missing.len(),
                cached = keys.len() - missing.len(),
                "prefetching series"
            );
            for (key, result) in prefetch_series(self.provider, &missing, parallel) {
                match result {
                    Ok(series) => self.cache.insert(key, series.map(Arc::new)),
                    Err(err) => {
                        warn!(
                            symbol = %key.symbol,
                            error = %err,
                            "price fetch failed; leg left unpriced"
                        )
                    }
                }
            }
        }

        keys.into_iter()
            .filter_map(|key| {
                let series = self.cache.get(&key).flatten()?;
                Some((key.symbol, series))
            })
            .collect()
    }
}
