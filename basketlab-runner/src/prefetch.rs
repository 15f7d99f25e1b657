//! Parallel price prefetch.
//!
//! Fetching is read-only and keyed, so it runs ahead of the sequential
//! weekly simulation on the rayon pool.

use rayon::prelude::*;

use basketlab_core::data::{DataError, PriceSeriesProvider};
use basketlab_core::domain::{SeriesKey, SymbolSeries};

/// Fetch every key. Results keep the order of `keys`.
pub fn prefetch_series(
    provider: &dyn PriceSeriesProvider,
    keys: &[SeriesKey],
    parallel: bool,
) -> Vec<(SeriesKey, Result<Option<SymbolSeries>, DataError>)> {
    let fetch = |key: &SeriesKey| (key.clone(), provider.fetch(key));
    if parallel {
        keys.par_iter().map(fetch).collect()
    } else {
        keys.iter().map(fetch).collect()
    }
}
