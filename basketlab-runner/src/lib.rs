//! BasketLab Runner — multi-week policy comparisons on top of `basketlab-core`.
//!
//! This crate provides:
//! - TOML run configuration with named policy variants
//! - An explicit run context holding collaborators and the series cache
//! - Parallel price prefetch ahead of each sequential week
//! - Week resolution with duplicate-row selection
//! - Per-variant reports with per-week error isolation
//! - Margin normalization of a variant against a reference variant

pub mod config;
pub mod context;
pub mod prefetch;
pub mod runner;
pub mod weeks;

pub use config::{ConfigError, RunConfig, VariantConfig, VariantId};
pub use context::{RunContext, SeriesCache};
pub use prefetch::prefetch_series;
pub use runner::{
    normalize, run_all, run_variant, NormalizedView, RunError, RunReport, SkippedWeek,
    VariantReport, SCHEMA_VERSION,
};
pub use weeks::{resolve_weeks, ResolvedWeek};
