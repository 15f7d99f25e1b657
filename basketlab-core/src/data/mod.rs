//! External collaborator contracts and defensive payload parsing.
//!
//! The engine never talks to a database or a broker. It consumes:
//! - a [`SnapshotStore`] for per-model directional rows,
//! - a [`PriceSeriesProvider`] for weekly price paths,
//! - a [`LotMap`] for dollar conversion and margin per leg.

pub mod lot_map;
pub mod payload;
pub mod provider;
pub mod resolver;

pub use lot_map::{LotMap, LotSpec};
pub use payload::{json_array, parse_pair_details, PairDetail};
pub use provider::{
    read_week_rows, DataError, PriceSeriesProvider, RawSnapshotRow, SnapshotRow, SnapshotStore,
};
pub use resolver::{resolve_first, LookupStrategy, Resolution};
