//! Domain types for the basket engine

pub mod asset;
pub mod keys;
pub mod model;
pub mod position;
pub mod series;
pub mod tier;

pub use asset::{AssetClass, Direction, Side};
pub use keys::{PositionKey, SeriesKey, SymbolKey};
pub use model::ModelId;
pub use position::Position;
pub use series::{SeriesPoint, SymbolSeries};
pub use tier::Tier;
