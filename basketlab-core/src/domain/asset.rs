use serde::{Deserialize, Serialize};
use std::fmt;

/// Market bucket a symbol trades in. Drives price windowing and per-asset risk scaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetClass {
    Fx,
    Indices,
    Commodities,
    Crypto,
}

impl AssetClass {
    pub const ALL: [AssetClass; 4] = [
        AssetClass::Fx,
        AssetClass::Indices,
        AssetClass::Commodities,
        AssetClass::Crypto,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AssetClass::Fx => "fx",
            AssetClass::Indices => "indices",
            AssetClass::Commodities => "commodities",
            AssetClass::Crypto => "crypto",
        }
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A model's opinion for one symbol in one week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Long,
    Short,
    Neutral,
}

impl Direction {
    /// Lenient parse used on snapshot payloads. Anything unrecognized is neutral.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "LONG" | "BUY" => Direction::Long,
            "SHORT" | "SELL" => Direction::Short,
            _ => Direction::Neutral,
        }
    }

    /// Signed vote: +1 long, -1 short, 0 neutral.
    pub fn vote(&self) -> i32 {
        match self {
            Direction::Long => 1,
            Direction::Short => -1,
            Direction::Neutral => 0,
        }
    }

    pub fn is_directional(&self) -> bool {
        !matches!(self, Direction::Neutral)
    }

    /// Tradable side, if any.
    pub fn side(&self) -> Option<Side> {
        match self {
            Direction::Long => Some(Side::Long),
            Direction::Short => Some(Side::Short),
            Direction::Neutral => None,
        }
    }
}

/// Side of an open position. Fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    pub fn sign(&self) -> f64 {
        match self {
            Side::Long => 1.0,
            Side::Short => -1.0,
        }
    }

    /// Side implied by a non-zero net vote.
    pub fn from_net(net: i32) -> Option<Self> {
        match net.signum() {
            1 => Some(Side::Long),
            -1 => Some(Side::Short),
            _ => None,
        }
    }

    pub fn direction(&self) -> Direction {
        match self {
            Side::Long => Direction::Long,
            Side::Short => Direction::Short,
        }
    }
}
