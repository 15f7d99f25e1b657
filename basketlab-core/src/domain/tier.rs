use serde::{Deserialize, Serialize};

/// Confidence bucket derived from voter agreement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    /// All voters agree.
    #[serde(rename = "1")]
    One,
    /// All but one voter agree (or, with two voters, one directional and one neutral).
    #[serde(rename = "2")]
    Two,
    /// One direction strictly outnumbers the other.
    #[serde(rename = "3")]
    Three,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::One, Tier::Two, Tier::Three];

    pub fn number(&self) -> u8 {
        match self {
            Tier::One => 1,
            Tier::Two => 2,
            Tier::Three => 3,
        }
    }

    /// Zero-based index into per-tier arrays.
    pub fn index(&self) -> usize {
        self.number() as usize - 1
    }
}
