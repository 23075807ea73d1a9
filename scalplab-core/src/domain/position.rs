//! Side and OpenPosition — the single live position between entry and exit.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Direction of an open position or closed trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// +1 for long, -1 for short. Multiplies a raw price move into a signed gain.
    pub fn sign(self) -> f64 {
        match self {
            Self::Long => 1.0,
            Self::Short => -1.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Long => "long",
            Self::Short => "short",
        }
    }
}

/// The single live position owned by the simulator between entry and exit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenPosition {
    pub entry_time: NaiveDateTime,
    pub entry_price: f64,
    pub quantity: u32,
    pub side: Side,
    /// Most favorable price seen since entry: highest high for longs, lowest low
    /// for shorts. Only advanced while the trailing stop is active.
    pub extreme_price: f64,
}

impl OpenPosition {
    pub fn open(side: Side, entry_time: NaiveDateTime, entry_price: f64, quantity: u32) -> Self {
        Self {
            entry_time,
            entry_price,
            quantity,
            side,
            extreme_price: entry_price,
        }
    }

    /// Advance the favorable extreme with this bar's high (long) or low (short).
    pub fn track_extreme(&mut self, high: f64, low: f64) {
        self.extreme_price = match self.side {
            Side::Long => self.extreme_price.max(high),
            Side::Short => self.extreme_price.min(low),
        };
    }
}
