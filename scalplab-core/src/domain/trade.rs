//! ClosedTrade — a completed round-trip trade.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::position::Side;

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    TakeProfit,
    StopLoss,
}

impl ExitReason {
    /// Short label used in exported trade tapes.
    pub fn code(self) -> &'static str {
        match self {
            Self::TakeProfit => "TP",
            Self::StopLoss => "SL",
        }
    }
}

/// A complete round-trip trade record: entry → exit.
///
/// `pnl` is net of commission and slippage. `balance_after` is the account
/// balance once this trade's PnL has been booked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub entry_time: NaiveDateTime,
    pub exit_time: NaiveDateTime,
    pub side: Side,
    pub entry_price: f64,
    pub exit_price: f64,
    pub quantity: u32,
    pub pnl: f64,
    pub outcome: ExitReason,
    pub balance_after: f64,
}

impl ClosedTrade {
    pub fn is_winner(&self) -> bool {
        self.pnl > 0.0
    }
}
