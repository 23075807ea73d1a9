//! Equity report — per-trade balance curve and monthly PnL buckets.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use scalplab_core::domain::ClosedTrade;

/// Balance after one closed trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    /// 1-based trade ordinal.
    pub trade_number: usize,
    pub exit_time: chrono::NaiveDateTime,
    /// Rounded to cents.
    pub balance: f64,
}

/// Net PnL of all trades that exited in one calendar month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyPnl {
    /// `YYYY-MM`
    pub month: String,
    pub pnl: f64,
    pub trades: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EquityReport {
    pub curve: Vec<EquityPoint>,
    pub monthly: Vec<MonthlyPnl>,
}

impl EquityReport {
    pub fn from_trades(trades: &[ClosedTrade], starting_balance: f64) -> Self {
        Self {
            curve: equity_curve(trades, starting_balance),
            monthly: monthly_pnl(trades),
        }
    }
}

/// Running balance after each trade, in trade order.
pub fn equity_curve(trades: &[ClosedTrade], starting_balance: f64) -> Vec<EquityPoint> {
    let mut balance = starting_balance;
    trades
        .iter()
        .enumerate()
        .map(|(i, t)| {
            balance += t.pnl;
            EquityPoint {
                trade_number: i + 1,
                exit_time: t.exit_time,
                balance: round_cents(balance),
            }
        })
        .collect()
}

/// PnL grouped by exit month, oldest first.
pub fn monthly_pnl(trades: &[ClosedTrade]) -> Vec<MonthlyPnl> {
    let mut buckets: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    for t in trades {
        let entry = buckets
            .entry(t.exit_time.format("%Y-%m").to_string())
            .or_insert((0.0, 0));
        entry.0 += t.pnl;
        entry.1 += 1;
    }
    buckets
        .into_iter()
        .map(|(month, (pnl, trades))| MonthlyPnl { month, pnl, trades })
        .collect()
}

fn round_cents(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
