//! Performance metrics — pure functions that compute strategy statistics.
//!
//! Every metric is a pure function: trade list (and starting balance) in,
//! scalar out. No dependencies on the runner, data pipeline, or simulator.

use serde::{Deserialize, Serialize};
use scalplab_core::domain::ClosedTrade;

/// Minute bars in a 252-day, 24-hour trading year.
pub const ANNUALIZATION_PERIODS: f64 = 252.0 * 24.0 * 60.0;

/// Aggregate performance metrics for a single backtest run.
///
/// Only exists for a non-empty trade list; see [`analyze`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub win_rate: f64,
    pub total_trades: usize,
    pub avg_profit: f64,
    pub total_profit: f64,
    /// Total profit as a percentage of the starting balance.
    pub profit_percentage: f64,
    /// Worst peak-to-trough decline of the cumulative balance (currency, >= 0).
    pub max_drawdown: f64,
    /// NaN when the return standard deviation is zero or undefined.
    #[serde(with = "non_finite_as_null")]
    pub sharpe_ratio: f64,
    /// Mean pnl of winning trades; 0.0 when there are none.
    pub avg_win: f64,
    /// Mean pnl of losing trades (negative); 0.0 when there are none.
    pub avg_loss: f64,
    pub best_trade: f64,
    pub worst_trade: f64,
    #[serde(with = "non_finite_as_null")]
    pub profit_factor: f64,
    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,
}

/// Compute all metrics for a trade list.
///
/// Returns `None` for an empty list. Callers branch on that instead of reading
/// zeros.
pub fn analyze(trades: &[ClosedTrade], starting_balance: f64) -> Option<PerformanceMetrics> {
    if trades.is_empty() {
        return None;
    }

    let total_profit = total_profit(trades);
    let balance = cumulative_balance(trades, starting_balance);
    let returns = trade_returns(trades, starting_balance);

    Some(PerformanceMetrics {
        win_rate: win_rate(trades),
        total_trades: trades.len(),
        avg_profit: total_profit / trades.len() as f64,
        total_profit,
        profit_percentage: total_profit / starting_balance * 100.0,
        max_drawdown: max_drawdown(&balance),
        sharpe_ratio: sharpe_ratio(&returns),
        avg_win: avg_win(trades),
        avg_loss: avg_loss(trades),
        best_trade: best_trade(trades),
        worst_trade: worst_trade(trades),
        profit_factor: profit_factor(trades),
        max_consecutive_wins: max_consecutive_wins(trades),
        max_consecutive_losses: max_consecutive_losses(trades),
    })
}

// ─── Individual metric functions ────────────────────────────────────

/// Win rate: fraction of trades with pnl > 0. Break-even trades count as losses.
pub fn win_rate(trades: &[ClosedTrade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let winners = trades.iter().filter(|t| t.is_winner()).count();
    winners as f64 / trades.len() as f64
}

pub fn total_profit(trades: &[ClosedTrade]) -> f64 {
    trades.iter().map(|t| t.pnl).sum()
}

/// Mean pnl over trades with pnl > 0. Returns 0.0 when nothing won.
pub fn avg_win(trades: &[ClosedTrade]) -> f64 {
    mean_or_zero(trades.iter().map(|t| t.pnl).filter(|p| *p > 0.0))
}

/// Mean pnl over trades with pnl < 0. Returns 0.0 when nothing lost.
///
/// Break-even trades are excluded here even though `win_rate` counts them as
/// non-winners.
pub fn avg_loss(trades: &[ClosedTrade]) -> f64 {
    mean_or_zero(trades.iter().map(|t| t.pnl).filter(|p| *p < 0.0))
}

/// Largest single-trade pnl. 0.0 for an empty list.
pub fn best_trade(trades: &[ClosedTrade]) -> f64 {
    trades.iter().map(|t| t.pnl).reduce(f64::max).unwrap_or(0.0)
}

/// Smallest single-trade pnl. 0.0 for an empty list.
pub fn worst_trade(trades: &[ClosedTrade]) -> f64 {
    trades.iter().map(|t| t.pnl).reduce(f64::min).unwrap_or(0.0)
}

/// Balance after each trade: starting balance plus the running sum of pnl.
pub fn cumulative_balance(trades: &[ClosedTrade], starting_balance: f64) -> Vec<f64> {
    trades
        .iter()
        .scan(0.0, |cum, t| {
            *cum += t.pnl;
            Some(starting_balance + *cum)
        })
        .collect()
}

/// Maximum drawdown in currency: max over the series of (running max − value).
///
/// The running maximum starts at the first element, so a loss on the first
/// trade is not a drawdown. Returns 0.0 for monotonically non-decreasing or
/// empty series.
pub fn max_drawdown(balance: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut max_dd = 0.0_f64;
    for &value in balance {
        peak = peak.max(value);
        max_dd = max_dd.max(peak - value);
    }
    max_dd
}

/// Per-trade returns: pnl / starting balance.
pub fn trade_returns(trades: &[ClosedTrade], starting_balance: f64) -> Vec<f64> {
    trades.iter().map(|t| t.pnl / starting_balance).collect()
}

/// Annualized Sharpe ratio of per-trade returns.
///
/// Sharpe = mean / sample std × sqrt(252 × 24 × 60). Returns NaN when the
/// standard deviation is zero or there are fewer than two returns.
pub fn sharpe_ratio(returns: &[f64]) -> f64 {
    let std = sample_std(returns);
    if std.is_nan() || std == 0.0 {
        return f64::NAN;
    }
    mean_f64(returns) / std * ANNUALIZATION_PERIODS.sqrt()
}

/// Profit factor: gross profits / gross losses.
///
/// Infinite when there are winners and no losers, 0.0 when there are no winners.
pub fn profit_factor(trades: &[ClosedTrade]) -> f64 {
    let gross_profit: f64 = trades.iter().filter(|t| t.pnl > 0.0).map(|t| t.pnl).sum();
    let gross_loss: f64 = trades
        .iter()
        .filter(|t| t.pnl < 0.0)
        .map(|t| t.pnl.abs())
        .sum();

    if gross_loss == 0.0 {
        return if gross_profit > 0.0 { f64::INFINITY } else { 0.0 };
    }
    gross_profit / gross_loss
}

/// Longest run of consecutive winning trades.
pub fn max_consecutive_wins(trades: &[ClosedTrade]) -> usize {
    longest_run(trades, |t| t.is_winner())
}

/// Longest run of consecutive non-winning trades.
pub fn max_consecutive_losses(trades: &[ClosedTrade]) -> usize {
    longest_run(trades, |t| !t.is_winner())
}

fn longest_run(trades: &[ClosedTrade], pred: impl Fn(&ClosedTrade) -> bool) -> usize {
    let mut best = 0;
    let mut current = 0;
    for trade in trades {
        if pred(trade) {
            current += 1;
            best = best.max(current);
        } else {
            current = 0;
        }
    }
    best
}

// ─── Helpers ────────────────────────────────────────────────────────

/// JSON has no NaN or infinity: write them as `null`, read `null` back as NaN.
pub mod non_finite_as_null {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_some(value)
        } else {
            serializer.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
    }
}

fn mean_or_zero(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n − 1). NaN for fewer than two values.
fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let mean = mean_f64(values);
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}
