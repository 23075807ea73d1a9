//! Export — JSON and CSV artifact generation.
//!
//! - **JSON**: full round-trip serialization of a `BacktestResult` with schema versioning
//! - **CSV**: trade tape, one-row metrics table, optimization table, equity curve
//!
//! Unknown schema versions are rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use scalplab_core::domain::ClosedTrade;

use crate::equity::EquityPoint;
use crate::metrics::PerformanceMetrics;
use crate::optimizer::{OptimizationReport, OptimizationResult};
use crate::runner::{BacktestResult, SCHEMA_VERSION};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a `BacktestResult` to pretty JSON.
pub fn export_json(result: &BacktestResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize BacktestResult to JSON")
}

/// Deserialize a `BacktestResult` from JSON, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<BacktestResult> {
    let result: BacktestResult =
        serde_json::from_str(json).context("failed to deserialize BacktestResult from JSON")?;
    if result.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            result.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(result)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Export a trade list as CSV.
///
/// Columns: Entry Time, Exit Time, Type, Entry Price, Exit Price, Quantity,
/// PNL, Outcome, Balance After Trade
pub fn export_trades_csv(trades: &[ClosedTrade]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "Entry Time",
        "Exit Time",
        "Type",
        "Entry Price",
        "Exit Price",
        "Quantity",
        "PNL",
        "Outcome",
        "Balance After Trade",
    ])?;

    for t in trades {
        wtr.write_record([
            &t.entry_time.format(TIME_FORMAT).to_string(),
            &t.exit_time.format(TIME_FORMAT).to_string(),
            t.side.as_str(),
            &t.entry_price.to_string(),
            &t.exit_price.to_string(),
            &t.quantity.to_string(),
            &t.pnl.to_string(),
            t.outcome.code(),
            &t.balance_after.to_string(),
        ])?;
    }

    finish(wtr)
}

/// Export metrics as a one-row CSV. No metrics (no trades) gives an empty string.
pub fn export_metrics_csv(metrics: Option<&PerformanceMetrics>) -> Result<String> {
    let Some(m) = metrics else {
        return Ok(String::new());
    };
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "Win Rate",
        "Total Trades",
        "Average Profit per Trade",
        "Total Profit",
        "Profit Percentage",
        "Max Drawdown",
        "Sharpe Ratio",
        "Average Win",
        "Average Loss",
        "Best Trade",
        "Worst Trade",
        "Profit Factor",
        "Max Consecutive Wins",
        "Max Consecutive Losses",
    ])?;
    wtr.write_record([
        &m.win_rate.to_string(),
        &m.total_trades.to_string(),
        &m.avg_profit.to_string(),
        &m.total_profit.to_string(),
        &m.profit_percentage.to_string(),
        &m.max_drawdown.to_string(),
        &m.sharpe_ratio.to_string(),
        &m.avg_win.to_string(),
        &m.avg_loss.to_string(),
        &m.best_trade.to_string(),
        &m.worst_trade.to_string(),
        &m.profit_factor.to_string(),
        &m.max_consecutive_wins.to_string(),
        &m.max_consecutive_losses.to_string(),
    ])?;
    finish(wtr)
}

/// Export optimization rows as CSV, in grid order.
pub fn export_optimization_csv(rows: &[OptimizationResult]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "TP_Ticks",
        "SL_Ticks",
        "Trailing_Ticks",
        "Total Profit",
        "Profit Percentage",
        "Win Rate",
        "Sharpe Ratio",
        "Max Drawdown",
        "Total Trades",
        "Average Profit per Trade",
    ])?;
    for r in rows {
        wtr.write_record([
            &r.tp_ticks.to_string(),
            &r.sl_ticks.to_string(),
            &r.trailing_ticks.to_string(),
            &r.total_profit.to_string(),
            &r.profit_percentage.to_string(),
            &r.win_rate.to_string(),
            &r.sharpe_ratio.to_string(),
            &r.max_drawdown.to_string(),
            &r.total_trades.to_string(),
            &r.avg_profit.to_string(),
        ])?;
    }
    finish(wtr)
}

/// Export the per-trade equity curve.
pub fn export_equity_csv(curve: &[EquityPoint]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["trade_number", "exit_time", "balance"])?;
    for p in curve {
        wtr.write_record([
            &p.trade_number.to_string(),
            &p.exit_time.format(TIME_FORMAT).to_string(),
            &format!("{:.2}", p.balance),
        ])?;
    }
    finish(wtr)
}

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String> {
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the full artifact set for a single backtest run into `output_dir`:
/// - `result.json`: the full `BacktestResult`
/// - `trades.csv`: trade tape
/// - `metrics.csv`: one-row metrics table (empty when there were no trades)
/// - `equity.csv`: balance after each trade
///
/// Returns `output_dir`.
pub fn save_artifacts(result: &BacktestResult, output_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create artifact dir: {}", output_dir.display()))?;

    write(output_dir, "result.json", &export_json(result)?)?;
    write(output_dir, "trades.csv", &export_trades_csv(&result.trades)?)?;
    write(
        output_dir,
        "metrics.csv",
        &export_metrics_csv(result.metrics.as_ref())?,
    )?;
    write(
        output_dir,
        "equity.csv",
        &export_equity_csv(&result.equity.curve)?,
    )?;

    Ok(output_dir.to_path_buf())
}

/// Write `optimization_results.csv` into `output_dir`. Returns the file path.
pub fn save_optimization(report: &OptimizationReport, output_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create output dir: {}", output_dir.display()))?;
    write(
        output_dir,
        "optimization_results.csv",
        &export_optimization_csv(&report.rows)?,
    )
}

/// Load a `BacktestResult` from an artifact directory's result.json.
pub fn load_artifacts(dir: &Path) -> Result<BacktestResult> {
    let path = dir.join("result.json");
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json)
}

fn write(dir: &Path, name: &str, contents: &str) -> Result<PathBuf> {
    let path = dir.join(name);
    std::fs::write(&path, contents)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}
