//! Backtest runner — wires together loading, the core pipeline, and metrics.
//!
//! Two entry points:
//! - `run_backtest()`: takes a bar slice. Used by tests and embedding callers.
//! - `run_backtest_from_data()`: takes a `LoadedData` with its precomputed
//!   dataset hash and provenance. Used by the CLI.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use scalplab_core::config::{RunId, StrategyConfig};
use scalplab_core::domain::{Bar, ClosedTrade, OpenPosition};
use scalplab_core::engine::{run_strategy, SimError};
use scalplab_core::indicators::ema::DEFAULT_EMA_SPAN;

use crate::config::ConfigError;
use crate::data_loader::{dataset_hash, LoadError, LoadedData};
use crate::equity::EquityReport;
use crate::metrics::{analyze, PerformanceMetrics};

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("simulation error: {0}")]
    Simulation(#[from] SimError),
    #[error("ema_span must be >= 1")]
    ZeroEmaSpan,
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Inputs for one run besides the bars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSettings {
    pub config: StrategyConfig,
    pub ema_span: usize,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            config: StrategyConfig::default(),
            ema_span: DEFAULT_EMA_SPAN,
        }
    }
}

impl RunSettings {
    pub fn new(config: StrategyConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn with_ema_span(mut self, ema_span: usize) -> Self {
        self.ema_span = ema_span;
        self
    }
}

/// Complete result of a single backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: RunId,
    pub config: StrategyConfig,
    pub ema_span: usize,
    pub bar_count: usize,
    /// Bars tagged with an entry signal, traded or not.
    pub signal_count: usize,
    pub trades: Vec<ClosedTrade>,
    /// `None` when the run produced no trades.
    pub metrics: Option<PerformanceMetrics>,
    pub final_balance: f64,
    /// Position still open when the data ended. Not included in any balance.
    pub discarded_position: Option<OpenPosition>,
    pub dataset_hash: String,
    pub is_synthetic: bool,
    pub equity: EquityReport,
}

/// Default schema version for serde deserialization of older JSON without the field.
fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Run a backtest over a bar slice.
pub fn run_backtest(bars: &[Bar], settings: &RunSettings) -> Result<BacktestResult, RunError> {
    execute(bars, settings, dataset_hash(bars), false)
}

/// Run a backtest over pre-loaded data. No I/O.
pub fn run_backtest_from_data(
    data: &LoadedData,
    settings: &RunSettings,
) -> Result<BacktestResult, RunError> {
    execute(
        &data.bars,
        settings,
        data.dataset_hash.clone(),
        data.is_synthetic,
    )
}

fn execute(
    bars: &[Bar],
    settings: &RunSettings,
    dataset_hash: String,
    is_synthetic: bool,
) -> Result<BacktestResult, RunError> {
    if settings.ema_span == 0 {
        return Err(RunError::ZeroEmaSpan);
    }
    let run_id = settings.config.run_id();
    tracing::info!(
        run_id = %run_id,
        bars = bars.len(),
        tp_ticks = settings.config.tp_ticks,
        sl_ticks = settings.config.sl_ticks,
        trailing = settings.config.trailing_stop,
        "starting backtest"
    );

    let run = run_strategy(bars, settings.ema_span, &settings.config)?;
    let signal_count = run.signal_count();
    let sim = run.simulation;

    let metrics = analyze(&sim.trades, settings.config.starting_balance);
    let equity = EquityReport::from_trades(&sim.trades, settings.config.starting_balance);

    if sim.discarded_position.is_some() {
        tracing::debug!("position open at end of data discarded");
    }
    tracing::info!(
        run_id = %run_id,
        trades = sim.trades.len(),
        final_balance = sim.final_balance,
        "backtest complete"
    );

    Ok(BacktestResult {
        schema_version: SCHEMA_VERSION,
        run_id,
        config: settings.config.clone(),
        ema_span: settings.ema_span,
        bar_count: bars.len(),
        signal_count,
        trades: sim.trades,
        metrics,
        final_balance: sim.final_balance,
        discarded_position: sim.discarded_position,
        dataset_hash,
        is_synthetic,
        equity,
    })
}
