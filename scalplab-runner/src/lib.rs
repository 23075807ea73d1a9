//! ScalpLab Runner — backtest orchestration, metrics, optimization, exports.
//!
//! This crate builds on `scalplab-core` to provide:
//! - Bar loading from CSV or a seeded synthetic series
//! - Single-backtest runner with metrics and an equity report
//! - Exit-parameter grid optimizer (parallel via rayon)
//! - TOML/JSON run files
//! - JSON and CSV artifact export

pub mod config;
pub mod data_loader;
pub mod equity;
pub mod export;
pub mod metrics;
pub mod optimizer;
pub mod runner;

pub use config::{ConfigError, OptimizeSection, RunFile, StrategySection};
pub use data_loader::{
    dataset_hash, load_bars, load_csv, synthetic_minute_bars, DataSource, LoadError, LoadedData,
};
pub use equity::{EquityPoint, EquityReport, MonthlyPnl};
pub use export::{save_artifacts, save_optimization};
pub use metrics::{analyze, PerformanceMetrics};
pub use optimizer::{
    select_best, GridOutcome, GridPoint, OptimizationReport, OptimizationResult, Optimizer,
    ParamGrid, PointOutcome,
};
pub use runner::{run_backtest, run_backtest_from_data, BacktestResult, RunError, RunSettings};
