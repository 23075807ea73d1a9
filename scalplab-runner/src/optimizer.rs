//! Exit-parameter grid search.
//!
//! Every grid point gets its own `StrategyConfig` derived from the base config
//! and reruns the full EMA → signal → simulate → analyze pipeline over the
//! shared, read-only bar series. Points are independent, so the sweep runs on a
//! rayon pool by default; results come back in grid order either way.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use scalplab_core::config::StrategyConfig;
use scalplab_core::domain::Bar;
use scalplab_core::engine::run_strategy;
use scalplab_core::indicators::ema::DEFAULT_EMA_SPAN;

use crate::metrics::{analyze, PerformanceMetrics};

/// Ranges for the three exit parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamGrid {
    pub tp_ticks: Vec<u32>,
    pub sl_ticks: Vec<u32>,
    /// 0 disables the trailing stop for that point.
    pub trailing_ticks: Vec<u32>,
}

impl Default for ParamGrid {
    /// 10..=40 step 10 for take-profit and stop-loss, trailing off / 5 / 10.
    fn default() -> Self {
        Self {
            tp_ticks: vec![10, 20, 30, 40],
            sl_ticks: vec![10, 20, 30, 40],
            trailing_ticks: vec![0, 5, 10],
        }
    }
}

/// One combination of exit parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridPoint {
    pub tp_ticks: u32,
    pub sl_ticks: u32,
    pub trailing_ticks: u32,
}

impl GridPoint {
    pub fn apply(&self, base: &StrategyConfig) -> StrategyConfig {
        base.with_exit_params(self.tp_ticks, self.sl_ticks, self.trailing_ticks)
    }
}

impl std::fmt::Display for GridPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "TP={} SL={} TSL={}",
            self.tp_ticks, self.sl_ticks, self.trailing_ticks
        )
    }
}

impl ParamGrid {
    /// Returns the total number of combinations in this grid.
    pub fn size(&self) -> usize {
        self.tp_ticks.len() * self.sl_ticks.len() * self.trailing_ticks.len()
    }

    /// Cartesian product: take-profit outermost, trailing innermost.
    pub fn combinations(&self) -> Vec<GridPoint> {
        let mut points = Vec::with_capacity(self.size());
        for &tp_ticks in &self.tp_ticks {
            for &sl_ticks in &self.sl_ticks {
                for &trailing_ticks in &self.trailing_ticks {
                    points.push(GridPoint {
                        tp_ticks,
                        sl_ticks,
                        trailing_ticks,
                    });
                }
            }
        }
        points
    }
}

/// One row of the optimization table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub tp_ticks: u32,
    pub sl_ticks: u32,
    pub trailing_ticks: u32,
    pub total_profit: f64,
    pub profit_percentage: f64,
    pub win_rate: f64,
    #[serde(with = "crate::metrics::non_finite_as_null")]
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
    pub total_trades: usize,
    pub avg_profit: f64,
}

impl OptimizationResult {
    fn new(point: GridPoint, m: &PerformanceMetrics) -> Self {
        Self {
            tp_ticks: point.tp_ticks,
            sl_ticks: point.sl_ticks,
            trailing_ticks: point.trailing_ticks,
            total_profit: m.total_profit,
            profit_percentage: m.profit_percentage,
            win_rate: m.win_rate,
            sharpe_ratio: m.sharpe_ratio,
            max_drawdown: m.max_drawdown,
            total_trades: m.total_trades,
            avg_profit: m.avg_profit,
        }
    }

    pub fn point(&self) -> GridPoint {
        GridPoint {
            tp_ticks: self.tp_ticks,
            sl_ticks: self.sl_ticks,
            trailing_ticks: self.trailing_ticks,
        }
    }
}

/// What one grid point produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GridOutcome {
    Scored(OptimizationResult),
    /// Pipeline ran but no trade closed.
    NoTrades,
    /// Pipeline failed for this point; the sweep carried on.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointOutcome {
    pub point: GridPoint,
    pub outcome: GridOutcome,
}

/// Full sweep output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationReport {
    /// Scored rows in grid order.
    pub rows: Vec<OptimizationResult>,
    /// Every grid point with its outcome, in grid order.
    pub outcomes: Vec<PointOutcome>,
    /// Row with the highest Sharpe ratio. `None` means no configuration
    /// produced trades.
    pub best: Option<OptimizationResult>,
}

impl OptimizationReport {
    fn from_outcomes(outcomes: Vec<PointOutcome>) -> Self {
        let rows: Vec<OptimizationResult> = outcomes
            .iter()
            .filter_map(|p| match &p.outcome {
                GridOutcome::Scored(row) => Some(row.clone()),
                _ => None,
            })
            .collect();
        let best = select_best(&rows).cloned();
        Self {
            rows,
            outcomes,
            best,
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = (&GridPoint, &str)> {
        self.outcomes.iter().filter_map(|p| match &p.outcome {
            GridOutcome::Failed(msg) => Some((&p.point, msg.as_str())),
            _ => None,
        })
    }
}

/// Highest Sharpe ratio wins. NaN ranks below every number; ties keep the
/// earlier row.
pub fn select_best(rows: &[OptimizationResult]) -> Option<&OptimizationResult> {
    rows.iter().fold(None, |best, row| match best {
        None => Some(row),
        Some(current) if ranks_above(row.sharpe_ratio, current.sharpe_ratio) => Some(row),
        keep => keep,
    })
}

fn ranks_above(candidate: f64, current: f64) -> bool {
    match (candidate.is_nan(), current.is_nan()) {
        (true, _) => false,
        (false, true) => true,
        (false, false) => candidate > current,
    }
}

/// Grid-search executor over one bar series.
pub struct Optimizer<'a> {
    bars: &'a [Bar],
    base: StrategyConfig,
    ema_span: usize,
    parallel: bool,
}

impl<'a> Optimizer<'a> {
    pub fn new(bars: &'a [Bar], base: StrategyConfig) -> Self {
        Self {
            bars,
            base,
            ema_span: DEFAULT_EMA_SPAN,
            parallel: true,
        }
    }

    pub fn with_ema_span(mut self, ema_span: usize) -> Self {
        self.ema_span = ema_span;
        self
    }

    /// Enables or disables parallel execution.
    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn run(&self, grid: &ParamGrid) -> OptimizationReport {
        self.run_with_progress(grid, |_, _, _| {})
    }

    /// Executes the sweep with progress reporting.
    ///
    /// The callback is invoked after each grid point completes with:
    /// - Grid index (0-based)
    /// - Total number of points
    /// - The point's outcome
    ///
    /// In parallel mode callbacks arrive in completion order, not grid order.
    pub fn run_with_progress<F>(&self, grid: &ParamGrid, progress_callback: F) -> OptimizationReport
    where
        F: Fn(usize, usize, &PointOutcome) + Send + Sync,
    {
        let points = grid.combinations();
        let total = points.len();
        tracing::info!(points = total, parallel = self.parallel, "starting optimization");

        let eval = |(idx, point): (usize, &GridPoint)| {
            let outcome = PointOutcome {
                point: *point,
                outcome: self.evaluate(*point),
            };
            progress_callback(idx, total, &outcome);
            outcome
        };

        let outcomes: Vec<PointOutcome> = if self.parallel {
            points.par_iter().enumerate().map(eval).collect()
        } else {
            points.iter().enumerate().map(eval).collect()
        };

        let report = OptimizationReport::from_outcomes(outcomes);
        match &report.best {
            Some(best) => tracing::info!(
                rows = report.rows.len(),
                best = %best.point(),
                sharpe = best.sharpe_ratio,
                total_profit = best.total_profit,
                "optimization complete"
            ),
            None => tracing::info!("optimization complete: no configuration produced trades"),
        }
        report
    }

    /// Run the full pipeline for one point with an isolated config.
    pub fn evaluate(&self, point: GridPoint) -> GridOutcome {
        let config = point.apply(&self.base);
        tracing::debug!(%point, "testing grid point");

        let run = match run_strategy(self.bars, self.ema_span, &config) {
            Ok(run) => run,
            Err(e) => {
                tracing::warn!(%point, error = %e, "grid point failed");
                return GridOutcome::Failed(e.to_string());
            }
        };
        match analyze(&run.simulation.trades, config.starting_balance) {
            Some(metrics) => GridOutcome::Scored(OptimizationResult::new(point, &metrics)),
            None => GridOutcome::NoTrades,
        }
    }
}
