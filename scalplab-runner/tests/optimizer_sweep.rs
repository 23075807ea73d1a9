//! Integration tests for the exit-parameter optimizer.

use scalplab_core::config::StrategyConfig;
use scalplab_runner::data_loader::synthetic_minute_bars;
use scalplab_runner::export::save_optimization;
use scalplab_runner::optimizer::{GridOutcome, Optimizer, ParamGrid};
use scalplab_runner::runner::{run_backtest, RunSettings};

#[test]
fn single_combination_without_trades_reports_none_found() {
    // Too short to reach the first tradable bar.
    let bars = synthetic_minute_bars(4, 1);
    let grid = ParamGrid {
        tp_ticks: vec![20],
        sl_ticks: vec![20],
        trailing_ticks: vec![0],
    };
    let report = Optimizer::new(&bars, StrategyConfig::default()).run(&grid);

    assert!(report.rows.is_empty());
    assert!(report.best.is_none());
    assert_eq!(report.outcomes[0].outcome, GridOutcome::NoTrades);
}

#[test]
fn rows_match_independent_single_runs() {
    let bars = synthetic_minute_bars(5_000, 21);
    let base = StrategyConfig::default();
    let grid = ParamGrid {
        tp_ticks: vec![8, 24],
        sl_ticks: vec![8, 24],
        trailing_ticks: vec![0, 6],
    };
    let report = Optimizer::new(&bars, base.clone()).run(&grid);

    for row in &report.rows {
        let config = row.point().apply(&base);
        let single = run_backtest(&bars, &RunSettings::new(config)).unwrap();
        let m = single.metrics.expect("row implies trades");
        assert_eq!(row.total_trades, m.total_trades);
        assert_eq!(row.total_profit, m.total_profit);
        assert_eq!(row.profit_percentage, m.profit_percentage);
        assert_eq!(row.max_drawdown, m.max_drawdown);
    }

    if let Some(best) = &report.best {
        let best_sharpe = best.sharpe_ratio;
        assert!(report
            .rows
            .iter()
            .filter(|r| !r.sharpe_ratio.is_nan())
            .all(|r| r.sharpe_ratio <= best_sharpe || best_sharpe.is_nan()));
    }
}

#[test]
fn sweep_does_not_mutate_base_config() {
    let bars = synthetic_minute_bars(500, 3);
    let base = StrategyConfig {
        trailing_stop: true,
        trailing_stop_ticks: 7,
        ..StrategyConfig::default()
    };
    let optimizer = Optimizer::new(&bars, base.clone());
    let _ = optimizer.run(&ParamGrid::default());
    let _ = optimizer.run(&ParamGrid::default());
    assert_eq!(base.trailing_stop_ticks, 7);
}

#[test]
fn optimization_csv_written() {
    let dir = tempfile::tempdir().unwrap();
    let bars = synthetic_minute_bars(3_000, 8);
    let grid = ParamGrid {
        tp_ticks: vec![10, 20],
        sl_ticks: vec![10],
        trailing_ticks: vec![0],
    };
    let report = Optimizer::new(&bars, StrategyConfig::default())
        .with_parallelism(false)
        .run(&grid);
    let path = save_optimization(&report, dir.path()).unwrap();

    let text = std::fs::read_to_string(path).unwrap();
    assert_eq!(text.lines().count(), report.rows.len() + 1);
}
