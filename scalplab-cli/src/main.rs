//! ScalpLab CLI — run and optimize commands.
//!
//! Commands:
//! - `run`: single backtest from a CSV, a run file, or synthetic bars
//! - `optimize`: grid search over take-profit / stop-loss / trailing ticks

mod obs;

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};

use scalplab_core::config::StrategyConfig;
use scalplab_runner::data_loader::{load_bars, DataSource, LoadedData};
use scalplab_runner::optimizer::{GridOutcome, OptimizationReport, Optimizer};
use scalplab_runner::runner::{run_backtest_from_data, BacktestResult, RunSettings};
use scalplab_runner::{save_artifacts, save_optimization, RunFile};

#[derive(Parser)]
#[command(name = "scalplab", about = "ScalpLab CLI: intraday EMA exhaustion-reversal backtester")]
struct Cli {
    /// Log filter (overridden by SCALPLAB_LOG).
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Log output format: text or json.
    #[arg(long, global = true, default_value = "text")]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

/// Where bars and base settings come from.
#[derive(Args)]
struct InputArgs {
    /// Path to a TOML or JSON run file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to a bar CSV (overrides the run file's `data`).
    #[arg(long)]
    data: Option<PathBuf>,

    /// Use N synthetic minute bars instead of a CSV.
    #[arg(long, value_name = "N")]
    synthetic: Option<usize>,

    /// Seed for --synthetic.
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// EMA span (default 9, or the run file's value).
    #[arg(long)]
    ema_span: Option<usize>,

    /// Output directory for artifacts.
    #[arg(long, default_value = "results")]
    output_dir: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a single backtest.
    Run {
        #[command(flatten)]
        input: InputArgs,

        /// Take-profit distance in ticks.
        #[arg(long)]
        tp: Option<u32>,

        /// Stop-loss distance in ticks.
        #[arg(long)]
        sl: Option<u32>,

        /// Trailing-stop distance in ticks (0 disables).
        #[arg(long)]
        trailing: Option<u32>,
    },
    /// Grid-search exit parameters and report the best Sharpe ratio.
    Optimize {
        #[command(flatten)]
        input: InputArgs,

        /// Take-profit ticks to test, comma separated.
        #[arg(long, value_delimiter = ',')]
        tp: Vec<u32>,

        /// Stop-loss ticks to test, comma separated.
        #[arg(long, value_delimiter = ',')]
        sl: Vec<u32>,

        /// Trailing ticks to test, comma separated (0 = no trailing stop).
        #[arg(long, value_delimiter = ',')]
        trailing: Vec<u32>,

        /// Evaluate grid points one at a time.
        #[arg(long, default_value_t = false)]
        sequential: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    obs::init_tracing(&cli.log_level, &cli.log_format)?;

    match cli.command {
        Commands::Run {
            input,
            tp,
            sl,
            trailing,
        } => run_backtest_cmd(input, tp, sl, trailing),
        Commands::Optimize {
            input,
            tp,
            sl,
            trailing,
            sequential,
        } => run_optimize_cmd(input, tp, sl, trailing, sequential),
    }
}

/// Resolved inputs shared by both commands.
struct Prepared {
    data: LoadedData,
    config: StrategyConfig,
    ema_span: usize,
    file: RunFile,
}

fn prepare(input: &InputArgs) -> Result<Prepared> {
    let file = match &input.config {
        Some(path) => RunFile::load(path)
            .with_context(|| format!("failed to load run file {}", path.display()))?,
        None => RunFile::default(),
    };
    let config = file.strategy.to_config()?;
    let ema_span = match input.ema_span {
        Some(0) => bail!("--ema-span must be >= 1"),
        Some(span) => span,
        None => file.ema_span()?,
    };

    let source = if let Some(n) = input.synthetic {
        DataSource::Synthetic {
            bars: n,
            seed: input.seed,
        }
    } else if let Some(path) = input.data.clone().or_else(|| file.data.clone()) {
        DataSource::Csv(path)
    } else {
        bail!("no bar data: pass --data <csv>, --synthetic <n>, or a run file with `data`");
    };
    let data = load_bars(&source)?;

    Ok(Prepared {
        data,
        config,
        ema_span,
        file,
    })
}

fn run_backtest_cmd(
    input: InputArgs,
    tp: Option<u32>,
    sl: Option<u32>,
    trailing: Option<u32>,
) -> Result<()> {
    let prepared = prepare(&input)?;

    let mut config = prepared.config;
    if tp.is_some() || sl.is_some() || trailing.is_some() {
        let current_trailing = if config.trailing_stop {
            config.trailing_stop_ticks
        } else {
            0
        };
        config = config.with_exit_params(
            tp.unwrap_or(config.tp_ticks),
            sl.unwrap_or(config.sl_ticks),
            trailing.unwrap_or(current_trailing),
        );
    }

    let settings = RunSettings::new(config).with_ema_span(prepared.ema_span);
    let result = run_backtest_from_data(&prepared.data, &settings)?;

    print_summary(&result);

    let run_dir = save_artifacts(&result, &input.output_dir)?;
    println!("Artifacts saved to: {}", run_dir.display());

    Ok(())
}

fn run_optimize_cmd(
    input: InputArgs,
    tp: Vec<u32>,
    sl: Vec<u32>,
    trailing: Vec<u32>,
    sequential: bool,
) -> Result<()> {
    let prepared = prepare(&input)?;

    let mut grid = prepared
        .file
        .optimize
        .as_ref()
        .map(|o| o.to_grid())
        .unwrap_or_default();
    if !tp.is_empty() {
        grid.tp_ticks = tp;
    }
    if !sl.is_empty() {
        grid.sl_ticks = sl;
    }
    if !trailing.is_empty() {
        grid.trailing_ticks = trailing;
    }

    let optimizer = Optimizer::new(&prepared.data.bars, prepared.config)
        .with_ema_span(prepared.ema_span)
        .with_parallelism(!sequential);

    let done = AtomicUsize::new(0);
    let report = optimizer.run_with_progress(&grid, |_, total, point| {
        let n = done.fetch_add(1, Ordering::Relaxed) + 1;
        let status = match &point.outcome {
            GridOutcome::Scored(row) => format!("{} trades", row.total_trades),
            GridOutcome::NoTrades => "no trades".to_string(),
            GridOutcome::Failed(err) => format!("error: {err}"),
        };
        eprintln!("[{n}/{total}] {}: {status}", point.point);
    });

    let path = save_optimization(&report, &input.output_dir)?;
    print_optimization(&report);
    println!("Results saved to: {}", path.display());

    Ok(())
}

fn fmt_ratio(v: f64) -> String {
    if v.is_nan() {
        "n/a".to_string()
    } else {
        format!("{v:.3}")
    }
}

fn print_summary(result: &BacktestResult) {
    println!();
    println!("=== Backtest Result ===");
    println!("Run ID:         {}", &result.run_id[..12.min(result.run_id.len())]);
    println!("Bars:           {}", result.bar_count);
    println!("Signals:        {}", result.signal_count);
    println!(
        "Exits:          TP {} / SL {} ticks, trailing {}",
        result.config.tp_ticks,
        result.config.sl_ticks,
        if result.config.trailing_stop {
            format!("{} ticks", result.config.trailing_stop_ticks)
        } else {
            "off".to_string()
        }
    );

    let Some(m) = &result.metrics else {
        println!();
        println!("No trades executed.");
        if result.is_synthetic {
            println!("WARNING: Results based on SYNTHETIC data");
        }
        println!();
        return;
    };

    println!("Trades:         {}", m.total_trades);
    println!();
    println!("--- Performance ---");
    println!("Total Profit:   {:.2}", m.total_profit);
    println!("Profit %:       {:.3}%", m.profit_percentage);
    println!("Avg Profit:     {:.2}", m.avg_profit);
    println!("Win Rate:       {:.1}%", m.win_rate * 100.0);
    println!("Max Drawdown:   {:.2}", m.max_drawdown);
    println!("Sharpe:         {}", fmt_ratio(m.sharpe_ratio));
    println!("Avg Win:        {:.2}", m.avg_win);
    println!("Avg Loss:       {:.2}", m.avg_loss);
    println!("Best Trade:     {:.2}", m.best_trade);
    println!("Worst Trade:    {:.2}", m.worst_trade);
    println!("Profit Factor:  {}", fmt_ratio(m.profit_factor));
    println!("Max Consec Win: {}", m.max_consecutive_wins);
    println!("Max Consec Loss:{}", m.max_consecutive_losses);
    println!("Final Balance:  {:.2}", result.final_balance);
    if result.discarded_position.is_some() {
        println!("Note: position open at end of data was discarded");
    }
    if result.is_synthetic {
        println!();
        println!("WARNING: Results based on SYNTHETIC data");
    }
    println!();
}

fn print_optimization(report: &OptimizationReport) {
    println!();
    let failed = report.failures().count();
    if failed > 0 {
        println!("{failed} grid point(s) failed; see log for details.");
    }
    let Some(best) = &report.best else {
        println!("No trades found in any configuration.");
        return;
    };
    println!("=== Best Parameters Found ===");
    println!("TP Ticks:       {}", best.tp_ticks);
    println!("SL Ticks:       {}", best.sl_ticks);
    println!("Trailing Ticks: {}", best.trailing_ticks);
    println!("Total Profit:   {:.2}", best.total_profit);
    println!("Profit %:       {:.3}%", best.profit_percentage);
    println!("Win Rate:       {:.1}%", best.win_rate * 100.0);
    println!("Sharpe:         {}", fmt_ratio(best.sharpe_ratio));
    println!("Max Drawdown:   {:.2}", best.max_drawdown);
    println!("Total Trades:   {}", best.total_trades);
    println!("Avg Profit:     {:.2}", best.avg_profit);
    println!("({} of {} configurations traded)", report.rows.len(), report.outcomes.len());
    println!();
}
