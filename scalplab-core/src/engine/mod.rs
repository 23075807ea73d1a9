//! Backtesting engine — single-position trade simulation.
//!
//! The engine consumes the bar series and its per-bar signal tags and runs a
//! two-state machine (flat / in position) bar by bar:
//!
//! 1. In position: update the trailing extreme, test take-profit then stop-loss
//! 2. Flat: open a position on a non-zero signal at the bar's close
//!
//! A bar that ran an exit check never evaluates an entry.

pub mod pipeline;
pub mod simulator;
pub mod sizing;

pub use pipeline::{run_strategy, StrategyRun};
pub use simulator::{
    exit_levels, net_pnl, simulate, BarEvent, ExitLevels, SimError, SimState, SimulationOutput,
    Simulator, FIRST_TRADABLE_BAR,
};
pub use sizing::{contracts_for, SizingLimits};
