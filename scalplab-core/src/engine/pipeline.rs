//! One full strategy pass: EMA → signal tags → simulation.

use crate::config::StrategyConfig;
use crate::domain::{Bar, Signal};
use crate::indicators::{BarView, Ema};
use crate::signals::{count_entries, detect_signals, ExhaustionReversal};

use super::simulator::{simulate, SimError, SimulationOutput};

/// Everything one pass produces, kept for inspection and export.
#[derive(Debug, Clone)]
pub struct StrategyRun {
    pub ema: Vec<f64>,
    pub signals: Vec<Signal>,
    pub simulation: SimulationOutput,
}

impl StrategyRun {
    /// Bars tagged with an entry signal (traded or not).
    pub fn signal_count(&self) -> usize {
        count_entries(&self.signals)
    }
}

/// Run the exhaustion-reversal strategy over `bars`.
///
/// The bar series is only read. Repeated calls with the same inputs produce
/// identical results.
pub fn run_strategy(
    bars: &[Bar],
    ema_span: usize,
    config: &StrategyConfig,
) -> Result<StrategyRun, SimError> {
    config.validate()?;
    if ema_span == 0 {
        return Err(SimError::ZeroEmaSpan);
    }

    let view = BarView::new(bars, &Ema::new(ema_span));
    let signals = detect_signals(&ExhaustionReversal::new(), &view);
    let simulation = simulate(bars, &signals, config)?;

    tracing::debug!(
        bars = bars.len(),
        signals = count_entries(&signals),
        trades = simulation.trades.len(),
        final_balance = simulation.final_balance,
        "strategy pass complete"
    );

    Ok(StrategyRun {
        ema: view.ema().to_vec(),
        signals,
        simulation,
    })
}
