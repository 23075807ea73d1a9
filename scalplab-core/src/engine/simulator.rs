//! Trade simulator — the flat / in-position state machine.
//!
//! At most one position is open at any time. Exits are tested before entries,
//! and a bar that ran an exit check (whether or not it exited) never opens a
//! new position. A position still open when the data ends is discarded, not
//! force-closed.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{ConfigError, StrategyConfig};
use crate::domain::{Bar, ClosedTrade, ExitReason, OpenPosition, Side, Signal};

use super::sizing::contracts_for;

/// Index of the first bar the simulator processes.
///
/// The detector can tag bar 3 at the earliest; the simulator starts one bar
/// later, so a tag on bar 3 is never traded.
pub const FIRST_TRADABLE_BAR: usize = 4;

/// Errors from a simulation run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    #[error("invalid config: {0}")]
    InvalidConfig(#[from] ConfigError),
    #[error("signal count {signals} does not match bar count {bars}")]
    LengthMismatch { bars: usize, signals: usize },
    #[error("non-finite pnl {pnl} at bar {bar_index}")]
    NonFinitePnl { bar_index: usize, pnl: f64 },
    #[error("ema_span must be >= 1")]
    ZeroEmaSpan,
}

/// Simulator state between bars.
#[derive(Debug, Clone, PartialEq)]
pub enum SimState {
    Flat,
    InPosition(OpenPosition),
}

impl SimState {
    pub fn position(&self) -> Option<&OpenPosition> {
        match self {
            Self::Flat => None,
            Self::InPosition(pos) => Some(pos),
        }
    }

    pub fn is_flat(&self) -> bool {
        matches!(self, Self::Flat)
    }
}

/// Exit prices in force for one bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExitLevels {
    pub take_profit: f64,
    /// Effective stop: the static stop, tightened toward the trailing level.
    pub stop_loss: f64,
}

/// What happened on one bar.
#[derive(Debug, Clone, PartialEq)]
pub enum BarEvent {
    /// Flat and no signal.
    Idle,
    /// Flat, signal present, but sizing allowed zero contracts.
    EntrySkipped,
    Entered {
        side: Side,
        price: f64,
        quantity: u32,
    },
    /// Position survived the exit checks.
    Held(ExitLevels),
    Exited(ClosedTrade),
}

/// Result of simulating a full bar series.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationOutput {
    pub trades: Vec<ClosedTrade>,
    pub final_balance: f64,
    /// Position still open at the end of data. Never booked into the balance.
    pub discarded_position: Option<OpenPosition>,
    pub bars_processed: usize,
    pub skipped_entries: usize,
}

/// Compute this bar's exit levels, advancing the trailing extreme first.
///
/// With trailing enabled the stop becomes the tighter of the static stop and
/// `extreme ∓ trailing distance`; it never loosens past the static stop.
pub fn exit_levels(position: &mut OpenPosition, bar: &Bar, config: &StrategyConfig) -> ExitLevels {
    let entry = position.entry_price;
    let (take_profit, mut stop_loss) = match position.side {
        Side::Long => (entry + config.tp_distance(), entry - config.sl_distance()),
        Side::Short => (entry - config.tp_distance(), entry + config.sl_distance()),
    };

    if config.trailing_stop {
        position.track_extreme(bar.high, bar.low);
        stop_loss = match position.side {
            Side::Long => stop_loss.max(position.extreme_price - config.trailing_distance()),
            Side::Short => stop_loss.min(position.extreme_price + config.trailing_distance()),
        };
    }

    ExitLevels {
        take_profit,
        stop_loss,
    }
}

/// Exit test. Take-profit is checked before stop-loss on both sides.
fn triggered_exit(side: Side, bar: &Bar, levels: &ExitLevels) -> Option<(f64, ExitReason)> {
    match side {
        Side::Long => {
            if bar.high >= levels.take_profit {
                Some((levels.take_profit, ExitReason::TakeProfit))
            } else if bar.low <= levels.stop_loss {
                Some((levels.stop_loss, ExitReason::StopLoss))
            } else {
                None
            }
        }
        Side::Short => {
            if bar.low <= levels.take_profit {
                Some((levels.take_profit, ExitReason::TakeProfit))
            } else if bar.high >= levels.stop_loss {
                Some((levels.stop_loss, ExitReason::StopLoss))
            } else {
                None
            }
        }
    }
}

/// Bar-by-bar trade simulator over one immutable config.
#[derive(Debug, Clone)]
pub struct Simulator<'c> {
    config: &'c StrategyConfig,
    state: SimState,
    balance: f64,
    trades: Vec<ClosedTrade>,
    bars_processed: usize,
    skipped_entries: usize,
}

impl<'c> Simulator<'c> {
    pub fn new(config: &'c StrategyConfig) -> Result<Self, SimError> {
        config.validate()?;
        Ok(Self {
            config,
            state: SimState::Flat,
            balance: config.starting_balance,
            trades: Vec::new(),
            bars_processed: 0,
            skipped_entries: 0,
        })
    }

    pub fn state(&self) -> &SimState {
        &self.state
    }

    pub fn balance(&self) -> f64 {
        self.balance
    }

    pub fn trades(&self) -> &[ClosedTrade] {
        &self.trades
    }

    /// Advance the state machine by one bar.
    ///
    /// `bar_index` is only used for error reporting.
    pub fn on_bar(
        &mut self,
        bar_index: usize,
        bar: &Bar,
        signal: Signal,
    ) -> Result<BarEvent, SimError> {
        self.bars_processed += 1;

        if let SimState::InPosition(position) = &mut self.state {
            let levels = exit_levels(position, bar, self.config);
            let Some((exit_price, outcome)) = triggered_exit(position.side, bar, &levels) else {
                return Ok(BarEvent::Held(levels));
            };

            let pnl = net_pnl(self.config, position, exit_price);
            if !pnl.is_finite() {
                return Err(SimError::NonFinitePnl { bar_index, pnl });
            }
            self.balance += pnl;

            let trade = ClosedTrade {
                entry_time: position.entry_time,
                exit_time: bar.timestamp,
                side: position.side,
                entry_price: position.entry_price,
                exit_price,
                quantity: position.quantity,
                pnl,
                outcome,
                balance_after: self.balance,
            };
            tracing::trace!(
                bar_index,
                side = trade.side.as_str(),
                exit_price,
                pnl,
                outcome = outcome.code(),
                "position closed"
            );
            self.trades.push(trade.clone());
            self.state = SimState::Flat;
            return Ok(BarEvent::Exited(trade));
        }

        let Some(side) = signal.side() else {
            return Ok(BarEvent::Idle);
        };

        let quantity = contracts_for(self.balance, self.config);
        if quantity < 1 {
            self.skipped_entries += 1;
            return Ok(BarEvent::EntrySkipped);
        }

        tracing::trace!(bar_index, side = side.as_str(), price = bar.close, "position opened");
        self.state = SimState::InPosition(OpenPosition::open(
            side,
            bar.timestamp,
            bar.close,
            quantity,
        ));
        Ok(BarEvent::Entered {
            side,
            price: bar.close,
            quantity,
        })
    }

    /// Close out the run. Any open position is returned as discarded.
    pub fn finish(self) -> SimulationOutput {
        SimulationOutput {
            trades: self.trades,
            final_balance: self.balance,
            discarded_position: match self.state {
                SimState::Flat => None,
                SimState::InPosition(pos) => Some(pos),
            },
            bars_processed: self.bars_processed,
            skipped_entries: self.skipped_entries,
        }
    }
}

/// Net PnL of closing `position` at `exit_price`, after round-trip costs.
pub fn net_pnl(config: &StrategyConfig, position: &OpenPosition, exit_price: f64) -> f64 {
    let gross = (exit_price - position.entry_price) * position.quantity as f64 * config.tick_value
        / config.tick_size;
    gross * position.side.sign() - config.round_trip_cost()
}

/// Simulate a full bar series against its signal tags.
///
/// Processing starts at `FIRST_TRADABLE_BAR`. `bars` must be sorted ascending by
/// timestamp; this is not checked.
pub fn simulate(
    bars: &[Bar],
    signals: &[Signal],
    config: &StrategyConfig,
) -> Result<SimulationOutput, SimError> {
    if bars.len() != signals.len() {
        return Err(SimError::LengthMismatch {
            bars: bars.len(),
            signals: signals.len(),
        });
    }

    let mut sim = Simulator::new(config)?;
    for (i, (bar, &signal)) in bars
        .iter()
        .zip(signals)
        .enumerate()
        .skip(FIRST_TRADABLE_BAR)
    {
        sim.on_bar(i, bar, signal)?;
    }
    Ok(sim.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn ts(minute: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
            + chrono::Duration::minutes(minute)
    }

    fn ohlc(minute: i64, open: f64, high: f64, low: f64, close: f64) -> Bar {
        Bar::new(ts(minute), open, high, low, close)
    }

    fn quiet(minute: i64, price: f64) -> Bar {
        ohlc(minute, price, price + 0.25, price - 0.25, price)
    }

    fn scenario_config() -> StrategyConfig {
        StrategyConfig {
            tp_ticks: 20,
            sl_ticks: 20,
            tick_size: 0.25,
            tick_value: 5.0,
            commission_per_trade: 5.0,
            slippage_ticks: 1.0,
            ..StrategyConfig::default()
        }
    }

    #[test]
    fn long_take_profit_scenario() {
        let config = scenario_config();
        let mut sim = Simulator::new(&config).unwrap();

        let entry = sim.on_bar(4, &quiet(4, 100.0), Signal::Long).unwrap();
        assert_eq!(
            entry,
            BarEvent::Entered {
                side: Side::Long,
                price: 100.0,
                quantity: 1
            }
        );

        let exit = sim
            .on_bar(5, &ohlc(5, 100.0, 105.25, 99.5, 105.0), Signal::None)
            .unwrap();
        let BarEvent::Exited(trade) = exit else {
            panic!("expected exit, got {exit:?}");
        };
        assert_eq!(trade.exit_price, 105.0);
        assert_eq!(trade.outcome, ExitReason::TakeProfit);
        // 20 ticks * $5 - (5 + 1 * 5 * 2)
        assert_eq!(trade.pnl, 85.0);
        assert_eq!(trade.balance_after, 100_085.0);
        assert!(sim.state().is_flat());
    }

    #[test]
    fn long_stop_loss_pnl() {
        let config = scenario_config();
        let mut sim = Simulator::new(&config).unwrap();
        sim.on_bar(4, &quiet(4, 100.0), Signal::Long).unwrap();
        let event = sim
            .on_bar(5, &ohlc(5, 100.0, 100.5, 94.0, 94.5), Signal::None)
            .unwrap();
        let BarEvent::Exited(trade) = event else {
            panic!("expected exit");
        };
        assert_eq!(trade.exit_price, 95.0);
        assert_eq!(trade.outcome, ExitReason::StopLoss);
        assert_eq!(trade.pnl, -115.0);
    }

    #[test]
    fn long_take_profit_wins_when_bar_spans_both_levels() {
        let config = scenario_config();
        let mut sim = Simulator::new(&config).unwrap();
        sim.on_bar(4, &quiet(4, 100.0), Signal::Long).unwrap();
        let event = sim
            .on_bar(5, &ohlc(5, 100.0, 106.0, 94.0, 100.0), Signal::None)
            .unwrap();
        assert!(matches!(
            event,
            BarEvent::Exited(ClosedTrade {
                outcome: ExitReason::TakeProfit,
                ..
            })
        ));
    }

    #[test]
    fn short_take_profit_and_stop_mirror() {
        let config = scenario_config();

        let mut sim = Simulator::new(&config).unwrap();
        sim.on_bar(4, &quiet(4, 100.0), Signal::Short).unwrap();
        let BarEvent::Exited(tp) = sim
            .on_bar(5, &ohlc(5, 100.0, 100.5, 94.75, 95.0), Signal::None)
            .unwrap()
        else {
            panic!("expected short take-profit");
        };
        assert_eq!(tp.exit_price, 95.0);
        assert_eq!(tp.outcome, ExitReason::TakeProfit);
        assert_eq!(tp.pnl, 85.0);

        let mut sim = Simulator::new(&config).unwrap();
        sim.on_bar(4, &quiet(4, 100.0), Signal::Short).unwrap();
        let BarEvent::Exited(sl) = sim
            .on_bar(5, &ohlc(5, 100.0, 105.0, 99.0, 104.0), Signal::None)
            .unwrap()
        else {
            panic!("expected short stop-loss");
        };
        assert_eq!(sl.exit_price, 105.0);
        assert_eq!(sl.outcome, ExitReason::StopLoss);
        assert_eq!(sl.pnl, -115.0);
    }

    #[test]
    fn held_bar_ignores_new_signals() {
        let config = scenario_config();
        let mut sim = Simulator::new(&config).unwrap();
        sim.on_bar(4, &quiet(4, 100.0), Signal::Long).unwrap();
        let event = sim.on_bar(5, &quiet(5, 100.5), Signal::Short).unwrap();
        assert!(matches!(event, BarEvent::Held(_)));
        assert_eq!(sim.state().position().unwrap().side, Side::Long);
    }

    #[test]
    fn exit_bar_does_not_reenter() {
        let config = scenario_config();
        let mut sim = Simulator::new(&config).unwrap();
        sim.on_bar(4, &quiet(4, 100.0), Signal::Long).unwrap();
        let event = sim
            .on_bar(5, &ohlc(5, 100.0, 105.25, 99.5, 105.0), Signal::Short)
            .unwrap();
        assert!(matches!(event, BarEvent::Exited(_)));
        assert!(sim.state().is_flat());

        let next = sim.on_bar(6, &quiet(6, 105.0), Signal::Short).unwrap();
        assert!(matches!(next, BarEvent::Entered { side: Side::Short, .. }));
    }

    #[test]
    fn trailing_stop_tightens_and_exits() {
        let config = StrategyConfig {
            trailing_stop: true,
            trailing_stop_ticks: 4, // 1.0 point
            ..scenario_config()
        };
        let mut sim = Simulator::new(&config).unwrap();
        sim.on_bar(4, &quiet(4, 100.0), Signal::Long).unwrap();

        // High 102 -> trailing level 101, above the static 95 stop.
        let BarEvent::Held(levels) = sim
            .on_bar(5, &ohlc(5, 100.0, 102.0, 101.5, 101.75), Signal::None)
            .unwrap()
        else {
            panic!("expected hold");
        };
        assert_eq!(levels.stop_loss, 101.0);
        assert_eq!(levels.take_profit, 105.0);

        // Lower high does not loosen the stop; low touches it.
        let BarEvent::Exited(trade) = sim
            .on_bar(6, &ohlc(6, 101.5, 101.75, 100.5, 100.75), Signal::None)
            .unwrap()
        else {
            panic!("expected trailing exit");
        };
        assert_eq!(trade.exit_price, 101.0);
        assert_eq!(trade.outcome, ExitReason::StopLoss);
        // 4 ticks * $5 - 15
        assert_eq!(trade.pnl, 5.0);
    }

    #[test]
    fn trailing_disabled_keeps_extreme_at_entry() {
        let config = scenario_config();
        let mut sim = Simulator::new(&config).unwrap();
        sim.on_bar(4, &quiet(4, 100.0), Signal::Long).unwrap();
        let BarEvent::Held(levels) = sim
            .on_bar(5, &ohlc(5, 100.0, 104.0, 99.0, 103.0), Signal::None)
            .unwrap()
        else {
            panic!("expected hold");
        };
        assert_eq!(levels.stop_loss, 95.0);
        assert_eq!(sim.state().position().unwrap().extreme_price, 100.0);
    }

    #[test]
    fn short_trailing_stop_moves_down() {
        let config = StrategyConfig {
            trailing_stop: true,
            trailing_stop_ticks: 8, // 2.0 points
            ..scenario_config()
        };
        let mut position = OpenPosition::open(Side::Short, ts(0), 100.0, 1);
        let levels = exit_levels(&mut position, &ohlc(1, 100.0, 100.5, 97.0, 97.5), &config);
        assert_eq!(levels.stop_loss, 99.0);
        assert_eq!(levels.take_profit, 95.0);
        assert_eq!(position.extreme_price, 97.0);
    }

    #[test]
    fn simulate_skips_leading_bars_and_discards_open_position() {
        let config = scenario_config();
        let bars: Vec<Bar> = (0..7).map(|i| quiet(i, 100.0)).collect();
        let mut signals = vec![Signal::None; 7];
        signals[3] = Signal::Long; // before the first tradable bar
        signals[5] = Signal::Short;

        let out = simulate(&bars, &signals, &config).unwrap();
        assert!(out.trades.is_empty());
        assert_eq!(out.final_balance, 100_000.0);
        let open = out.discarded_position.expect("open position at end");
        assert_eq!(open.side, Side::Short);
        assert_eq!(open.entry_time, ts(5));
        assert_eq!(out.bars_processed, 3);
    }

    #[test]
    fn simulate_short_input() {
        let config = scenario_config();
        let bars: Vec<Bar> = (0..3).map(|i| quiet(i, 100.0)).collect();
        let out = simulate(&bars, &[Signal::None; 3], &config).unwrap();
        assert!(out.trades.is_empty());
        assert_eq!(out.bars_processed, 0);

        let empty = simulate(&[], &[], &config).unwrap();
        assert!(empty.trades.is_empty());
        assert_eq!(empty.final_balance, config.starting_balance);
    }

    #[test]
    fn simulate_rejects_length_mismatch() {
        let config = scenario_config();
        let bars: Vec<Bar> = (0..5).map(|i| quiet(i, 100.0)).collect();
        assert_eq!(
            simulate(&bars, &[Signal::None; 4], &config),
            Err(SimError::LengthMismatch {
                bars: 5,
                signals: 4
            })
        );
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = StrategyConfig {
            tick_size: 0.0,
            ..StrategyConfig::default()
        };
        assert!(matches!(
            Simulator::new(&config),
            Err(SimError::InvalidConfig(_))
        ));
    }

    #[test]
    fn non_finite_pnl_is_an_error() {
        // Finite but huge tick value: the gross PnL overflows.
        let config = StrategyConfig {
            tick_value: f64::MAX / 2.0,
            ..scenario_config()
        };
        let mut sim = Simulator::new(&config).unwrap();
        sim.on_bar(4, &quiet(4, 100.0), Signal::Long).unwrap();
        let err = sim
            .on_bar(5, &ohlc(5, 100.0, 105.25, 99.5, 105.0), Signal::None)
            .unwrap_err();
        assert!(matches!(err, SimError::NonFinitePnl { bar_index: 5, .. }));
    }

    #[test]
    fn net_pnl_signs_and_costs() {
        let config = scenario_config();
        let long = OpenPosition::open(Side::Long, ts(0), 100.0, 1);
        let short = OpenPosition::open(Side::Short, ts(0), 100.0, 2);

        assert_eq!(net_pnl(&config, &long, 105.0), 85.0);
        assert_eq!(net_pnl(&config, &long, 95.0), -115.0);
        // Two contracts, 20 ticks in favour: 2 * 100 - 15
        assert_eq!(net_pnl(&config, &short, 95.0), 185.0);
        assert_eq!(net_pnl(&config, &short, 100.0), -15.0);
    }

    #[test]
    fn margin_and_risk_sizing_skips_unaffordable_entry() {
        let config = StrategyConfig {
            sizing: crate::config::SizingMode::MarginAndRisk,
            starting_balance: 10_000.0,
            ..scenario_config()
        };
        let mut sim = Simulator::new(&config).unwrap();
        let event = sim.on_bar(4, &quiet(4, 100.0), Signal::Long).unwrap();
        assert_eq!(event, BarEvent::EntrySkipped);
        assert!(sim.state().is_flat());
        assert_eq!(sim.finish().skipped_entries, 1);
    }

    #[test]
    fn margin_and_risk_sizing_scales_pnl() {
        let config = StrategyConfig {
            sizing: crate::config::SizingMode::MarginAndRisk,
            ..scenario_config()
        };
        let mut sim = Simulator::new(&config).unwrap();
        let event = sim.on_bar(4, &quiet(4, 100.0), Signal::Long).unwrap();
        assert_eq!(
            event,
            BarEvent::Entered {
                side: Side::Long,
                price: 100.0,
                quantity: 7
            }
        );
        let BarEvent::Exited(trade) = sim
            .on_bar(5, &ohlc(5, 100.0, 105.25, 99.5, 105.0), Signal::None)
            .unwrap()
        else {
            panic!("expected exit");
        };
        // 7 contracts * $100 - 15 (costs are per round trip, not per contract)
        assert_eq!(trade.pnl, 685.0);
    }
}
