//! Exhaustion reversal — three same-colored candles on one side of the EMA,
//! then a close back across it.
//!
//! Long:  bars i-3..i-1 all bearish (close < open) and closed below their EMA,
//!        bar i closes strictly above its EMA.
//! Short: bars i-3..i-1 all bullish (close > open) and closed above their EMA,
//!        bar i closes strictly below its EMA.
//!
//! The long pattern is checked first; if both somehow held, long wins.

use super::SignalDetector;
use crate::domain::Signal;
use crate::indicators::BarView;

/// Number of consecutive setup candles preceding the trigger bar.
pub const SETUP_BARS: usize = 3;

#[derive(Debug, Clone, Default)]
pub struct ExhaustionReversal;

impl ExhaustionReversal {
    pub fn new() -> Self {
        Self
    }

    fn long_setup(view: &BarView<'_>, bar_index: usize) -> bool {
        (bar_index - SETUP_BARS..bar_index).all(|j| {
            let bar = view.bar(j);
            bar.is_bearish() && bar.close < view.ema_at(j)
        })
    }

    fn short_setup(view: &BarView<'_>, bar_index: usize) -> bool {
        (bar_index - SETUP_BARS..bar_index).all(|j| {
            let bar = view.bar(j);
            bar.is_bullish() && bar.close > view.ema_at(j)
        })
    }
}

impl SignalDetector for ExhaustionReversal {
    fn name(&self) -> &str {
        "exhaustion_reversal"
    }

    fn warmup_bars(&self) -> usize {
        SETUP_BARS
    }

    fn evaluate(&self, view: &BarView<'_>, bar_index: usize) -> Signal {
        if bar_index < SETUP_BARS || bar_index >= view.len() {
            return Signal::None;
        }

        let close = view.bar(bar_index).close;
        let ema = view.ema_at(bar_index);

        if Self::long_setup(view, bar_index) && close > ema {
            return Signal::Long;
        }
        if Self::short_setup(view, bar_index) && close < ema {
            return Signal::Short;
        }
        Signal::None
    }
}
