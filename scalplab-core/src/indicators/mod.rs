//! Indicators and the EMA-augmented bar view.
//!
//! Indicators are pure functions: bar history in, numeric series out. They are
//! computed once before the bar loop and queried by index during signal detection.

pub mod ema;

pub use ema::{ema_of_series, Ema};

use crate::domain::Bar;

/// Trait for indicators.
///
/// Indicators take a full bar series and produce an output series of the same
/// length. No value at bar t may depend on bars after t.
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g., "ema_9").
    fn name(&self) -> &str;

    /// Number of bars needed before the indicator produces a settled value.
    fn lookback(&self) -> usize;

    /// Compute the indicator for the entire bar series.
    fn compute(&self, bars: &[Bar]) -> Vec<f64>;
}

/// A bar series paired with its EMA column.
///
/// This is the view the signal detector scans. The bars are borrowed, never
/// copied or mutated; the EMA column is owned and always the same length.
#[derive(Debug, Clone)]
pub struct BarView<'a> {
    bars: &'a [Bar],
    ema: Vec<f64>,
}

impl<'a> BarView<'a> {
    /// Compute `indicator` over `bars` and attach it as the EMA column.
    pub fn new(bars: &'a [Bar], indicator: &dyn Indicator) -> Self {
        Self {
            bars,
            ema: indicator.compute(bars),
        }
    }

    /// Build a view from a precomputed column.
    ///
    /// # Panics
    /// Panics if `ema` and `bars` differ in length.
    pub fn with_ema(bars: &'a [Bar], ema: Vec<f64>) -> Self {
        assert_eq!(bars.len(), ema.len(), "EMA column must match bar count");
        Self { bars, ema }
    }

    pub fn bars(&self) -> &'a [Bar] {
        self.bars
    }

    pub fn ema(&self) -> &[f64] {
        &self.ema
    }

    pub fn bar(&self, index: usize) -> &'a Bar {
        &self.bars[index]
    }

    pub fn ema_at(&self, index: usize) -> f64 {
        self.ema[index]
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}

/// Create synthetic minute bars from close prices for testing.
///
/// open = prev_close (or close for the first bar), high/low = max/min(open, close) ± 0.25.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<Bar> {
    let base = chrono::NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(9, 30, 0)
        .unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar::new(
                base + chrono::Duration::minutes(i as i64),
                open,
                open.max(close) + 0.25,
                open.min(close) - 0.25,
                close,
            )
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
