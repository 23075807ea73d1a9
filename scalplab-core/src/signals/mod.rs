//! Signal detection — scans the EMA-augmented series for entry triggers.
//!
//! Detectors are portfolio-agnostic: they see bar history and the EMA column,
//! never position or balance state. A detector evaluating bar `i` may only read
//! bars `0..=i`.

pub mod exhaustion;

pub use exhaustion::ExhaustionReversal;

use crate::domain::Signal;
use crate::indicators::BarView;

/// Trait for entry-signal detectors.
///
/// # Invariants
/// - `evaluate()` MUST be deterministic for the same view
/// - `evaluate()` MUST NOT read bars after `bar_index`
pub trait SignalDetector: Send + Sync {
    /// Detector name for logging.
    fn name(&self) -> &str;

    /// Number of leading bars that never produce a signal.
    fn warmup_bars(&self) -> usize;

    /// Signal tag for `bar_index`.
    fn evaluate(&self, view: &BarView<'_>, bar_index: usize) -> Signal;
}

/// Run `detector` over every bar, producing one tag per bar.
///
/// Bars inside the warmup window are tagged `Signal::None`.
pub fn detect_signals(detector: &dyn SignalDetector, view: &BarView<'_>) -> Vec<Signal> {
    let warmup = detector.warmup_bars();
    (0..view.len())
        .map(|i| {
            if i < warmup {
                Signal::None
            } else {
                detector.evaluate(view, i)
            }
        })
        .collect()
}

/// Count of non-`None` tags.
pub fn count_entries(signals: &[Signal]) -> usize {
    signals.iter().filter(|s| s.is_entry()).count()
}
