//! Strategy configuration — the immutable value threaded through every run.
//!
//! One `StrategyConfig` is built per run (or per optimizer grid point) and passed
//! by reference to the simulator. Nothing in the engine holds or mutates a shared
//! default.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unique identifier for a configuration (content-addressable hash).
pub type RunId = String;

/// Errors from configuration validation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{field} must be a finite positive number, got {value}")]
    NotPositive { field: &'static str, value: f64 },
    #[error("{field} must be a finite non-negative number, got {value}")]
    Negative { field: &'static str, value: f64 },
}

/// How many contracts an entry trades.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizingMode {
    /// Always one contract, regardless of balance.
    #[default]
    Fixed,
    /// The smaller of the margin-based and risk-based contract limits.
    /// Entries are skipped while that limit is below one contract.
    MarginAndRisk,
}

/// Trading rule and cost-model parameters for one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    /// Account balance at the start of the run (currency units).
    pub starting_balance: f64,
    /// Fraction of balance risked per trade. Only read by `SizingMode::MarginAndRisk`.
    pub risk_percentage: f64,
    /// Minimum price increment.
    pub tick_size: f64,
    /// Currency value of one tick per contract.
    pub tick_value: f64,
    pub commission_per_trade: f64,
    pub slippage_ticks: f64,
    pub tp_ticks: u32,
    pub sl_ticks: u32,
    pub trailing_stop: bool,
    pub trailing_stop_ticks: u32,
    /// Initial margin per contract. Only read by `SizingMode::MarginAndRisk`.
    pub contract_margin: f64,
    pub sizing: SizingMode,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            starting_balance: 100_000.0,
            risk_percentage: 0.01,
            tick_size: 0.25,
            tick_value: 5.0,
            commission_per_trade: 5.0,
            slippage_ticks: 1.0,
            tp_ticks: 20,
            sl_ticks: 20,
            trailing_stop: false,
            trailing_stop_ticks: 5,
            contract_margin: 13_000.0,
            sizing: SizingMode::Fixed,
        }
    }
}

impl StrategyConfig {
    /// Copy of this config with new exit parameters.
    ///
    /// `trailing_ticks == 0` disables the trailing stop (and zeroes its distance);
    /// any other value enables it at that distance.
    pub fn with_exit_params(&self, tp_ticks: u32, sl_ticks: u32, trailing_ticks: u32) -> Self {
        Self {
            tp_ticks,
            sl_ticks,
            trailing_stop: trailing_ticks > 0,
            trailing_stop_ticks: trailing_ticks,
            ..self.clone()
        }
    }

    /// Price distance from entry to the take-profit level.
    pub fn tp_distance(&self) -> f64 {
        self.tp_ticks as f64 * self.tick_size
    }

    /// Price distance from entry to the static stop-loss level.
    pub fn sl_distance(&self) -> f64 {
        self.sl_ticks as f64 * self.tick_size
    }

    /// Price distance from the favorable extreme to the trailing stop.
    pub fn trailing_distance(&self) -> f64 {
        self.trailing_stop_ticks as f64 * self.tick_size
    }

    /// Currency value of a one-point price move for one contract.
    pub fn point_value(&self) -> f64 {
        self.tick_value / self.tick_size
    }

    /// Fixed cost charged on every round trip: commission plus slippage on both legs.
    pub fn round_trip_cost(&self) -> f64 {
        self.commission_per_trade + self.slippage_ticks * self.tick_value * 2.0
    }

    /// Reject values that make the PnL arithmetic meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("starting_balance", self.starting_balance)?;
        positive("tick_size", self.tick_size)?;
        positive("tick_value", self.tick_value)?;
        non_negative("commission_per_trade", self.commission_per_trade)?;
        non_negative("slippage_ticks", self.slippage_ticks)?;
        non_negative("risk_percentage", self.risk_percentage)?;
        non_negative("contract_margin", self.contract_margin)?;
        Ok(())
    }

    /// Deterministic hash ID for this configuration.
    ///
    /// Two configs with identical fields share a RunId.
    pub fn run_id(&self) -> RunId {
        // Serializing a plain struct of numbers and enums cannot fail; fall back to
        // the debug form anyway so this stays infallible.
        let repr = serde_json::to_string(self).unwrap_or_else(|_| format!("{self:?}"));
        blake3::hash(repr.as_bytes()).to_hex().to_string()
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NotPositive { field, value })
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Negative { field, value })
    }
}
