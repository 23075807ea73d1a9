//! Contract sizing limits.
//!
//! Two ceilings are derived from the current balance: how many contracts the
//! margin allows and how many the per-trade risk budget allows. Under the
//! default `SizingMode::Fixed` they are informational only and every entry
//! trades one contract.

use serde::{Deserialize, Serialize};

use crate::config::{SizingMode, StrategyConfig};

/// Contract ceilings for a given balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizingLimits {
    /// floor(balance / contract_margin)
    pub by_margin: u32,
    /// floor(balance * risk_percentage / (sl_ticks * tick_value))
    pub by_risk: u32,
}

impl SizingLimits {
    pub fn compute(balance: f64, config: &StrategyConfig) -> Self {
        let risk_budget = balance * config.risk_percentage;
        let risk_per_contract = config.sl_ticks as f64 * config.tick_value;
        Self {
            by_margin: floor_contracts(balance / config.contract_margin),
            by_risk: floor_contracts(risk_budget / risk_per_contract),
        }
    }

    pub fn max_contracts(&self) -> u32 {
        self.by_margin.min(self.by_risk)
    }
}

/// Contracts to trade on the next entry.
pub fn contracts_for(balance: f64, config: &StrategyConfig) -> u32 {
    match config.sizing {
        SizingMode::Fixed => 1,
        SizingMode::MarginAndRisk => SizingLimits::compute(balance, config).max_contracts(),
    }
}

// Float-to-int `as` casts saturate: NaN -> 0, +inf -> u32::MAX.
fn floor_contracts(raw: f64) -> u32 {
    raw.floor().max(0.0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_limits() {
        let config = StrategyConfig::default();
        let limits = SizingLimits::compute(100_000.0, &config);
        // 100_000 / 13_000 = 7.69
        assert_eq!(limits.by_margin, 7);
        // 1_000 / (20 * 5) = 10
        assert_eq!(limits.by_risk, 10);
        assert_eq!(limits.max_contracts(), 7);
    }

    #[test]
    fn fixed_mode_ignores_balance() {
        let config = StrategyConfig::default();
        assert_eq!(contracts_for(100_000.0, &config), 1);
        assert_eq!(contracts_for(10.0, &config), 1);
    }

    #[test]
    fn margin_and_risk_mode_uses_smaller_limit() {
        let config = StrategyConfig {
            sizing: SizingMode::MarginAndRisk,
            ..StrategyConfig::default()
        };
        assert_eq!(contracts_for(100_000.0, &config), 7);
        assert_eq!(contracts_for(12_000.0, &config), 0);
    }

    #[test]
    fn zero_margin_saturates() {
        let config = StrategyConfig {
            contract_margin: 0.0,
            ..StrategyConfig::default()
        };
        let limits = SizingLimits::compute(100_000.0, &config);
        assert_eq!(limits.by_margin, u32::MAX);
        assert_eq!(limits.max_contracts(), 10);
    }

    #[test]
    fn negative_balance_is_zero_contracts() {
        let config = StrategyConfig::default();
        let limits = SizingLimits::compute(-5_000.0, &config);
        assert_eq!(limits.by_margin, 0);
        assert_eq!(limits.by_risk, 0);
    }
}
