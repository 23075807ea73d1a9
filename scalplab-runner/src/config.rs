//! File-based run configuration (TOML or JSON).
//!
//! ```toml
//! data = "nq_minute.csv"
//! ema_span = 9
//!
//! [strategy]
//! tp_ticks = 20
//! sl_ticks = 20
//! risk_percent = 1.0   # percent, converted to a fraction
//!
//! [optimize]
//! tp_ticks = [10, 20, 30]
//! sl_ticks = [10, 20]
//! trailing_ticks = [0, 5]
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use scalplab_core::config::{ConfigError as StrategyConfigError, SizingMode, StrategyConfig};
use scalplab_core::indicators::ema::DEFAULT_EMA_SPAN;

use crate::optimizer::ParamGrid;

/// Errors from loading a run file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported config extension '{0}' (expected .toml or .json)")]
    UnsupportedFormat(String),

    #[error("ema_span must be >= 1")]
    ZeroEmaSpan,

    #[error(transparent)]
    Strategy(#[from] StrategyConfigError),
}

/// Top-level run file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunFile {
    /// Path to the bar CSV. Relative paths are resolved against the file's directory.
    #[serde(default, alias = "filepath")]
    pub data: Option<PathBuf>,
    #[serde(default)]
    pub ema_span: Option<usize>,
    #[serde(default)]
    pub strategy: StrategySection,
    #[serde(default)]
    pub optimize: Option<OptimizeSection>,
}

/// Strategy overrides. Absent fields keep the `StrategyConfig` defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StrategySection {
    pub starting_balance: Option<f64>,
    /// Percent of balance risked per trade (1.0 = 1%).
    pub risk_percent: Option<f64>,
    pub tick_size: Option<f64>,
    pub tick_value: Option<f64>,
    pub commission_per_trade: Option<f64>,
    pub slippage_ticks: Option<f64>,
    pub tp_ticks: Option<u32>,
    pub sl_ticks: Option<u32>,
    pub trailing_stop: Option<bool>,
    pub trailing_stop_ticks: Option<u32>,
    pub contract_margin: Option<f64>,
    pub sizing: Option<SizingMode>,
}

/// Optimizer ranges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptimizeSection {
    pub tp_ticks: Vec<u32>,
    pub sl_ticks: Vec<u32>,
    /// 0 means trailing disabled for that grid point.
    #[serde(default = "default_trailing")]
    pub trailing_ticks: Vec<u32>,
}

fn default_trailing() -> Vec<u32> {
    vec![0]
}

impl StrategySection {
    /// Overlay these values on the defaults and validate the result.
    pub fn to_config(&self) -> Result<StrategyConfig, ConfigError> {
        let d = StrategyConfig::default();
        let config = StrategyConfig {
            starting_balance: self.starting_balance.unwrap_or(d.starting_balance),
            risk_percentage: self
                .risk_percent
                .map_or(d.risk_percentage, |pct| pct / 100.0),
            tick_size: self.tick_size.unwrap_or(d.tick_size),
            tick_value: self.tick_value.unwrap_or(d.tick_value),
            commission_per_trade: self.commission_per_trade.unwrap_or(d.commission_per_trade),
            slippage_ticks: self.slippage_ticks.unwrap_or(d.slippage_ticks),
            tp_ticks: self.tp_ticks.unwrap_or(d.tp_ticks),
            sl_ticks: self.sl_ticks.unwrap_or(d.sl_ticks),
            trailing_stop: self.trailing_stop.unwrap_or(d.trailing_stop),
            trailing_stop_ticks: self.trailing_stop_ticks.unwrap_or(d.trailing_stop_ticks),
            contract_margin: self.contract_margin.unwrap_or(d.contract_margin),
            sizing: self.sizing.unwrap_or(d.sizing),
        };
        config.validate()?;
        Ok(config)
    }
}

impl OptimizeSection {
    pub fn to_grid(&self) -> ParamGrid {
        ParamGrid {
            tp_ticks: self.tp_ticks.clone(),
            sl_ticks: self.sl_ticks.clone(),
            trailing_ticks: self.trailing_ticks.clone(),
        }
    }
}

impl RunFile {
    /// Load from `path`, choosing the parser by extension.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();

        let mut file = match ext.as_str() {
            "toml" => Self::from_toml(&text)?,
            "json" => Self::from_json(&text)?,
            other => return Err(ConfigError::UnsupportedFormat(other.to_string())),
        };

        if let (Some(data), Some(parent)) = (file.data.as_ref(), path.parent()) {
            if data.is_relative() {
                file.data = Some(parent.join(data));
            }
        }
        Ok(file)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn ema_span(&self) -> Result<usize, ConfigError> {
        match self.ema_span.unwrap_or(DEFAULT_EMA_SPAN) {
            0 => Err(ConfigError::ZeroEmaSpan),
            span => Ok(span),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_defaults() {
        let file = RunFile::from_toml("").unwrap();
        assert_eq!(file.ema_span().unwrap(), 9);
        assert_eq!(file.strategy.to_config().unwrap(), StrategyConfig::default());
        assert!(file.optimize.is_none());
    }

    #[test]
    fn risk_percent_is_converted_to_fraction() {
        let file = RunFile::from_toml("[strategy]\nrisk_percent = 2.5\n").unwrap();
        let config = file.strategy.to_config().unwrap();
        assert!((config.risk_percentage - 0.025).abs() < 1e-12);
    }

    #[test]
    fn full_toml_with_optimize_section() {
        let text = r#"
data = "bars.csv"
ema_span = 12

[strategy]
tp_ticks = 30
sl_ticks = 15
trailing_stop = true
trailing_stop_ticks = 6
sizing = "margin_and_risk"

[optimize]
tp_ticks = [10, 20]
sl_ticks = [10]
"#;
        let file = RunFile::from_toml(text).unwrap();
        assert_eq!(file.data.as_deref(), Some(Path::new("bars.csv")));
        assert_eq!(file.ema_span().unwrap(), 12);

        let config = file.strategy.to_config().unwrap();
        assert_eq!(config.tp_ticks, 30);
        assert!(config.trailing_stop);
        assert_eq!(config.sizing, SizingMode::MarginAndRisk);

        let grid = file.optimize.unwrap().to_grid();
        assert_eq!(grid.size(), 2);
        assert_eq!(grid.trailing_ticks, vec![0]);
    }

    #[test]
    fn json_accepts_filepath_alias() {
        let file =
            RunFile::from_json(r#"{"filepath": "x.csv", "strategy": {"tp_ticks": 8}}"#).unwrap();
        assert_eq!(file.data.as_deref(), Some(Path::new("x.csv")));
        assert_eq!(file.strategy.to_config().unwrap().tp_ticks, 8);
    }

    #[test]
    fn unknown_fields_rejected() {
        assert!(matches!(
            RunFile::from_toml("[strategy]\ntake_profit = 3\n"),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn invalid_strategy_values_rejected() {
        let file = RunFile::from_toml("[strategy]\ntick_size = 0.0\n").unwrap();
        assert!(matches!(
            file.strategy.to_config(),
            Err(ConfigError::Strategy(_))
        ));
    }

    #[test]
    fn zero_ema_span_rejected() {
        let file = RunFile::from_toml("ema_span = 0\n").unwrap();
        assert!(matches!(file.ema_span(), Err(ConfigError::ZeroEmaSpan)));
    }

    #[test]
    fn load_resolves_relative_data_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.toml");
        std::fs::write(&path, "data = \"bars.csv\"\n").unwrap();
        let file = RunFile::load(&path).unwrap();
        assert_eq!(file.data, Some(dir.path().join("bars.csv")));
    }

    #[test]
    fn load_rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.yaml");
        std::fs::write(&path, "data: x").unwrap();
        assert!(matches!(
            RunFile::load(&path),
            Err(ConfigError::UnsupportedFormat(ext)) if ext == "yaml"
        ));
    }
}
