//! Bar loading for the runner.
//!
//! Bars come from one of two sources:
//! 1. A CSV file with a timestamp column and OHLC(V) columns
//! 2. A seeded synthetic random walk (developer/demo mode, tagged)
//!
//! Loaded bars are sorted ascending by timestamp (stable, so duplicate
//! timestamps keep file order) and fingerprinted with a BLAKE3 dataset hash.

use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Deserialize;
use thiserror::Error;

use scalplab_core::domain::Bar;

/// Minimum price increment of the synthetic series.
const SYNTHETIC_TICK: f64 = 0.25;

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("row {row}: unrecognized timestamp '{value}'")]
    Timestamp { row: usize, value: String },
}

/// Where bars come from.
#[derive(Debug, Clone, PartialEq)]
pub enum DataSource {
    Csv(PathBuf),
    Synthetic { bars: usize, seed: u64 },
}

/// Result of loading bars, including provenance.
#[derive(Debug, Clone)]
pub struct LoadedData {
    pub bars: Vec<Bar>,
    /// BLAKE3 over all bar data.
    pub dataset_hash: String,
    pub is_synthetic: bool,
}

/// Load bars from `source`.
pub fn load_bars(source: &DataSource) -> Result<LoadedData, LoadError> {
    let (bars, is_synthetic) = match source {
        DataSource::Csv(path) => (load_csv(path)?, false),
        DataSource::Synthetic { bars, seed } => {
            tracing::warn!(bars, seed, "using synthetic bars; results are not market data");
            (synthetic_minute_bars(*bars, *seed), true)
        }
    };
    let inconsistent = inconsistent_bars(&bars);
    if inconsistent > 0 {
        tracing::warn!(inconsistent, "bars with NaN prices or high/low outside open/close");
    }
    let dataset_hash = dataset_hash(&bars);
    tracing::info!(bars = bars.len(), is_synthetic, dataset = %dataset_hash, "bars loaded");
    Ok(LoadedData {
        dataset_hash,
        bars,
        is_synthetic,
    })
}

/// Count of bars failing the OHLC sanity check. Such bars are kept as loaded.
pub fn inconsistent_bars(bars: &[Bar]) -> usize {
    bars.iter().filter(|b| !b.is_sane()).count()
}

// ─── CSV ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(alias = "datetime", alias = "timestamp")]
    date_time: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: Option<f64>,
}

/// Load bars from a CSV file.
pub fn load_csv(path: &Path) -> Result<Vec<Bar>, LoadError> {
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    read_csv(file)
}

/// Parse bars from any CSV reader. Unknown columns are ignored.
pub fn read_csv<R: Read>(reader: R) -> Result<Vec<Bar>, LoadError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut bars = Vec::new();

    for (i, row) in rdr.deserialize::<CsvRow>().enumerate() {
        let row = row?;
        let timestamp = parse_timestamp(&row.date_time).ok_or_else(|| LoadError::Timestamp {
            row: i + 1,
            value: row.date_time.clone(),
        })?;
        bars.push(Bar {
            timestamp,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        });
    }

    bars.sort_by_key(|b| b.timestamp);
    Ok(bars)
}

/// Parse a timestamp, dropping any UTC offset and keeping the wall-clock time.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_local());
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%:z", "%Y-%m-%d %H:%M:%S%z"] {
        if let Ok(dt) = DateTime::parse_from_str(value, fmt) {
            return Some(dt.naive_local());
        }
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(dt);
        }
    }
    None
}

// ─── Fingerprint ────────────────────────────────────────────────────

/// BLAKE3 hash over timestamps and OHLCV values, in bar order.
pub fn dataset_hash(bars: &[Bar]) -> String {
    let mut hasher = blake3::Hasher::new();
    for bar in bars {
        hasher.update(bar.timestamp.to_string().as_bytes());
        hasher.update(&bar.open.to_le_bytes());
        hasher.update(&bar.high.to_le_bytes());
        hasher.update(&bar.low.to_le_bytes());
        hasher.update(&bar.close.to_le_bytes());
        hasher.update(&bar.volume.unwrap_or(f64::NAN).to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

// ─── Synthetic ──────────────────────────────────────────────────────

/// Generate `n` consecutive minute bars as a seeded random walk on a 0.25 grid.
///
/// Same `(n, seed)` always yields the same bars.
pub fn synthetic_minute_bars(n: usize, seed: u64) -> Vec<Bar> {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let mut rng = StdRng::seed_from_u64(seed);
    let start = NaiveDate::from_ymd_opt(2024, 1, 2)
        .and_then(|d| d.and_hms_opt(9, 30, 0))
        .unwrap_or_default();

    let mut price = 4_000.0_f64;
    (0..n)
        .map(|i| {
            let open = price;
            let close = open + rng.gen_range(-6i32..=6) as f64 * SYNTHETIC_TICK;
            let high = open.max(close) + rng.gen_range(0i32..4) as f64 * SYNTHETIC_TICK;
            let low = open.min(close) - rng.gen_range(0i32..4) as f64 * SYNTHETIC_TICK;
            price = close;
            Bar {
                timestamp: start + chrono::Duration::minutes(i as i64),
                open,
                high,
                low,
                close,
                volume: Some(rng.gen_range(50u32..5_000) as f64),
            }
        })
        .collect()
}
