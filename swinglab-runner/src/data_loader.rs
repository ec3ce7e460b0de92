//! Bar loading for the runner.
//!
//! Two sources:
//! 1. A CSV file with a `timestamp,open,high,low,close[,volume]` header
//! 2. A seeded synthetic random walk (developer-only; results are tagged)
//!
//! Rows are checked as they are read so a bad file fails with its row number
//! instead of an engine index. Every load carries a BLAKE3 dataset hash for
//! fingerprinting.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use swinglab_core::domain::{Bar, BarError};

use crate::config::DataConfig;

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in {source_name}: {source}")]
    Csv {
        source_name: String,
        #[source]
        source: csv::Error,
    },

    #[error("{source_name} row {row}: unrecognized timestamp '{value}'")]
    Timestamp {
        source_name: String,
        row: usize,
        value: String,
    },

    #[error("{source_name} row {row}: {source}")]
    InvalidBar {
        source_name: String,
        row: usize,
        #[source]
        source: BarError,
    },

    #[error("no bars in {0}")]
    Empty(String),

    #[error("invalid synthetic data spec: {0}")]
    Synthetic(String),
}

/// Parameters for a synthetic random walk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticSpec {
    pub bars: usize,
    #[serde(default)]
    pub seed: u64,
    #[serde(default = "default_start_price")]
    pub start_price: f64,
    /// Maximum absolute log return per bar.
    #[serde(default = "default_volatility")]
    pub volatility: f64,
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: i64,
}

fn default_start_price() -> f64 {
    100.0
}

fn default_volatility() -> f64 {
    0.01
}

fn default_interval_minutes() -> i64 {
    60
}

impl SyntheticSpec {
    pub fn new(bars: usize, seed: u64) -> Self {
        Self {
            bars,
            seed,
            start_price: default_start_price(),
            volatility: default_volatility(),
            interval_minutes: default_interval_minutes(),
        }
    }

    pub fn validate(&self) -> Result<(), LoadError> {
        if self.bars == 0 {
            return Err(LoadError::Synthetic("bars must be > 0".into()));
        }
        if !(self.start_price.is_finite() && self.start_price > 0.0) {
            return Err(LoadError::Synthetic(format!(
                "start_price must be finite and > 0 (got {})",
                self.start_price
            )));
        }
        if !(self.volatility.is_finite() && self.volatility >= 0.0 && self.volatility < 1.0) {
            return Err(LoadError::Synthetic(format!(
                "volatility must be in [0, 1) (got {})",
                self.volatility
            )));
        }
        if self.interval_minutes <= 0 {
            return Err(LoadError::Synthetic(format!(
                "interval_minutes must be > 0 (got {})",
                self.interval_minutes
            )));
        }
        Ok(())
    }
}

/// Where a set of bars came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataSource {
    Csv { path: PathBuf },
    Synthetic { seed: u64 },
}

/// Bars plus provenance.
#[derive(Debug, Clone)]
pub struct LoadedData {
    pub symbol: String,
    pub bars: Vec<Bar>,
    pub source: DataSource,
    /// BLAKE3 over every timestamp and OHLCV value.
    pub dataset_hash: String,
}

impl LoadedData {
    pub fn from_bars(symbol: impl Into<String>, bars: Vec<Bar>, source: DataSource) -> Self {
        let dataset_hash = compute_dataset_hash(&bars);
        Self {
            symbol: symbol.into(),
            bars,
            source,
            dataset_hash,
        }
    }

    pub fn is_synthetic(&self) -> bool {
        matches!(self.source, DataSource::Synthetic { .. })
    }
}

/// Load the bars a [`DataConfig`] points at.
pub fn load_data(config: &DataConfig) -> Result<LoadedData, LoadError> {
    let symbol = config.symbol();
    match (&config.path, &config.synthetic) {
        (Some(path), None) => {
            let bars = load_csv(path)?;
            Ok(LoadedData::from_bars(
                symbol,
                bars,
                DataSource::Csv { path: path.clone() },
            ))
        }
        (None, Some(spec)) => {
            let bars = generate_synthetic(spec)?;
            Ok(LoadedData::from_bars(
                symbol,
                bars,
                DataSource::Synthetic { seed: spec.seed },
            ))
        }
        _ => Err(LoadError::Synthetic(
            "data needs exactly one of `path` or `synthetic`".into(),
        )),
    }
}

// ─── CSV ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(alias = "date", alias = "datetime", alias = "time")]
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: Option<f64>,
}

/// Load bars from a CSV file.
pub fn load_csv(path: &Path) -> Result<Vec<Bar>, LoadError> {
    let file = File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let bars = read_bars(file, &path.display().to_string())?;
    debug!(path = %path.display(), bars = bars.len(), "loaded CSV bars");
    Ok(bars)
}

/// Parse bars from any CSV reader. `source_name` only labels errors.
///
/// Missing volume reads as 0. Rows must be valid bars in strictly increasing
/// timestamp order.
pub fn read_bars<R: Read>(reader: R, source_name: &str) -> Result<Vec<Bar>, LoadError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let mut bars: Vec<Bar> = Vec::new();
    for (i, record) in rdr.deserialize::<CsvRow>().enumerate() {
        // Row 1 is the header.
        let row = i + 2;
        let record = record.map_err(|source| LoadError::Csv {
            source_name: source_name.to_string(),
            source,
        })?;
        let timestamp =
            parse_timestamp(&record.timestamp).ok_or_else(|| LoadError::Timestamp {
                source_name: source_name.to_string(),
                row,
                value: record.timestamp.clone(),
            })?;
        let bar = Bar::new(
            timestamp,
            record.open,
            record.high,
            record.low,
            record.close,
            record.volume.unwrap_or(0.0),
        );

        let invalid = |source| LoadError::InvalidBar {
            source_name: source_name.to_string(),
            row,
            source,
        };
        bar.validate().map_err(invalid)?;
        if let Some(previous) = bars.last() {
            bar.validate_after(previous).map_err(invalid)?;
        }
        bars.push(bar);
    }

    if bars.is_empty() {
        return Err(LoadError::Empty(source_name.to_string()));
    }
    Ok(bars)
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Accepts RFC 3339 (converted to UTC), `YYYY-MM-DD HH:MM[:SS[.fff]]` with a
/// space or `T`, and bare `YYYY-MM-DD` (midnight).
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }
    for format in DATETIME_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(value, format) {
            return Some(ts);
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

// ─── Synthetic ──────────────────────────────────────────────────────

/// Generate a seeded random walk.
///
/// Same spec, same bars. Prices stay positive, so the result is usable in
/// log space.
pub fn generate_synthetic(spec: &SyntheticSpec) -> Result<Vec<Bar>, LoadError> {
    spec.validate()?;
    warn!(
        seed = spec.seed,
        bars = spec.bars,
        "generating synthetic data; results will be tagged as synthetic"
    );

    let mut rng = StdRng::seed_from_u64(spec.seed);
    let start = NaiveDate::from_ymd_opt(2024, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| LoadError::Synthetic("bad start date".into()))?;
    let step = chrono::Duration::try_minutes(spec.interval_minutes).ok_or_else(|| {
        LoadError::Synthetic(format!(
            "interval_minutes {} is out of range",
            spec.interval_minutes
        ))
    })?;
    let wick = spec.volatility / 2.0;

    let mut bars = Vec::with_capacity(spec.bars);
    let mut price = spec.start_price;
    let mut timestamp = start;
    for i in 0..spec.bars {
        if i > 0 {
            timestamp = timestamp.checked_add_signed(step).ok_or_else(|| {
                LoadError::Synthetic(format!("timestamp of bar {i} is out of range"))
            })?;
        }
        let log_return: f64 = if spec.volatility > 0.0 {
            rng.gen_range(-spec.volatility..spec.volatility)
        } else {
            0.0
        };
        let open = price;
        let close = price * log_return.exp();
        let high = open.max(close) * (1.0 + rng.gen_range(0.0..=wick));
        let low = open.min(close) * (1.0 - rng.gen_range(0.0..=wick));
        let volume = rng.gen_range(100..10_000u32) as f64;

        bars.push(Bar::new(timestamp, open, high, low, close, volume));
        price = close;
    }
    Ok(bars)
}

// ─── Fingerprint ────────────────────────────────────────────────────

/// Deterministic BLAKE3 hash over all bar data.
pub fn compute_dataset_hash(bars: &[Bar]) -> String {
    let mut hasher = blake3::Hasher::new();
    for bar in bars {
        hasher.update(&bar.timestamp.and_utc().timestamp_micros().to_le_bytes());
        hasher.update(&bar.open.to_le_bytes());
        hasher.update(&bar.high.to_le_bytes());
        hasher.update(&bar.low.to_le_bytes());
        hasher.update(&bar.close.to_le_bytes());
        hasher.update(&bar.volume.to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}
