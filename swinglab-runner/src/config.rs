//! Serializable run configuration (TOML).
//!
//! A [`RunConfig`] captures everything needed to reproduce a backtest: where
//! the bars come from, the detector threshold, engine settings and the
//! strategy. Its BLAKE3 fingerprint is the run id.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use swinglab_core::engine::{EngineConfig, EntryConfirmation, HoldPeriod, PriceSpace, TieBreak};
use swinglab_core::strategy::{create_strategy, FactoryError, StrategyConfig};
use swinglab_core::CoreError;

use crate::data_loader::SyntheticSpec;

/// Unique identifier for a backtest run (content-addressable hash).
pub type RunId = String;

/// Errors from loading or validating a run configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("invalid strategy: {0}")]
    Strategy(#[from] FactoryError),

    #[error("invalid engine settings: {0}")]
    Engine(#[from] CoreError),

    #[error("failed to fingerprint config: {0}")]
    Fingerprint(#[from] serde_json::Error),
}

impl ConfigError {
    fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }
}

// ─── Sections ───────────────────────────────────────────────────────

/// Serializable configuration for a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    pub data: DataConfig,
    pub detector: DetectorConfig,
    #[serde(default)]
    pub engine: EngineSection,
    pub strategy: StrategyConfig,
}

/// Bar source: a CSV file or a synthetic random walk, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synthetic: Option<SyntheticSpec>,
}

impl DataConfig {
    pub fn csv(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            symbol: None,
            synthetic: None,
        }
    }

    pub fn synthetic(spec: SyntheticSpec) -> Self {
        Self {
            path: None,
            symbol: None,
            synthetic: Some(spec),
        }
    }

    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    /// Explicit symbol, else the CSV file stem, else `"SYNTH"`.
    pub fn symbol(&self) -> String {
        if let Some(symbol) = &self.symbol {
            return symbol.clone();
        }
        self.path
            .as_deref()
            .and_then(Path::file_stem)
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "SYNTH".to_string())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match (&self.path, &self.synthetic) {
            (Some(_), Some(_)) => Err(ConfigError::invalid(
                "data: set either `path` or `synthetic`, not both",
            )),
            (None, None) => Err(ConfigError::invalid(
                "data: one of `path` or `synthetic` is required",
            )),
            (None, Some(spec)) => spec
                .validate()
                .map_err(|e| ConfigError::invalid(e.to_string())),
            (Some(_), None) => Ok(()),
        }
    }
}

/// How `detector.sigma` is interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SigmaMode {
    /// Price units of the run's price space.
    #[default]
    Absolute,
    /// Fraction of the first close.
    Relative,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DetectorConfig {
    pub sigma: f64,
    #[serde(default)]
    pub sigma_mode: SigmaMode,
}

/// Engine settings as written in the `[engine]` table. Every field is
/// optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineSection {
    pub lookback: usize,
    /// A bar count, or `"unbounded"`.
    #[serde(with = "hold_period_repr")]
    pub hold_period: HoldPeriod,
    pub atr_lookback: usize,
    pub price_space: PriceSpace,
    pub tie_break: TieBreak,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmation: Option<EntryConfirmation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_bars: Option<usize>,
}

impl Default for EngineSection {
    fn default() -> Self {
        let defaults = EngineConfig::new(1.0);
        Self {
            lookback: defaults.lookback,
            hold_period: defaults.hold_period,
            atr_lookback: defaults.atr_lookback,
            price_space: defaults.price_space,
            tie_break: defaults.tie_break,
            confirmation: defaults.confirmation,
            max_bars: defaults.max_bars,
        }
    }
}

/// `hold_period = 48` or `hold_period = "unbounded"`.
mod hold_period_repr {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    use swinglab_core::engine::HoldPeriod;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Bars(usize),
        Keyword(String),
    }

    pub fn serialize<S: Serializer>(value: &HoldPeriod, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            HoldPeriod::Bars(n) => serializer.serialize_u64(*n as u64),
            HoldPeriod::Unbounded => serializer.serialize_str("unbounded"),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<HoldPeriod, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Bars(n) => Ok(HoldPeriod::Bars(n)),
            Repr::Keyword(word) if word == "unbounded" => Ok(HoldPeriod::Unbounded),
            Repr::Keyword(word) => Err(D::Error::custom(format!(
                "hold_period must be a bar count or \"unbounded\" (got \"{word}\")"
            ))),
        }
    }
}

// ─── Loading ────────────────────────────────────────────────────────

impl RunConfig {
    pub fn new(data: DataConfig, sigma: f64, strategy: StrategyConfig) -> Self {
        Self {
            data,
            detector: DetectorConfig {
                sigma,
                sigma_mode: SigmaMode::Absolute,
            },
            engine: EngineSection::default(),
            strategy,
        }
    }

    /// Parse and validate.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a TOML file. A relative `data.path` is resolved against the
    /// config file's directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&text)?;
        if let (Some(data_path), Some(dir)) = (&config.data.path, path.parent()) {
            if data_path.is_relative() {
                config.data.path = Some(dir.join(data_path));
            }
        }
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Everything that can be checked without loading bars.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.data.validate()?;

        let sigma = self.detector.sigma;
        if !sigma.is_finite() || sigma <= 0.0 {
            return Err(ConfigError::invalid(format!(
                "detector.sigma must be finite and > 0 (got {sigma})"
            )));
        }
        if self.detector.sigma_mode == SigmaMode::Relative && sigma >= 1.0 {
            return Err(ConfigError::invalid(format!(
                "relative detector.sigma must be < 1 (got {sigma})"
            )));
        }

        self.engine_config(sigma).validate()?;
        create_strategy(&self.strategy)?;
        Ok(())
    }

    /// Absolute sigma in the run's price space.
    ///
    /// Relative mode scales by the first close in raw space and becomes
    /// `ln(1 + sigma)` in log space.
    pub fn resolve_sigma(&self, first_close: f64) -> Result<f64, ConfigError> {
        let sigma = self.detector.sigma;
        let resolved = match (self.detector.sigma_mode, self.engine.price_space) {
            (SigmaMode::Absolute, _) => sigma,
            (SigmaMode::Relative, PriceSpace::Raw) => {
                if !(first_close.is_finite() && first_close > 0.0) {
                    return Err(ConfigError::invalid(format!(
                        "relative sigma needs a positive first close (got {first_close})"
                    )));
                }
                sigma * first_close
            }
            (SigmaMode::Relative, PriceSpace::Log) => sigma.ln_1p(),
        };
        if !resolved.is_finite() || resolved <= 0.0 {
            return Err(ConfigError::invalid(format!(
                "resolved sigma must be finite and > 0 (got {resolved})"
            )));
        }
        Ok(resolved)
    }

    /// Engine configuration with an already-resolved sigma.
    pub fn engine_config(&self, sigma: f64) -> EngineConfig {
        let engine = &self.engine;
        EngineConfig {
            sigma,
            lookback: engine.lookback,
            hold_period: engine.hold_period,
            atr_lookback: engine.atr_lookback,
            price_space: engine.price_space,
            tie_break: engine.tie_break,
            confirmation: engine.confirmation,
            max_bars: engine.max_bars,
        }
    }

    /// BLAKE3 over the canonical JSON form of this config.
    ///
    /// Two runs with identical configs share a run id.
    pub fn run_id(&self) -> Result<RunId, ConfigError> {
        let json = serde_json::to_vec(self)?;
        Ok(blake3::hash(&json).to_hex().to_string())
    }

    /// Set one numeric field by dotted key, as used by sweeps and the CLI.
    ///
    /// Keys: `detector.sigma`, `engine.lookback`, `engine.hold_period`,
    /// `engine.atr_lookback`, `engine.max_bars`,
    /// `engine.confirmation.distance`, `engine.confirmation.within_bars`, and
    /// `strategy.<param>`. The result is not re-validated.
    pub fn with_override(mut self, key: &str, value: f64) -> Result<Self, ConfigError> {
        match key {
            "detector.sigma" => self.detector.sigma = value,
            "engine.lookback" => self.engine.lookback = whole(key, value)?,
            "engine.hold_period" => self.engine.hold_period = HoldPeriod::Bars(whole(key, value)?),
            "engine.atr_lookback" => self.engine.atr_lookback = whole(key, value)?,
            "engine.max_bars" => self.engine.max_bars = Some(whole(key, value)?),
            "engine.confirmation.distance" => {
                self.engine
                    .confirmation
                    .get_or_insert(EntryConfirmation {
                        distance: value,
                        within_bars: 1,
                    })
                    .distance = value;
            }
            "engine.confirmation.within_bars" => {
                let within_bars = whole(key, value)?;
                self.engine
                    .confirmation
                    .get_or_insert(EntryConfirmation {
                        distance: f64::NAN,
                        within_bars,
                    })
                    .within_bars = within_bars;
            }
            _ => match key.strip_prefix("strategy.") {
                Some(param) if !param.is_empty() && param != "type" => {
                    self.strategy.params.insert(param.to_string(), value);
                }
                _ => return Err(ConfigError::invalid(format!("unknown override key '{key}'"))),
            },
        }
        Ok(self)
    }
}

fn whole(key: &str, value: f64) -> Result<usize, ConfigError> {
    if !value.is_finite() || value < 0.0 || value.fract() != 0.0 {
        return Err(ConfigError::invalid(format!(
            "{key} must be a non-negative whole number (got {value})"
        )));
    }
    Ok(value as usize)
}
