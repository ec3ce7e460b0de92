//! Factory: converts a `StrategyConfig` into a runtime strategy object.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{ExtremeReversal, Strategy, TrendPullback, ZoneRejection};

// ─── Error type ──────────────────────────────────────────────────────

/// Errors that can occur during strategy construction.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FactoryError {
    #[error("unknown strategy type: {0}")]
    UnknownStrategy(String),
    #[error("{strategy}: unknown parameter '{name}'")]
    UnknownParameter { strategy: String, name: String },
    #[error("{strategy}: parameter '{name}' = {value} {reason}")]
    InvalidParameter {
        strategy: String,
        name: String,
        value: f64,
        reason: &'static str,
    },
}

// ─── Config ──────────────────────────────────────────────────────────

/// Strategy type plus numeric parameters.
///
/// Uses `BTreeMap` so serialized parameters come out in a fixed order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    #[serde(rename = "type")]
    pub strategy_type: String,
    #[serde(flatten)]
    pub params: BTreeMap<String, f64>,
}

impl StrategyConfig {
    pub fn new(strategy_type: impl Into<String>) -> Self {
        Self {
            strategy_type: strategy_type.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: f64) -> Self {
        self.params.insert(name.into(), value);
        self
    }
}

// ─── Parameter access ────────────────────────────────────────────────

/// Reads parameters with defaults and rejects anything the strategy does not
/// know about.
struct Params<'a> {
    config: &'a StrategyConfig,
    known: &'static [&'static str],
}

impl<'a> Params<'a> {
    fn new(config: &'a StrategyConfig, known: &'static [&'static str]) -> Result<Self, FactoryError> {
        if let Some(name) = config.params.keys().find(|k| !known.contains(&k.as_str())) {
            return Err(FactoryError::UnknownParameter {
                strategy: config.strategy_type.clone(),
                name: name.clone(),
            });
        }
        Ok(Self { config, known })
    }

    fn invalid(&self, name: &str, value: f64, reason: &'static str) -> FactoryError {
        FactoryError::InvalidParameter {
            strategy: self.config.strategy_type.clone(),
            name: name.to_string(),
            value,
            reason,
        }
    }

    fn raw(&self, name: &str, default: f64) -> f64 {
        debug_assert!(self.known.contains(&name));
        self.config.params.get(name).copied().unwrap_or(default)
    }

    /// Finite and strictly positive.
    fn positive(&self, name: &str, default: f64) -> Result<f64, FactoryError> {
        let value = self.raw(name, default);
        if !value.is_finite() || value <= 0.0 {
            return Err(self.invalid(name, value, "must be finite and > 0"));
        }
        Ok(value)
    }

    /// Finite and non-negative.
    fn non_negative(&self, name: &str, default: f64) -> Result<f64, FactoryError> {
        let value = self.raw(name, default);
        if !value.is_finite() || value < 0.0 {
            return Err(self.invalid(name, value, "must be finite and >= 0"));
        }
        Ok(value)
    }

    /// A whole number of at least `min`.
    fn count(&self, name: &str, default: usize, min: usize) -> Result<usize, FactoryError> {
        let value = self.raw(name, default as f64);
        if !value.is_finite() || value.fract() != 0.0 || value < min as f64 {
            return Err(self.invalid(name, value, "must be a whole number in range"));
        }
        Ok(value as usize)
    }
}

// ─── Strategy factory ────────────────────────────────────────────────

/// Names accepted by [`create_strategy`].
pub const STRATEGY_TYPES: &[&str] = &["extreme_reversal", "trend_pullback", "zone_rejection"];

/// Create a strategy from a `StrategyConfig`. Missing parameters take their
/// defaults.
pub fn create_strategy(config: &StrategyConfig) -> Result<Box<dyn Strategy>, FactoryError> {
    match config.strategy_type.as_str() {
        "extreme_reversal" => {
            let p = Params::new(config, &["max_tolerance", "atr_min", "tp_mult", "sl_mult"])?;
            Ok(Box::new(ExtremeReversal::new(
                p.count("max_tolerance", 3, 0)?,
                p.non_negative("atr_min", 0.001)?,
                p.positive("tp_mult", 3.0)?,
                p.positive("sl_mult", 3.0)?,
            )))
        }
        "trend_pullback" => {
            let p = Params::new(config, &["alpha", "trend_len"])?;
            let alpha = p.positive("alpha", 0.25)?;
            if alpha > 1.0 {
                return Err(p.invalid("alpha", alpha, "must be <= 1"));
            }
            Ok(Box::new(TrendPullback::new(alpha, p.count("trend_len", 3, 1)?)))
        }
        "zone_rejection" => {
            let p = Params::new(
                config,
                &["lookback", "zone_size", "min_touches", "tp_mult", "sl_mult"],
            )?;
            Ok(Box::new(ZoneRejection::new(
                p.count("lookback", 240, 1)?,
                p.positive("zone_size", 0.002)?,
                p.count("min_touches", 2, 1)?,
                p.positive("tp_mult", 3.0)?,
                p.positive("sl_mult", 3.0)?,
            )))
        }
        other => Err(FactoryError::UnknownStrategy(other.to_string())),
    }
}
