//! Engine configuration.

use serde::{Deserialize, Serialize};

use super::exit::TieBreak;
use crate::error::CoreError;

/// Maximum number of bars a trade may stay open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoldPeriod {
    /// Exit on the first bar at or after `entry_index + n`.
    Bars(usize),
    /// Only take-profit or stop-loss can close the trade.
    Unbounded,
}

impl HoldPeriod {
    pub fn deadline(self, entry_index: usize) -> Option<usize> {
        match self {
            Self::Bars(n) => Some(entry_index.saturating_add(n)),
            Self::Unbounded => None,
        }
    }
}

/// Price space for a whole run. Never mixed within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSpace {
    #[default]
    Raw,
    /// Natural log of OHLC; stop distances become percentage-symmetric.
    Log,
}

/// Arm entries first and commit them only after price follows through.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EntryConfirmation {
    /// Favorable close-to-close move required from the arming bar.
    pub distance: f64,
    /// Bars after arming within which the move must happen.
    pub within_bars: usize,
}

/// Configuration for a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Detector threshold, absolute, in the run's price space.
    pub sigma: f64,
    /// First bar index at which entries are evaluated.
    pub lookback: usize,
    pub hold_period: HoldPeriod,
    pub atr_lookback: usize,
    pub price_space: PriceSpace,
    pub tie_break: TieBreak,
    pub confirmation: Option<EntryConfirmation>,
    /// Stop after this many bars and report the run as incomplete.
    pub max_bars: Option<usize>,
}

impl EngineConfig {
    pub fn new(sigma: f64) -> Self {
        Self {
            sigma,
            lookback: 0,
            hold_period: HoldPeriod::Unbounded,
            atr_lookback: 14,
            price_space: PriceSpace::Raw,
            tie_break: TieBreak::default(),
            confirmation: None,
            max_bars: None,
        }
    }

    pub fn with_lookback(mut self, lookback: usize) -> Self {
        self.lookback = lookback;
        self
    }

    pub fn with_hold_period(mut self, hold_period: HoldPeriod) -> Self {
        self.hold_period = hold_period;
        self
    }

    pub fn with_atr_lookback(mut self, atr_lookback: usize) -> Self {
        self.atr_lookback = atr_lookback;
        self
    }

    pub fn with_price_space(mut self, price_space: PriceSpace) -> Self {
        self.price_space = price_space;
        self
    }

    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    pub fn with_confirmation(mut self, distance: f64, within_bars: usize) -> Self {
        self.confirmation = Some(EntryConfirmation {
            distance,
            within_bars,
        });
        self
    }

    pub fn with_max_bars(mut self, max_bars: usize) -> Self {
        self.max_bars = Some(max_bars);
        self
    }

    /// Fail fast, before any bar is processed.
    pub fn validate(&self) -> Result<(), CoreError> {
        if !self.sigma.is_finite() || self.sigma <= 0.0 {
            return Err(CoreError::config(format!(
                "sigma must be finite and > 0 (got {})",
                self.sigma
            )));
        }
        if self.atr_lookback == 0 {
            return Err(CoreError::config("atr_lookback must be > 0"));
        }
        if let Some(c) = &self.confirmation {
            if !c.distance.is_finite() || c.distance <= 0.0 {
                return Err(CoreError::config(format!(
                    "confirmation distance must be finite and > 0 (got {})",
                    c.distance
                )));
            }
            if c.within_bars == 0 {
                return Err(CoreError::config("confirmation within_bars must be > 0"));
            }
        }
        if self.max_bars == Some(0) {
            return Err(CoreError::config("max_bars must be > 0 when set"));
        }
        Ok(())
    }
}
