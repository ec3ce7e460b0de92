//! Bar: the fundamental market data unit.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// OHLCV sample at a single timestamp.
///
/// Bars are immutable once produced. A run requires strictly increasing
/// timestamps but makes no calendar assumption, so gaps are fine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Only strategies that gate on relative volume read this.
    #[serde(default)]
    pub volume: f64,
}

/// Why a bar was rejected at the boundary.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BarError {
    #[error("{field} is not finite")]
    NonFinite { field: &'static str },

    #[error("high {high} is below low {low}")]
    HighBelowLow { high: f64, low: f64 },

    #[error("volume {0} is negative")]
    NegativeVolume(f64),

    #[error("{field} {value} is not positive (required in log price space)")]
    NonPositivePrice { field: &'static str, value: f64 },

    #[error("timestamp {current} does not follow {previous}")]
    NonIncreasingTimestamp {
        previous: NaiveDateTime,
        current: NaiveDateTime,
    },
}

impl Bar {
    pub fn new(
        timestamp: NaiveDateTime,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Check the bar in isolation: finite prices, `high >= low`, sane volume.
    ///
    /// Open and close are not required to sit inside `[low, high]`; some
    /// feeds report mid closes outside the traded range.
    pub fn validate(&self) -> Result<(), BarError> {
        for (field, value) in [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
            ("volume", self.volume),
        ] {
            if !value.is_finite() {
                return Err(BarError::NonFinite { field });
            }
        }
        if self.high < self.low {
            return Err(BarError::HighBelowLow {
                high: self.high,
                low: self.low,
            });
        }
        if self.volume < 0.0 {
            return Err(BarError::NegativeVolume(self.volume));
        }
        Ok(())
    }

    /// Check that this bar may follow `previous` in a series.
    pub fn validate_after(&self, previous: &Bar) -> Result<(), BarError> {
        if self.timestamp <= previous.timestamp {
            return Err(BarError::NonIncreasingTimestamp {
                previous: previous.timestamp,
                current: self.timestamp,
            });
        }
        Ok(())
    }

    /// Check that every price has a finite logarithm.
    pub fn validate_positive(&self) -> Result<(), BarError> {
        for (field, value) in [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
        ] {
            if value <= 0.0 {
                return Err(BarError::NonPositivePrice { field, value });
            }
        }
        Ok(())
    }

    /// The same bar with OHLC mapped through the natural log.
    ///
    /// Volume is left untouched. Callers must validate first and reject
    /// non-positive prices; `ln` of those is not finite.
    pub fn to_log(&self) -> Bar {
        Bar {
            timestamp: self.timestamp,
            open: self.open.ln(),
            high: self.high.ln(),
            low: self.low.ln(),
            close: self.close.ln(),
            volume: self.volume,
        }
    }
}
