//! Fatal errors for a single detection or backtest run.
//!
//! Only two things abort a run: a configuration that can never produce a
//! meaningful result, and a bar that would corrupt the zigzag state or the
//! exit comparisons. Running out of history is never an error (query helpers
//! return `None`), and degenerate statistics return sentinels.

use thiserror::Error;

use crate::domain::BarError;

/// Errors raised by the detector and the backtest engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    /// Raised before any bar is processed.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The bar at `index` failed validation. The run stops at that bar.
    #[error("invalid bar at index {index}: {source}")]
    InvalidBar {
        index: usize,
        #[source]
        source: BarError,
    },

    /// An extreme appended out of order or breaking Top/Bottom alternation.
    #[error("extreme confirmed at {confirm_index} rejected: {reason}")]
    MalformedExtreme {
        confirm_index: usize,
        reason: &'static str,
    },
}

impl CoreError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    pub fn bar(index: usize, source: BarError) -> Self {
        Self::InvalidBar { index, source }
    }
}
