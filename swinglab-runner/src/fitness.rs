//! Fitness function: configurable metric selector for ranking sweep runs.

use crate::metrics::PerformanceSummary;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which summary metric to rank by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitnessMetric {
    #[default]
    Sharpe,
    TotalReturn,
    Expectancy,
    WinRate,
    ProfitFactor,
    MaxDrawdown,
}

impl FitnessMetric {
    pub const ALL: [FitnessMetric; 6] = [
        Self::Sharpe,
        Self::TotalReturn,
        Self::Expectancy,
        Self::WinRate,
        Self::ProfitFactor,
        Self::MaxDrawdown,
    ];

    /// Extract the relevant value from a summary.
    pub fn extract(&self, summary: &PerformanceSummary) -> f64 {
        match self {
            Self::Sharpe => summary.sharpe,
            Self::TotalReturn => summary.total_return,
            Self::Expectancy => summary.expectancy,
            Self::WinRate => summary.win_rate,
            Self::ProfitFactor => summary.profit_factor,
            Self::MaxDrawdown => summary.max_drawdown,
        }
    }

    /// Returns true if `a` is better than `b`.
    ///
    /// Drawdown is stored as a value <= 0, so plain `>` is right for every
    /// metric: -1.0 beats -3.0.
    pub fn is_better(&self, a: f64, b: f64) -> bool {
        a > b
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Sharpe => "sharpe",
            Self::TotalReturn => "total_return",
            Self::Expectancy => "expectancy",
            Self::WinRate => "win_rate",
            Self::ProfitFactor => "profit_factor",
            Self::MaxDrawdown => "max_drawdown",
        }
    }
}

impl fmt::Display for FitnessMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FitnessMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.name() == s)
            .ok_or_else(|| {
                let known: Vec<&str> = Self::ALL.iter().map(|m| m.name()).collect();
                format!("unknown fitness metric '{s}' (expected one of: {})", known.join(", "))
            })
    }
}
