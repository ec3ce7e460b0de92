//! Monte Carlo risk of ruin: seeded equity paths from a win rate and a
//! reward-to-risk ratio.
//!
//! Each path starts at a balance of 1.0 and risks a fixed fraction of the
//! current balance per trade. A win adds `risk · reward_risk`, a loss takes
//! the risk away. A path stops when the balance reaches the profit target,
//! falls to the ruin level, or runs out of trades.
//!
//! All paths share one `StdRng`, so a seed fixes the whole result.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::metrics::PerformanceSummary;

// ─── Configuration ───────────────────────────────────────────────────

/// Parameters of a simulation. Balances are relative to a start of 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloConfig {
    /// Probability that a trade wins, in [0, 1].
    pub win_rate: f64,
    /// Win size in units of the amount risked.
    pub reward_risk: f64,
    /// Fraction of the current balance risked per trade (default 0.01).
    pub risk_fraction: f64,
    /// Gain over the start that ends a path as a success (default 0.2).
    pub upper_threshold: f64,
    /// Loss from the start that ends a path as ruin (default 0.2).
    pub lower_threshold: f64,
    /// Trades after which an undecided path stops (default 1000).
    pub max_trades: usize,
    /// Number of simulated paths (default 1000).
    pub paths: usize,
    pub seed: u64,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            win_rate: 0.5,
            reward_risk: 1.0,
            risk_fraction: 0.01,
            upper_threshold: 0.2,
            lower_threshold: 0.2,
            max_trades: 1000,
            paths: 1000,
            seed: 42,
        }
    }
}

impl MonteCarloConfig {
    pub fn new(win_rate: f64, reward_risk: f64) -> Self {
        Self {
            win_rate,
            reward_risk,
            ..Self::default()
        }
    }

    /// Take the win rate and reward-to-risk ratio of a backtest.
    pub fn from_summary(summary: &PerformanceSummary) -> Self {
        Self::new(summary.win_rate, summary.reward_risk)
    }

    pub fn with_risk_fraction(mut self, risk_fraction: f64) -> Self {
        self.risk_fraction = risk_fraction;
        self
    }

    pub fn with_thresholds(mut self, upper: f64, lower: f64) -> Self {
        self.upper_threshold = upper;
        self.lower_threshold = lower;
        self
    }

    pub fn with_paths(mut self, paths: usize, max_trades: usize) -> Self {
        self.paths = paths;
        self.max_trades = max_trades;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn validate(&self) -> Result<(), MonteCarloError> {
        let invalid = |msg: String| -> Result<(), MonteCarloError> {
            Err(MonteCarloError::InvalidConfig(msg))
        };
        if !(0.0..=1.0).contains(&self.win_rate) {
            return invalid(format!("win_rate must be in [0, 1] (got {})", self.win_rate));
        }
        if !(self.reward_risk.is_finite() && self.reward_risk >= 0.0) {
            return invalid(format!(
                "reward_risk must be finite and >= 0 (got {})",
                self.reward_risk
            ));
        }
        if !(self.risk_fraction > 0.0 && self.risk_fraction < 1.0) {
            return invalid(format!(
                "risk_fraction must be in (0, 1) (got {})",
                self.risk_fraction
            ));
        }
        if !(self.upper_threshold.is_finite() && self.upper_threshold > 0.0) {
            return invalid(format!(
                "upper_threshold must be finite and > 0 (got {})",
                self.upper_threshold
            ));
        }
        if !(self.lower_threshold > 0.0 && self.lower_threshold < 1.0) {
            return invalid(format!(
                "lower_threshold must be in (0, 1) (got {})",
                self.lower_threshold
            ));
        }
        if self.paths == 0 || self.max_trades == 0 {
            return invalid("paths and max_trades must be > 0".into());
        }
        Ok(())
    }
}

// ─── Result types ────────────────────────────────────────────────────

/// How a single path ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathOutcome {
    Target,
    Ruin,
    Unresolved,
}

/// One simulated equity path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathSummary {
    pub outcome: PathOutcome,
    pub trades: usize,
    pub final_balance: f64,
    /// Deepest fall below the running peak, as a fraction of that peak (<= 0).
    pub max_drawdown: f64,
}

/// Aggregate over every path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloResult {
    pub config: MonteCarloConfig,
    pub ruin_probability: f64,
    pub target_probability: f64,
    pub unresolved_probability: f64,
    pub trades_mean: f64,
    pub trades_median: f64,
    pub trades_std: f64,
    pub final_balance_median: f64,
    /// Median path drawdown.
    pub drawdown_median: f64,
    /// 95% of paths had a drawdown no deeper than this.
    pub drawdown_p95: f64,
    pub drawdown_worst: f64,
}

#[derive(Debug, Error)]
pub enum MonteCarloError {
    #[error("invalid Monte Carlo config: {0}")]
    InvalidConfig(String),
}

// ─── Simulation ──────────────────────────────────────────────────────

/// Run every path and summarize.
pub fn simulate(config: &MonteCarloConfig) -> Result<MonteCarloResult, MonteCarloError> {
    let paths = simulate_paths(config)?;
    let result = summarize(config, &paths);
    info!(
        paths = config.paths,
        seed = config.seed,
        ruin = result.ruin_probability,
        target = result.target_probability,
        "monte carlo finished"
    );
    Ok(result)
}

/// The individual paths, in simulation order.
pub fn simulate_paths(config: &MonteCarloConfig) -> Result<Vec<PathSummary>, MonteCarloError> {
    config.validate()?;
    let mut rng = StdRng::seed_from_u64(config.seed);
    Ok((0..config.paths)
        .map(|_| simulate_path(config, &mut rng))
        .collect())
}

fn simulate_path(config: &MonteCarloConfig, rng: &mut StdRng) -> PathSummary {
    let target = 1.0 + config.upper_threshold;
    let ruin = 1.0 - config.lower_threshold;

    let mut balance = 1.0_f64;
    let mut peak = 1.0_f64;
    let mut max_drawdown = 0.0_f64;
    let mut outcome = PathOutcome::Unresolved;
    let mut trades = 0;

    while trades < config.max_trades {
        let risk = balance * config.risk_fraction;
        if rng.gen::<f64>() < config.win_rate {
            balance += risk * config.reward_risk;
        } else {
            balance -= risk;
        }
        trades += 1;

        peak = peak.max(balance);
        max_drawdown = max_drawdown.min(balance / peak - 1.0);

        if balance >= target {
            outcome = PathOutcome::Target;
            break;
        }
        if balance <= ruin {
            outcome = PathOutcome::Ruin;
            break;
        }
    }

    PathSummary {
        outcome,
        trades,
        final_balance: balance,
        max_drawdown,
    }
}

fn summarize(config: &MonteCarloConfig, paths: &[PathSummary]) -> MonteCarloResult {
    let n = paths.len() as f64;
    let share = |outcome: PathOutcome| {
        paths.iter().filter(|p| p.outcome == outcome).count() as f64 / n
    };

    let trades: Vec<f64> = paths.iter().map(|p| p.trades as f64).collect();
    let trades_mean = trades.iter().sum::<f64>() / n;
    let trades_std =
        (trades.iter().map(|t| (t - trades_mean).powi(2)).sum::<f64>() / n).sqrt();

    let finals = sorted(paths.iter().map(|p| p.final_balance));
    let drawdowns = sorted(paths.iter().map(|p| p.max_drawdown));

    MonteCarloResult {
        config: config.clone(),
        ruin_probability: share(PathOutcome::Ruin),
        target_probability: share(PathOutcome::Target),
        unresolved_probability: share(PathOutcome::Unresolved),
        trades_mean,
        trades_median: percentile(&sorted(trades.iter().copied()), 50.0),
        trades_std,
        final_balance_median: percentile(&finals, 50.0),
        drawdown_median: percentile(&drawdowns, 50.0),
        // Drawdowns are negative, so the deep tail is at the low end.
        drawdown_p95: percentile(&drawdowns, 5.0),
        drawdown_worst: drawdowns.first().copied().unwrap_or(0.0),
    }
}

fn sorted(values: impl Iterator<Item = f64>) -> Vec<f64> {
    let mut values: Vec<f64> = values.collect();
    values.sort_by(f64::total_cmp);
    values
}

/// Linear interpolation between closest ranks of an ascending slice.
fn percentile(sorted: &[f64], pct: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = pct / 100.0 * (n - 1) as f64;
            let below = rank.floor() as usize;
            let above = rank.ceil() as usize;
            let weight = rank - below as f64;
            sorted[below] + (sorted[above] - sorted[below]) * weight
        }
    }
}
