//! Backtest runner: wires together config, data, strategy, engine, and
//! metrics.
//!
//! Two entry points:
//! - `run_from_config()`: loads the configured bars, then runs. Used by the CLI.
//! - `run_on_bars()`: takes pre-loaded data, no I/O. Used by sweeps.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use swinglab_core::engine::{run_backtest, EngineConfig, RunResult};
use swinglab_core::strategy::{create_strategy, FactoryError, StrategyConfig};
use swinglab_core::CoreError;

use crate::config::{ConfigError, RunConfig, RunId, SigmaMode};
use crate::data_loader::{load_data, LoadError, LoadedData};
use crate::metrics::PerformanceSummary;

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("strategy error: {0}")]
    Strategy(#[from] FactoryError),
    #[error("engine error: {0}")]
    Engine(#[from] CoreError),
    #[error("no bars to run on")]
    NoBars,
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Complete result of a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: RunId,
    pub symbol: String,
    pub strategy: StrategyConfig,
    /// Engine settings as run, with sigma already resolved to absolute units.
    pub engine: EngineConfig,
    pub sigma_mode: SigmaMode,
    pub dataset_hash: String,
    pub has_synthetic: bool,
    pub bar_count: usize,
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    pub summary: PerformanceSummary,
    pub run: RunResult,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Validate the config, load its bars and run.
pub fn run_from_config(config: &RunConfig) -> Result<BacktestResult, RunError> {
    config.validate()?;
    let data = load_data(&config.data)?;
    run_on_bars(config, &data)
}

/// Run a backtest on pre-loaded data. Does no I/O.
///
/// The config's data section is not consulted; `data` supplies the bars,
/// symbol and dataset hash.
pub fn run_on_bars(config: &RunConfig, data: &LoadedData) -> Result<BacktestResult, RunError> {
    let first = data.bars.first().ok_or(RunError::NoBars)?;
    let sigma = config.resolve_sigma(first.close)?;
    let engine_config = config.engine_config(sigma);
    let strategy = create_strategy(&config.strategy)?;

    let run = run_backtest(&data.bars, &engine_config, strategy.as_ref())?;
    let summary = PerformanceSummary::from_ledger(&run.trades);

    info!(
        symbol = %data.symbol,
        strategy = strategy.name(),
        sigma,
        trades = summary.trade_count,
        total_return = summary.total_return,
        sharpe = summary.sharpe,
        completed = run.completed,
        "backtest finished"
    );

    Ok(BacktestResult {
        schema_version: SCHEMA_VERSION,
        run_id: config.run_id()?,
        symbol: data.symbol.clone(),
        strategy: config.strategy.clone(),
        engine: engine_config,
        sigma_mode: config.detector.sigma_mode,
        dataset_hash: data.dataset_hash.clone(),
        has_synthetic: data.is_synthetic(),
        bar_count: data.bars.len(),
        start: data.bars.first().map(|b| b.timestamp),
        end: data.bars.last().map(|b| b.timestamp),
        summary,
        run,
    })
}
