//! SwingLab Runner: configuration, data loading, metrics, sweeps, artifacts.
//!
//! This crate builds on `swinglab-core` to provide:
//! - TOML run configuration with a content-hash run id
//! - CSV bar loading and seeded synthetic data
//! - A single-run entry point producing a serializable result
//! - Performance summary over a trade ledger
//! - Parallel parameter sweeps ranked by a fitness metric
//! - Seeded Monte Carlo risk-of-ruin simulation from a win rate and reward/risk
//! - JSON, CSV, and Markdown artifacts

pub mod config;
pub mod data_loader;
pub mod export;
pub mod fitness;
pub mod metrics;
pub mod monte_carlo;
pub mod runner;
pub mod sweep;

pub use config::{ConfigError, DataConfig, RunConfig, RunId, SigmaMode};
pub use data_loader::{generate_synthetic, load_csv, load_data, LoadError, LoadedData, SyntheticSpec};
pub use fitness::FitnessMetric;
pub use metrics::PerformanceSummary;
pub use monte_carlo::{simulate, MonteCarloConfig, MonteCarloError, MonteCarloResult};
pub use runner::{run_from_config, run_on_bars, BacktestResult, RunError, SCHEMA_VERSION};
pub use sweep::{ParamAxis, ParamGrid, ParamSweep, SweepResults, SweepRow};
