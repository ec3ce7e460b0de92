//! SwingLab Core: directional-change extrema and a single-trade backtest engine.
//!
//! This crate contains:
//! - Domain types (bars, extremes, trades, ids)
//! - The zigzag extrema detector and its append-only log with causal views
//! - ATR, batch and streaming
//! - The bar-by-bar engine: one trade slot, TP/SL/hold-deadline exits,
//!   optional entry confirmation, bar budget
//! - The `Strategy` trait, three built-in strategies and a factory

pub mod domain;
pub mod engine;
pub mod error;
pub mod extremes;
pub mod indicators;
pub mod strategy;

pub use domain::{Bar, BarError, Direction, ExitReason, Extreme, ExtremeKind, Trade, TradeStatus};
pub use engine::{run_backtest, BacktestEngine, EngineConfig, RunResult};
pub use error::CoreError;
pub use extremes::{detect_extremes, ExtremaDetector, ExtremeLog, ExtremeView};
pub use strategy::{create_strategy, Strategy, StrategyConfig};
