//! Backtesting engine: single-pass, single-trade state machine.
//!
//! The trade slot moves `Idle → (Pending →) Open → Idle`; closed trades go to
//! the [`TradeLedger`] and are never touched again. Detector, ATR and slot
//! advance in lock-step over the same bar stream.

pub mod config;
pub mod exit;
pub mod ledger;
pub mod loop_runner;
pub mod state;

pub use config::{EngineConfig, EntryConfirmation, HoldPeriod, PriceSpace};
pub use exit::{ExitRules, TieBreak};
pub use ledger::TradeLedger;
pub use loop_runner::{run_backtest, BacktestEngine, Simulation};
pub use state::{PendingEntry, RunResult, Slot, StepEvents};
