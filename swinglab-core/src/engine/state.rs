//! Trade slot state and run result types.

use serde::{Deserialize, Serialize};

use super::ledger::TradeLedger;
use crate::domain::{Extreme, Trade, TradeId};
use crate::extremes::ExtremeLog;
use crate::strategy::LevelSpec;

/// An armed entry waiting for price confirmation.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEntry {
    /// Status `Pending`, priced at the arming close with provisional levels.
    pub trade: Trade,
    /// Re-resolved against the confirming bar on commit.
    pub levels: LevelSpec,
}

impl PendingEntry {
    pub fn armed_index(&self) -> usize {
        self.trade.armed_index.unwrap_or(self.trade.entry_index)
    }
}

/// The single trade slot.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Slot {
    #[default]
    Idle,
    Pending(PendingEntry),
    Open(Trade),
}

impl Slot {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// The trade in the slot, pending or open.
    pub fn trade(&self) -> Option<&Trade> {
        match self {
            Self::Idle => None,
            Self::Pending(p) => Some(&p.trade),
            Self::Open(t) => Some(t),
        }
    }

    pub(crate) fn into_trade(self) -> Option<Trade> {
        match self {
            Self::Idle => None,
            Self::Pending(p) => Some(p.trade),
            Self::Open(t) => Some(t),
        }
    }
}

/// What happened on one bar.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepEvents {
    pub extreme: Option<Extreme>,
    pub closed: Option<TradeId>,
    pub armed: bool,
    pub discarded: bool,
    pub opened: Option<TradeId>,
}

/// Result of a complete (or budget-limited) backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    /// Every extreme confirmed over the processed bars.
    pub extremes: ExtremeLog,
    /// Closed trades in the order they closed.
    pub trades: TradeLedger,
    /// Trade still in the slot when the run stopped, `Open` or `Pending`.
    pub open_trade: Option<Trade>,
    pub bars_processed: usize,
    /// `false` when the bar budget stopped the run early.
    pub completed: bool,
    /// Armed entries dropped for lack of confirmation.
    pub discarded_entries: usize,
    /// Times the strategy was asked for an entry.
    pub entries_evaluated: usize,
    /// Times the strategy answered with a usable entry.
    pub entry_signals: usize,
}
