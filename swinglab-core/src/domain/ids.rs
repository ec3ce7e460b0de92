use serde::{Deserialize, Serialize};
use std::fmt;

/// Sequence number of a committed trade within one run (0, 1, 2, ...).
///
/// Pending entries that are discarded never consume an id, so ledger ids are
/// contiguous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TradeId(pub u64);

impl fmt::Display for TradeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hands out trade ids in commit order.
#[derive(Debug, Clone, Default)]
pub struct IdGen {
    next_trade: u64,
}

impl IdGen {
    pub fn new() -> Self {
        Self::default()
    }

    /// The id the next committed trade will receive, without consuming it.
    pub fn peek_trade_id(&self) -> TradeId {
        TradeId(self.next_trade)
    }

    pub fn next_trade_id(&mut self) -> TradeId {
        let id = TradeId(self.next_trade);
        self.next_trade += 1;
        id
    }
}
