//! TradeLedger: completed trades in the order they closed.

use serde::{Deserialize, Serialize};

use crate::domain::Trade;

/// Append-only list of closed trades. Only the engine appends.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TradeLedger {
    trades: Vec<Trade>,
}

impl TradeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&mut self, trade: Trade) {
        debug_assert!(trade.is_closed());
        debug_assert!(self
            .trades
            .last()
            .and_then(|prev| prev.exit_index)
            .map_or(true, |prev_exit| trade.entry_index > prev_exit));
        self.trades.push(trade);
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Trade> {
        self.trades.iter()
    }

    pub fn as_slice(&self) -> &[Trade] {
        &self.trades
    }

    pub fn last(&self) -> Option<&Trade> {
        self.trades.last()
    }

    /// Per-trade returns in ledger order.
    pub fn returns(&self) -> Vec<f64> {
        self.trades.iter().filter_map(Trade::trade_return).collect()
    }

    pub fn into_vec(self) -> Vec<Trade> {
        self.trades
    }
}

impl<'a> IntoIterator for &'a TradeLedger {
    type Item = &'a Trade;
    type IntoIter = std::slice::Iter<'a, Trade>;

    fn into_iter(self) -> Self::IntoIter {
        self.trades.iter()
    }
}
