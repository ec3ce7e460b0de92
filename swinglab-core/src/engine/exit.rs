//! Standard exit rules.
//!
//! Checked against the bar close in fixed precedence: take-profit and
//! stop-loss first, then the hold deadline. Since both levels are compared
//! against the same close, TP and SL can only both trigger when the levels
//! are inverted (gapping data or fixed levels on the wrong side); the
//! configured [`TieBreak`] settles that case.

use serde::{Deserialize, Serialize};

use crate::domain::{Bar, ExitReason, Trade};

/// Which exit wins when a single close satisfies both TP and SL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    #[default]
    StopLossFirst,
    TakeProfitFirst,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExitRules {
    pub tie_break: TieBreak,
}

impl ExitRules {
    pub fn new(tie_break: TieBreak) -> Self {
        Self { tie_break }
    }

    /// The reason `trade` exits at `bar`, if any.
    pub fn evaluate(&self, trade: &Trade, bar: &Bar, index: usize) -> Option<ExitReason> {
        let tp = trade.take_profit_touched(bar.close);
        let sl = trade.stop_loss_touched(bar.close);
        match (tp, sl, self.tie_break) {
            (true, true, TieBreak::StopLossFirst) => Some(ExitReason::StopLoss),
            (true, true, TieBreak::TakeProfitFirst) => Some(ExitReason::TakeProfit),
            (true, false, _) => Some(ExitReason::TakeProfit),
            (false, true, _) => Some(ExitReason::StopLoss),
            (false, false, _) => trade
                .deadline_reached(index)
                .then_some(ExitReason::HoldExpired),
        }
    }
}
