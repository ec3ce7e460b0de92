//! Trade: one round trip through the single trade slot.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::TradeId;

/// Side of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// +1 for long, -1 for short.
    pub fn sign(self) -> f64 {
        match self {
            Self::Long => 1.0,
            Self::Short => -1.0,
        }
    }

    /// Signed price move from `from` to `to`, positive when it favors this side.
    pub fn favorable_move(self, from: f64, to: f64) -> f64 {
        self.sign() * (to - from)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Long => write!(f, "long"),
            Self::Short => write!(f, "short"),
        }
    }
}

/// Lifecycle of a trade: `Pending → Open → Closed`, or `Open → Closed` when
/// entries are committed immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeStatus {
    /// Armed, waiting for price confirmation. Levels are provisional.
    Pending,
    Open,
    Closed,
}

/// Which exit rule closed the trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    TakeProfit,
    StopLoss,
    HoldExpired,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TakeProfit => write!(f, "take_profit"),
            Self::StopLoss => write!(f, "stop_loss"),
            Self::HoldExpired => write!(f, "hold_expired"),
        }
    }
}

/// Stop-loss and take-profit prices for one trade.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Levels {
    pub stop_loss: f64,
    pub take_profit: f64,
}

impl Levels {
    pub fn new(stop_loss: f64, take_profit: f64) -> Self {
        Self {
            stop_loss,
            take_profit,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.stop_loss.is_finite() && self.take_profit.is_finite()
    }
}

/// A trade record.
///
/// The return is always derived from entry and exit prices, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: TradeId,
    pub direction: Direction,
    pub status: TradeStatus,

    // ── Entry ──
    /// Bar at which a pending entry was armed (`None` for immediate entries).
    pub armed_index: Option<usize>,
    pub entry_index: usize,
    pub entry_timestamp: NaiveDateTime,
    pub entry_price: f64,

    // ── Exit rules ──
    pub stop_loss: f64,
    pub take_profit: f64,
    /// `None` when the hold period is unbounded.
    pub hold_deadline: Option<usize>,

    // ── Exit ──
    pub exit_index: Option<usize>,
    pub exit_timestamp: Option<NaiveDateTime>,
    pub exit_price: Option<f64>,
    pub exit_reason: Option<ExitReason>,
}

impl Trade {
    /// A trade opened immediately at `index`.
    pub fn open(
        id: TradeId,
        direction: Direction,
        index: usize,
        timestamp: NaiveDateTime,
        price: f64,
        levels: Levels,
        hold_deadline: Option<usize>,
    ) -> Self {
        Self {
            id,
            direction,
            status: TradeStatus::Open,
            armed_index: None,
            entry_index: index,
            entry_timestamp: timestamp,
            entry_price: price,
            stop_loss: levels.stop_loss,
            take_profit: levels.take_profit,
            hold_deadline,
            exit_index: None,
            exit_timestamp: None,
            exit_price: None,
            exit_reason: None,
        }
    }

    /// A tentative entry armed at `index` with provisional levels.
    pub fn pending(
        id: TradeId,
        direction: Direction,
        index: usize,
        timestamp: NaiveDateTime,
        reference_price: f64,
        provisional: Levels,
    ) -> Self {
        Self {
            status: TradeStatus::Pending,
            armed_index: Some(index),
            ..Self::open(
                id,
                direction,
                index,
                timestamp,
                reference_price,
                provisional,
                None,
            )
        }
    }

    /// Commit a pending trade: entry price and levels become final.
    pub fn commit(
        &mut self,
        index: usize,
        timestamp: NaiveDateTime,
        price: f64,
        levels: Levels,
        hold_deadline: Option<usize>,
    ) {
        debug_assert_eq!(self.status, TradeStatus::Pending);
        self.status = TradeStatus::Open;
        self.entry_index = index;
        self.entry_timestamp = timestamp;
        self.entry_price = price;
        self.stop_loss = levels.stop_loss;
        self.take_profit = levels.take_profit;
        self.hold_deadline = hold_deadline;
    }

    /// Close an open trade.
    pub fn close(
        &mut self,
        index: usize,
        timestamp: NaiveDateTime,
        price: f64,
        reason: ExitReason,
    ) {
        debug_assert_eq!(self.status, TradeStatus::Open);
        debug_assert!(index > self.entry_index);
        self.status = TradeStatus::Closed;
        self.exit_index = Some(index);
        self.exit_timestamp = Some(timestamp);
        self.exit_price = Some(price);
        self.exit_reason = Some(reason);
    }

    pub fn levels(&self) -> Levels {
        Levels::new(self.stop_loss, self.take_profit)
    }

    pub fn is_pending(&self) -> bool {
        self.status == TradeStatus::Pending
    }

    pub fn is_open(&self) -> bool {
        self.status == TradeStatus::Open
    }

    pub fn is_closed(&self) -> bool {
        self.status == TradeStatus::Closed
    }

    /// Long: `exit - entry`. Short: `entry - exit`. `None` until closed.
    pub fn trade_return(&self) -> Option<f64> {
        self.exit_price
            .map(|exit| self.direction.favorable_move(self.entry_price, exit))
    }

    pub fn is_winner(&self) -> bool {
        self.trade_return().is_some_and(|r| r > 0.0)
    }

    pub fn bars_held(&self) -> Option<usize> {
        self.exit_index.map(|exit| exit - self.entry_index)
    }

    /// Whether `price` is at or beyond the take-profit level.
    pub fn take_profit_touched(&self, price: f64) -> bool {
        match self.direction {
            Direction::Long => price >= self.take_profit,
            Direction::Short => price <= self.take_profit,
        }
    }

    /// Whether `price` is at or beyond the stop-loss level.
    pub fn stop_loss_touched(&self, price: f64) -> bool {
        match self.direction {
            Direction::Long => price <= self.stop_loss,
            Direction::Short => price >= self.stop_loss,
        }
    }

    pub fn deadline_reached(&self, index: usize) -> bool {
        self.hold_deadline.is_some_and(|deadline| index >= deadline)
    }
}
