//! Trend pullback: buy the dip inside an established up-swing.
//!
//! Conditions on bar `i`:
//! - the last extreme is a Top and the one before it a Bottom;
//! - the close sits in the lower `alpha` fraction of that swing;
//! - the last `trend_len` Tops and the last `trend_len` Bottoms are each
//!   non-decreasing.
//!
//! The stop goes at the swing Bottom and the target at the swing Top.

use super::{EntrySignal, LevelSpec, MarketWindow, Strategy};
use crate::domain::ExtremeKind;

#[derive(Debug, Clone)]
pub struct TrendPullback {
    alpha: f64,
    trend_len: usize,
}

impl TrendPullback {
    pub fn new(alpha: f64, trend_len: usize) -> Self {
        Self { alpha, trend_len }
    }
}

impl Strategy for TrendPullback {
    fn name(&self) -> &str {
        "trend_pullback"
    }

    fn evaluate_entry(&self, window: &MarketWindow<'_>) -> Option<EntrySignal> {
        let extremes = &window.extremes;
        let (bottom, top) = extremes.swing()?;
        if bottom.kind != ExtremeKind::Bottom || top.kind != ExtremeKind::Top {
            return None;
        }

        let close = window.close();
        let ceiling = (1.0 - self.alpha) * bottom.price + self.alpha * top.price;
        if !(bottom.price <= close && close <= ceiling) {
            return None;
        }

        let tops_rising = extremes.is_rising(ExtremeKind::Top, self.trend_len)?;
        let bottoms_rising = extremes.is_rising(ExtremeKind::Bottom, self.trend_len)?;
        if !(tops_rising && bottoms_rising) {
            return None;
        }

        Some(EntrySignal::long(LevelSpec::Fixed {
            stop_loss: bottom.price,
            take_profit: top.price,
        }))
    }
}
