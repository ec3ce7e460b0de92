//! Extreme reversal: fade into a freshly confirmed swing.
//!
//! Long when the most recent extreme printed within `max_tolerance` bars is
//! a Bottom, short when it is a Top. Requires ATR of at least `atr_min` so
//! that quiet markets don't produce stops inside the spread.

use super::{EntrySignal, LevelSpec, MarketWindow, Strategy};
use crate::domain::ExtremeKind;

#[derive(Debug, Clone)]
pub struct ExtremeReversal {
    max_tolerance: usize,
    atr_min: f64,
    tp_mult: f64,
    sl_mult: f64,
}

impl ExtremeReversal {
    pub fn new(max_tolerance: usize, atr_min: f64, tp_mult: f64, sl_mult: f64) -> Self {
        Self {
            max_tolerance,
            atr_min,
            tp_mult,
            sl_mult,
        }
    }
}

impl Strategy for ExtremeReversal {
    fn name(&self) -> &str {
        "extreme_reversal"
    }

    fn evaluate_entry(&self, window: &MarketWindow<'_>) -> Option<EntrySignal> {
        let from = window.index.saturating_sub(self.max_tolerance);
        let extreme = window.extremes.recent_since(from).last()?;
        let atr = window.atr?;
        if atr < self.atr_min {
            return None;
        }
        let levels = LevelSpec::AtrMultiple {
            tp_mult: self.tp_mult,
            sl_mult: self.sl_mult,
        };
        Some(match extreme.kind {
            ExtremeKind::Bottom => EntrySignal::long(levels),
            ExtremeKind::Top => EntrySignal::short(levels),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Direction;
    use crate::strategy::test_support::{bars_at, log_of};

    fn strategy() -> ExtremeReversal {
        ExtremeReversal::new(3, 0.5, 3.0, 2.0)
    }

    #[test]
    fn long_after_recent_bottom() {
        let bars = bars_at(&[10.0; 12]);
        let log = log_of(ExtremeKind::Top, &[(2, 4, 12.0), (8, 10, 8.0)]);
        let window = MarketWindow::new(&bars, 10, Some(1.0), log.snapshot(10));
        let signal = strategy().evaluate_entry(&window).unwrap();
        assert_eq!(signal.direction, Direction::Long);
        assert_eq!(
            signal.levels,
            LevelSpec::AtrMultiple {
                tp_mult: 3.0,
                sl_mult: 2.0
            }
        );
    }

    #[test]
    fn short_after_recent_top() {
        let bars = bars_at(&[10.0; 8]);
        let log = log_of(ExtremeKind::Top, &[(5, 7, 12.0)]);
        let window = MarketWindow::new(&bars, 7, Some(1.0), log.snapshot(7));
        assert_eq!(
            strategy().evaluate_entry(&window).map(|s| s.direction),
            Some(Direction::Short)
        );
    }

    #[test]
    fn stale_extreme_is_ignored() {
        let bars = bars_at(&[10.0; 12]);
        let log = log_of(ExtremeKind::Top, &[(2, 4, 12.0)]);
        // Extreme printed at 2, window at 11 with tolerance 3 looks back to 8.
        let window = MarketWindow::new(&bars, 11, Some(1.0), log.snapshot(11));
        assert!(strategy().evaluate_entry(&window).is_none());
    }

    #[test]
    fn unconfirmed_extreme_is_invisible() {
        let bars = bars_at(&[10.0; 10]);
        let log = log_of(ExtremeKind::Top, &[(6, 9, 12.0)]);
        let window = MarketWindow::new(&bars, 8, Some(1.0), log.snapshot(8));
        assert!(strategy().evaluate_entry(&window).is_none());
    }

    #[test]
    fn quiet_market_is_skipped() {
        let bars = bars_at(&[10.0; 8]);
        let log = log_of(ExtremeKind::Top, &[(5, 7, 12.0)]);
        let low_vol = MarketWindow::new(&bars, 7, Some(0.4), log.snapshot(7));
        assert!(strategy().evaluate_entry(&low_vol).is_none());
        let warming_up = MarketWindow::new(&bars, 7, None, log.snapshot(7));
        assert!(strategy().evaluate_entry(&warming_up).is_none());
    }
}
