//! Strategy trait and built-in strategies.
//!
//! The engine is written once; a strategy only decides *whether* to enter on
//! the current bar and where the stop and target go. It sees a
//! [`MarketWindow`] built from bars `0..=i` and the extreme log truncated at
//! `i`, so it cannot read the future even by accident.

pub mod extreme_reversal;
pub mod factory;
pub mod trend_pullback;
pub mod zone_rejection;

pub use extreme_reversal::ExtremeReversal;
pub use factory::{create_strategy, FactoryError, StrategyConfig};
pub use trend_pullback::TrendPullback;
pub use zone_rejection::ZoneRejection;

use serde::{Deserialize, Serialize};

use crate::domain::{Bar, Direction, ExitReason, Levels, Trade};
use crate::engine::ExitRules;
use crate::extremes::ExtremeView;

/// Everything a strategy may look at on bar `index`.
#[derive(Debug, Clone, Copy)]
pub struct MarketWindow<'a> {
    /// Bars `0..=index`, already in the run's price space.
    pub bars: &'a [Bar],
    pub index: usize,
    /// ATR at `index`; `None` during warmup.
    pub atr: Option<f64>,
    /// Extremes confirmed at or before `index`.
    pub extremes: ExtremeView<'a>,
}

impl<'a> MarketWindow<'a> {
    pub fn new(
        bars: &'a [Bar],
        index: usize,
        atr: Option<f64>,
        extremes: ExtremeView<'a>,
    ) -> Self {
        debug_assert_eq!(bars.len(), index + 1);
        debug_assert!(extremes.iter().all(|e| e.confirm_index <= index));
        Self {
            bars,
            index,
            atr,
            extremes,
        }
    }

    /// The bar being evaluated.
    pub fn bar(&self) -> &'a Bar {
        &self.bars[self.index]
    }

    pub fn close(&self) -> f64 {
        self.bar().close
    }

    /// Bars strictly before the current one, most recent first, at most
    /// `limit` of them.
    pub fn history_back(&self, limit: usize) -> impl Iterator<Item = &'a Bar> {
        let bars: &'a [Bar] = self.bars;
        bars[..self.index].iter().rev().take(limit)
    }
}

/// How stop-loss and take-profit are placed on entry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LevelSpec {
    /// Distances of `tp_mult`·ATR and `sl_mult`·ATR from the entry close.
    AtrMultiple { tp_mult: f64, sl_mult: f64 },
    /// Absolute prices, typically taken from recent extremes.
    Fixed { stop_loss: f64, take_profit: f64 },
}

impl LevelSpec {
    /// Resolve to concrete prices for an entry at `close`.
    ///
    /// `None` when ATR is needed but not yet available, or when a level would
    /// not be finite. Either way the entry is treated as "no signal".
    pub fn resolve(&self, direction: Direction, close: f64, atr: Option<f64>) -> Option<Levels> {
        let levels = match *self {
            Self::AtrMultiple { tp_mult, sl_mult } => {
                let atr = atr?;
                let sign = direction.sign();
                Levels::new(close - sign * atr * sl_mult, close + sign * atr * tp_mult)
            }
            Self::Fixed {
                stop_loss,
                take_profit,
            } => Levels::new(stop_loss, take_profit),
        };
        levels.is_finite().then_some(levels)
    }
}

/// A strategy's request to enter on the current bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntrySignal {
    pub direction: Direction,
    pub levels: LevelSpec,
}

impl EntrySignal {
    pub fn long(levels: LevelSpec) -> Self {
        Self {
            direction: Direction::Long,
            levels,
        }
    }

    pub fn short(levels: LevelSpec) -> Self {
        Self {
            direction: Direction::Short,
            levels,
        }
    }
}

/// Entry and exit predicates plugged into the engine.
///
/// # Architecture contract
/// Strategies never see engine state or bars past the current index. They
/// are `Send + Sync` so one instance can be shared across sweep workers.
pub trait Strategy: Send + Sync {
    /// Short machine-readable name (e.g., "extreme_reversal").
    fn name(&self) -> &str;

    /// Bars needed before `evaluate_entry` can say anything useful.
    fn warmup_bars(&self) -> usize {
        0
    }

    /// Decide whether to enter on `window.index`. Called only while the
    /// trade slot is idle.
    fn evaluate_entry(&self, window: &MarketWindow<'_>) -> Option<EntrySignal>;

    /// Decide whether `trade` exits on `bar`. Called only for trades opened
    /// on an earlier bar.
    fn evaluate_exit(
        &self,
        trade: &Trade,
        bar: &Bar,
        index: usize,
        rules: &ExitRules,
    ) -> Option<ExitReason> {
        rules.evaluate(trade, bar, index)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{NaiveDate, NaiveDateTime};

    use crate::domain::{Bar, Extreme, ExtremeKind};
    use crate::extremes::ExtremeLog;

    pub fn ts(i: usize) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + chrono::Duration::hours(i as i64)
    }

    /// Flat-range bars around the given closes.
    pub fn bars_at(closes: &[f64]) -> Vec<Bar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar::new(ts(i), c, c + 0.1, c - 0.1, c, 100.0))
            .collect()
    }

    /// Alternating log from `(index, confirm_index, price)` triples starting
    /// with `first`.
    pub fn log_of(first: ExtremeKind, points: &[(usize, usize, f64)]) -> ExtremeLog {
        let mut kind = first;
        ExtremeLog::try_from_extremes(points.iter().map(|&(index, confirm_index, price)| {
            let e = Extreme {
                index,
                confirm_index,
                timestamp: ts(index),
                price,
                kind,
            };
            kind = kind.opposite();
            e
        }))
        .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atr_levels_mirror_by_direction() {
        let spec = LevelSpec::AtrMultiple {
            tp_mult: 3.0,
            sl_mult: 2.0,
        };
        let long = spec.resolve(Direction::Long, 100.0, Some(1.5)).unwrap();
        assert_eq!(long, Levels::new(97.0, 104.5));
        let short = spec.resolve(Direction::Short, 100.0, Some(1.5)).unwrap();
        assert_eq!(short, Levels::new(103.0, 95.5));
    }

    #[test]
    fn atr_levels_need_atr() {
        let spec = LevelSpec::AtrMultiple {
            tp_mult: 1.0,
            sl_mult: 1.0,
        };
        assert!(spec.resolve(Direction::Long, 100.0, None).is_none());
        assert!(spec
            .resolve(Direction::Long, 100.0, Some(f64::INFINITY))
            .is_none());
    }

    #[test]
    fn fixed_levels_pass_through() {
        let spec = LevelSpec::Fixed {
            stop_loss: 95.0,
            take_profit: 110.0,
        };
        assert_eq!(
            spec.resolve(Direction::Long, 100.0, None),
            Some(Levels::new(95.0, 110.0))
        );
        let bad = LevelSpec::Fixed {
            stop_loss: f64::NAN,
            take_profit: 110.0,
        };
        assert!(bad.resolve(Direction::Long, 100.0, Some(1.0)).is_none());
    }

    #[test]
    fn window_history_excludes_current_bar() {
        let bars = test_support::bars_at(&[1.0, 2.0, 3.0, 4.0]);
        let log = crate::extremes::ExtremeLog::new();
        let window = MarketWindow::new(&bars, 3, None, log.snapshot(3));
        assert_eq!(window.close(), 4.0);
        let back: Vec<f64> = window.history_back(2).map(|b| b.close).collect();
        assert_eq!(back, vec![3.0, 2.0]);
        assert_eq!(window.history_back(10).count(), 3);
    }

    /// Architecture contract: the entry predicate receives only a window.
    #[test]
    fn strategy_trait_is_object_safe() {
        fn _check(
            strategy: &dyn Strategy,
            window: &MarketWindow<'_>,
        ) -> Option<EntrySignal> {
            strategy.evaluate_entry(window)
        }
    }
}
