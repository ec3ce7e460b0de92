//! Bar-by-bar loop: the heart of the backtesting engine.
//!
//! Per bar `i`, in order:
//! 1. Validate the raw bar and move it into the run's price space.
//! 2. Feed the detector and the streaming ATR.
//! 3. Exits for a trade opened on an earlier bar.
//! 4. Commit or discard an entry armed on an earlier bar.
//! 5. If the slot was idle all along, ask the strategy for an entry.
//!
//! A slot freed on bar `i` (exit or discard) takes no new entry until `i+1`.
//! Everything the strategy sees is built from bars `0..=i`.

use tracing::{debug, info, warn};

use super::config::{EngineConfig, PriceSpace};
use super::exit::ExitRules;
use super::ledger::TradeLedger;
use super::state::{PendingEntry, RunResult, Slot, StepEvents};
use crate::domain::{Bar, IdGen, Trade};
use crate::error::CoreError;
use crate::extremes::ExtremaDetector;
use crate::indicators::RollingAtr;
use crate::strategy::{MarketWindow, Strategy};

/// A validated engine configuration bound to a strategy.
pub struct BacktestEngine<'s> {
    config: EngineConfig,
    strategy: &'s dyn Strategy,
}

impl<'s> BacktestEngine<'s> {
    /// Validates `config` before anything else happens.
    pub fn new(config: EngineConfig, strategy: &'s dyn Strategy) -> Result<Self, CoreError> {
        config.validate()?;
        Ok(Self { config, strategy })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// A fresh streaming simulation.
    pub fn simulation(&self) -> Result<Simulation<'s>, CoreError> {
        Simulation::new(self.config.clone(), self.strategy)
    }

    /// Replay `bars` once, start to finish (or until the bar budget runs out).
    pub fn run(&self, bars: &[Bar]) -> Result<RunResult, CoreError> {
        let mut sim = self.simulation()?;
        for bar in bars {
            if sim.step(bar)?.is_none() {
                break;
            }
        }
        Ok(sim.finish())
    }
}

/// Validate, build and run in one call.
pub fn run_backtest(
    bars: &[Bar],
    config: &EngineConfig,
    strategy: &dyn Strategy,
) -> Result<RunResult, CoreError> {
    BacktestEngine::new(config.clone(), strategy)?.run(bars)
}

/// Streaming form of a run: feed bars one at a time, then [`finish`](Self::finish).
pub struct Simulation<'s> {
    config: EngineConfig,
    strategy: &'s dyn Strategy,
    rules: ExitRules,
    warmup: usize,
    detector: ExtremaDetector,
    atr: RollingAtr,
    /// Bars seen so far, in the run's price space.
    bars: Vec<Bar>,
    slot: Slot,
    ledger: TradeLedger,
    ids: IdGen,
    truncated: bool,
    discarded_entries: usize,
    entries_evaluated: usize,
    entry_signals: usize,
}

impl<'s> Simulation<'s> {
    fn new(config: EngineConfig, strategy: &'s dyn Strategy) -> Result<Self, CoreError> {
        config.validate()?;
        Ok(Self {
            rules: ExitRules::new(config.tie_break),
            warmup: config.lookback.max(strategy.warmup_bars()),
            detector: ExtremaDetector::new(config.sigma)?,
            atr: RollingAtr::new(config.atr_lookback),
            bars: Vec::new(),
            slot: Slot::Idle,
            ledger: TradeLedger::new(),
            ids: IdGen::new(),
            truncated: false,
            discarded_entries: 0,
            entries_evaluated: 0,
            entry_signals: 0,
            config,
            strategy,
        })
    }

    /// Bars consumed so far.
    pub fn bars_processed(&self) -> usize {
        self.bars.len()
    }

    pub fn budget_exhausted(&self) -> bool {
        self.config
            .max_bars
            .is_some_and(|max| self.bars.len() >= max)
    }

    pub fn slot(&self) -> &Slot {
        &self.slot
    }

    pub fn ledger(&self) -> &TradeLedger {
        &self.ledger
    }

    pub fn detector(&self) -> &ExtremaDetector {
        &self.detector
    }

    /// Process the next bar.
    ///
    /// Returns `Ok(None)` without consuming the bar once the budget is spent.
    /// An invalid bar aborts the run with `InvalidBar`.
    pub fn step(&mut self, raw: &Bar) -> Result<Option<StepEvents>, CoreError> {
        if self.budget_exhausted() {
            if !self.truncated {
                warn!(
                    max_bars = self.bars.len(),
                    strategy = self.strategy.name(),
                    "bar budget exhausted, stopping run early"
                );
            }
            self.truncated = true;
            return Ok(None);
        }

        let index = self.bars.len();
        let bar = self.prepare(raw, index)?;
        let mut events = StepEvents {
            extreme: self.detector.update(&bar)?,
            ..StepEvents::default()
        };
        let atr = self.atr.update(&bar);
        self.bars.push(bar);

        self.slot = match std::mem::take(&mut self.slot) {
            Slot::Open(trade) if trade.entry_index < index => {
                self.evaluate_exit(trade, &bar, index, &mut events)
            }
            Slot::Pending(pending) if pending.armed_index() < index => {
                self.advance_pending(pending, &bar, index, atr, &mut events)
            }
            slot => slot,
        };

        let freed = events.closed.is_some() || events.discarded;
        if self.slot.is_idle() && !freed && index >= self.warmup {
            self.evaluate_entry(&bar, index, atr, &mut events);
        }

        Ok(Some(events))
    }

    /// Stop the run and hand back everything it produced.
    pub fn finish(self) -> RunResult {
        let result = RunResult {
            extremes: self.detector.into_log(),
            trades: self.ledger,
            open_trade: self.slot.into_trade(),
            bars_processed: self.bars.len(),
            completed: !self.truncated,
            discarded_entries: self.discarded_entries,
            entries_evaluated: self.entries_evaluated,
            entry_signals: self.entry_signals,
        };
        info!(
            strategy = self.strategy.name(),
            bars = result.bars_processed,
            extremes = result.extremes.len(),
            trades = result.trades.len(),
            discarded = result.discarded_entries,
            completed = result.completed,
            "backtest finished"
        );
        result
    }

    fn prepare(&self, raw: &Bar, index: usize) -> Result<Bar, CoreError> {
        raw.validate().map_err(|e| CoreError::bar(index, e))?;
        if let Some(previous) = self.bars.last() {
            raw.validate_after(previous)
                .map_err(|e| CoreError::bar(index, e))?;
        }
        match self.config.price_space {
            PriceSpace::Raw => Ok(*raw),
            PriceSpace::Log => {
                raw.validate_positive()
                    .map_err(|e| CoreError::bar(index, e))?;
                Ok(raw.to_log())
            }
        }
    }

    fn evaluate_exit(
        &mut self,
        mut trade: Trade,
        bar: &Bar,
        index: usize,
        events: &mut StepEvents,
    ) -> Slot {
        let Some(reason) = self.strategy.evaluate_exit(&trade, bar, index, &self.rules) else {
            return Slot::Open(trade);
        };
        trade.close(index, bar.timestamp, bar.close, reason);
        debug!(
            trade_id = %trade.id,
            direction = %trade.direction,
            index,
            exit_price = bar.close,
            reason = %reason,
            "trade closed"
        );
        events.closed = Some(trade.id);
        self.ledger.record(trade);
        Slot::Idle
    }

    fn advance_pending(
        &mut self,
        pending: PendingEntry,
        bar: &Bar,
        index: usize,
        atr: Option<f64>,
        events: &mut StepEvents,
    ) -> Slot {
        let Some(confirmation) = self.config.confirmation else {
            return Slot::Pending(pending);
        };
        let armed = pending.armed_index();
        let direction = pending.trade.direction;
        let moved = direction.favorable_move(pending.trade.entry_price, bar.close);

        if index - armed <= confirmation.within_bars && moved >= confirmation.distance {
            if let Some(levels) = pending.levels.resolve(direction, bar.close, atr) {
                let mut trade = pending.trade;
                let id = self.ids.next_trade_id();
                debug_assert_eq!(id, trade.id);
                trade.commit(
                    index,
                    bar.timestamp,
                    bar.close,
                    levels,
                    self.config.hold_period.deadline(index),
                );
                debug!(
                    trade_id = %id,
                    direction = %direction,
                    armed,
                    index,
                    entry_price = bar.close,
                    "pending entry confirmed"
                );
                events.opened = Some(id);
                return Slot::Open(trade);
            }
        }

        if index >= armed + confirmation.within_bars {
            debug!(armed, index, direction = %direction, "pending entry discarded");
            self.discarded_entries += 1;
            events.discarded = true;
            return Slot::Idle;
        }
        Slot::Pending(pending)
    }

    fn evaluate_entry(
        &mut self,
        bar: &Bar,
        index: usize,
        atr: Option<f64>,
        events: &mut StepEvents,
    ) {
        self.entries_evaluated += 1;
        let window = MarketWindow::new(&self.bars, index, atr, self.detector.log().snapshot(index));
        let Some(signal) = self.strategy.evaluate_entry(&window) else {
            return;
        };
        let Some(levels) = signal.levels.resolve(signal.direction, bar.close, atr) else {
            return;
        };
        self.entry_signals += 1;

        self.slot = if self.config.confirmation.is_some() {
            let trade = Trade::pending(
                self.ids.peek_trade_id(),
                signal.direction,
                index,
                bar.timestamp,
                bar.close,
                levels,
            );
            debug!(index, direction = %signal.direction, "entry armed");
            events.armed = true;
            Slot::Pending(PendingEntry {
                trade,
                levels: signal.levels,
            })
        } else {
            let id = self.ids.next_trade_id();
            let trade = Trade::open(
                id,
                signal.direction,
                index,
                bar.timestamp,
                bar.close,
                levels,
                self.config.hold_period.deadline(index),
            );
            debug!(
                trade_id = %id,
                direction = %signal.direction,
                index,
                entry_price = bar.close,
                stop_loss = levels.stop_loss,
                take_profit = levels.take_profit,
                "trade opened"
            );
            events.opened = Some(id);
            Slot::Open(trade)
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BarError, Direction, ExitReason, Levels};
    use crate::engine::{HoldPeriod, TieBreak};
    use crate::strategy::{EntrySignal, LevelSpec};
    use chrono::{NaiveDate, NaiveDateTime};

    fn ts(i: usize) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + chrono::Duration::hours(i as i64)
    }

    fn bars_at(closes: &[f64]) -> Vec<Bar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar::new(ts(i), c, c + 0.1, c - 0.1, c, 0.0))
            .collect()
    }

    /// Enters on every bar it is asked, always in the same direction.
    struct Always {
        direction: Direction,
        levels: LevelSpec,
    }

    impl Always {
        fn long(stop_loss: f64, take_profit: f64) -> Self {
            Self {
                direction: Direction::Long,
                levels: LevelSpec::Fixed {
                    stop_loss,
                    take_profit,
                },
            }
        }
    }

    impl Strategy for Always {
        fn name(&self) -> &str {
            "always"
        }

        fn evaluate_entry(&self, _window: &MarketWindow<'_>) -> Option<EntrySignal> {
            Some(EntrySignal {
                direction: self.direction,
                levels: self.levels,
            })
        }
    }

    /// Never enters.
    struct Never;

    impl Strategy for Never {
        fn name(&self) -> &str {
            "never"
        }

        fn evaluate_entry(&self, _window: &MarketWindow<'_>) -> Option<EntrySignal> {
            None
        }
    }

    fn config() -> EngineConfig {
        EngineConfig::new(100.0).with_atr_lookback(2)
    }

    #[test]
    fn opens_on_first_eligible_bar_and_exits_on_take_profit() {
        let bars = bars_at(&[10.0, 10.0, 11.0, 12.5, 12.0]);
        let strategy = Always::long(8.0, 12.0);
        let result = run_backtest(&bars, &config().with_lookback(1), &strategy).unwrap();

        let trade = &result.trades.as_slice()[0];
        assert_eq!(trade.entry_index, 1);
        assert_eq!(trade.exit_index, Some(3));
        assert_eq!(trade.exit_reason, Some(ExitReason::TakeProfit));
        assert_eq!(trade.trade_return(), Some(2.5));
        // Bar 3 freed the slot; the next entry comes on bar 4 and stays open.
        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.open_trade.as_ref().map(|t| t.entry_index), Some(4));
        assert!(result.completed);
    }

    #[test]
    fn no_exit_on_entry_bar() {
        // Take-profit below the entry close would trigger immediately if the
        // entry bar were checked.
        let bars = bars_at(&[10.0, 10.0, 10.0]);
        let strategy = Always::long(5.0, 9.0);
        let result = run_backtest(&bars, &config(), &strategy).unwrap();
        let first = &result.trades.as_slice()[0];
        assert_eq!((first.entry_index, first.exit_index), (0, Some(1)));
    }

    #[test]
    fn hold_period_zero_exits_next_bar() {
        let bars = bars_at(&[10.0, 10.0, 10.0, 10.0]);
        let strategy = Always::long(5.0, 20.0);
        let config = config().with_hold_period(HoldPeriod::Bars(0));
        let result = run_backtest(&bars, &config, &strategy).unwrap();
        let trades = result.trades.as_slice();
        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].exit_reason, Some(ExitReason::HoldExpired));
        assert_eq!((trades[0].entry_index, trades[0].exit_index), (0, Some(1)));
        assert_eq!((trades[1].entry_index, trades[1].exit_index), (2, Some(3)));
    }

    #[test]
    fn unbounded_hold_keeps_trade_open() {
        let bars = bars_at(&[10.0; 30]);
        let strategy = Always::long(5.0, 20.0);
        let result = run_backtest(&bars, &config(), &strategy).unwrap();
        assert!(result.trades.is_empty());
        assert!(result.open_trade.unwrap().is_open());
    }

    #[test]
    fn tie_break_is_configurable() {
        let bars = bars_at(&[10.0, 10.5]);
        let strategy = Always::long(11.0, 10.2);
        let sl = run_backtest(&bars, &config(), &strategy).unwrap();
        assert_eq!(
            sl.trades.as_slice()[0].exit_reason,
            Some(ExitReason::StopLoss)
        );
        let tp_first = config().with_tie_break(TieBreak::TakeProfitFirst);
        let tp = run_backtest(&bars, &tp_first, &strategy).unwrap();
        assert_eq!(
            tp.trades.as_slice()[0].exit_reason,
            Some(ExitReason::TakeProfit)
        );
    }

    #[test]
    fn confirmation_commits_after_follow_through() {
        let bars = bars_at(&[10.0, 10.2, 10.6, 10.6, 13.0]);
        let strategy = Always::long(9.0, 12.0);
        let config = config().with_confirmation(0.5, 3);
        let result = run_backtest(&bars, &config, &strategy).unwrap();

        let trade = &result.trades.as_slice()[0];
        assert_eq!(trade.armed_index, Some(0));
        assert_eq!(trade.entry_index, 2);
        assert_eq!(trade.entry_price, 10.6);
        assert_eq!(trade.exit_index, Some(4));
        assert_eq!(trade.id.0, 0);
        assert_eq!(result.discarded_entries, 0);
    }

    #[test]
    fn confirmation_discards_stale_entries() {
        let bars = bars_at(&[10.0, 10.1, 10.0, 10.1, 10.0, 10.0]);
        let strategy = Always::long(9.0, 12.0);
        let config = config().with_confirmation(0.5, 2);
        let result = run_backtest(&bars, &config, &strategy).unwrap();

        // Armed at 0, discarded at 2; armed at 3, discarded at 5.
        assert!(result.trades.is_empty());
        assert_eq!(result.discarded_entries, 2);
        assert!(result.open_trade.is_none());
    }

    #[test]
    fn discarded_entries_do_not_consume_ids() {
        let bars = bars_at(&[10.0, 10.0, 10.0, 11.0, 13.0]);
        let strategy = Always::long(9.0, 12.0);
        let config = config().with_confirmation(0.5, 1);
        let result = run_backtest(&bars, &config, &strategy).unwrap();
        // Armed 0, discarded 1; armed 2, committed 3, take-profit 4.
        assert_eq!(result.discarded_entries, 1);
        let trade = &result.trades.as_slice()[0];
        assert_eq!(trade.id.0, 0);
        assert_eq!(trade.entry_index, 3);
    }

    #[test]
    fn atr_levels_wait_for_warmup() {
        let bars = bars_at(&[10.0; 6]);
        let strategy = Always {
            direction: Direction::Short,
            levels: LevelSpec::AtrMultiple {
                tp_mult: 1.0,
                sl_mult: 1.0,
            },
        };
        let config = config().with_atr_lookback(3);
        let result = run_backtest(&bars, &config, &strategy).unwrap();
        let open = result.open_trade.unwrap();
        assert_eq!(open.entry_index, 3);
        // Every TR is 0.2 here, so ATR(3) at bar 3 is 0.2 as well.
        let Levels {
            stop_loss,
            take_profit,
        } = open.levels();
        assert!((stop_loss - 10.2).abs() < 1e-9);
        assert!((take_profit - 9.8).abs() < 1e-9);
        assert_eq!(result.entries_evaluated, 4);
        assert_eq!(result.entry_signals, 1);
    }

    #[test]
    fn budget_stops_run_early() {
        let bars = bars_at(&[10.0; 10]);
        let result = run_backtest(&bars, &config().with_max_bars(4), &Never).unwrap();
        assert_eq!(result.bars_processed, 4);
        assert!(!result.completed);

        let exact = run_backtest(&bars, &config().with_max_bars(10), &Never).unwrap();
        assert!(exact.completed);
    }

    #[test]
    fn invalid_bar_aborts_run() {
        let mut bars = bars_at(&[10.0; 5]);
        bars[3].low = f64::NAN;
        let err = run_backtest(&bars, &config(), &Never).unwrap_err();
        assert!(matches!(err, CoreError::InvalidBar { index: 3, .. }));

        let mut bars = bars_at(&[10.0; 5]);
        bars[2].timestamp = bars[1].timestamp;
        let err = run_backtest(&bars, &config(), &Never).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidBar {
                index: 2,
                source: BarError::NonIncreasingTimestamp { .. }
            }
        ));
    }

    #[test]
    fn log_space_rejects_non_positive_prices() {
        let mut bars = bars_at(&[10.0; 3]);
        bars[1].low = 0.0;
        let config = config().with_price_space(PriceSpace::Log);
        assert!(matches!(
            run_backtest(&bars, &config, &Never),
            Err(CoreError::InvalidBar {
                index: 1,
                source: BarError::NonPositivePrice { .. }
            })
        ));
    }

    #[test]
    fn log_space_prices_trades_in_log_units() {
        let bars = bars_at(&[100.0, 100.0, 120.0]);
        let strategy = Always::long(0.0, 4.7);
        let config = config().with_price_space(PriceSpace::Log);
        let result = run_backtest(&bars, &config, &strategy).unwrap();
        let trade = &result.trades.as_slice()[0];
        assert!((trade.entry_price - 100.0_f64.ln()).abs() < 1e-12);
        assert!((trade.trade_return().unwrap() - (1.2_f64).ln()).abs() < 1e-12);
    }

    #[test]
    fn invalid_config_fails_before_bars() {
        let config = EngineConfig::new(-1.0);
        assert!(matches!(
            BacktestEngine::new(config, &Never),
            Err(CoreError::InvalidConfiguration(_))
        ));
    }
}
