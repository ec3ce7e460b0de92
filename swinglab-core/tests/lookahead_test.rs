//! Look-ahead contamination tests.
//!
//! Invariant: nothing decided at bar t may depend on bars t+1 or later.
//!
//! Method: run on a truncated series (bars 0..n) and on the full series.
//! Everything the truncated run produced must be identical to what the full
//! run had produced by bar n-1. Any difference means future data leaked into
//! a past decision.

use chrono::NaiveDate;
use swinglab_core::domain::{Bar, Direction, Trade, TradeId};
use swinglab_core::engine::{run_backtest, EngineConfig, HoldPeriod, RunResult};
use swinglab_core::extremes::detect_extremes;
use swinglab_core::indicators::{Atr, Indicator, RollingAtr};
use swinglab_core::strategy::{
    create_strategy, EntrySignal, LevelSpec, MarketWindow, Strategy, StrategyConfig,
};

const CUTS: [usize; 5] = [40, 97, 180, 333, 499];

/// Deterministic random walk with enough swing to confirm extremes at sigma 1.5.
fn make_test_bars(n: usize) -> Vec<Bar> {
    let base = NaiveDate::from_ymd_opt(2023, 6, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let mut bars = Vec::with_capacity(n);
    let mut price = 100.0;
    let mut seed: u64 = 0x5eed;

    for i in 0..n {
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        let change = ((seed >> 33) % 200) as f64 / 100.0 - 1.0; // -1.0 to +0.99
        let open = price;
        price = (price + change).max(20.0);
        let close = price;
        let spread = 0.2 + ((seed >> 20) % 50) as f64 / 100.0;
        bars.push(Bar::new(
            base + chrono::Duration::hours(i as i64),
            open,
            open.max(close) + spread,
            open.min(close) - spread,
            close,
            1_000.0 + i as f64,
        ));
    }
    bars
}

fn strategies() -> Vec<Box<dyn Strategy>> {
    [
        StrategyConfig::new("extreme_reversal")
            .with_param("tp_mult", 2.0)
            .with_param("sl_mult", 1.5),
        StrategyConfig::new("trend_pullback")
            .with_param("alpha", 0.5)
            .with_param("trend_len", 2.0),
        StrategyConfig::new("zone_rejection")
            .with_param("lookback", 60.0)
            .with_param("zone_size", 1.0)
            .with_param("min_touches", 2.0),
    ]
    .iter()
    .map(|config| create_strategy(config).unwrap())
    .collect()
}

fn configs() -> Vec<EngineConfig> {
    vec![
        EngineConfig::new(1.5),
        EngineConfig::new(1.5).with_hold_period(HoldPeriod::Bars(5)),
        EngineConfig::new(2.0)
            .with_lookback(20)
            .with_hold_period(HoldPeriod::Bars(12))
            .with_confirmation(0.3, 3),
    ]
}

type EntryFields = (TradeId, Direction, usize, f64, f64, f64, Option<usize>);

fn entry_fields(trade: &Trade) -> EntryFields {
    (
        trade.id,
        trade.direction,
        trade.entry_index,
        trade.entry_price,
        trade.stop_loss,
        trade.take_profit,
        trade.hold_deadline,
    )
}

fn assert_prefix(truncated: &RunResult, full: &RunResult, n: usize, label: &str) {
    assert_eq!(
        truncated.extremes.as_slice(),
        full.extremes.snapshot(n - 1).as_slice(),
        "{label}: extremes differ at cut {n}"
    );

    let closed_by_cut: Vec<&Trade> = full
        .trades
        .iter()
        .take_while(|t| t.exit_index.is_some_and(|exit| exit < n))
        .collect();
    let truncated_trades: Vec<&Trade> = truncated.trades.iter().collect();
    assert_eq!(
        truncated_trades, closed_by_cut,
        "{label}: closed trades differ at cut {n}"
    );

    if let Some(open) = truncated.open_trade.as_ref().filter(|t| t.is_open()) {
        let later = full
            .trades
            .iter()
            .chain(full.open_trade.iter())
            .find(|t| t.id == open.id)
            .unwrap_or_else(|| panic!("{label}: open trade {} vanished in full run", open.id));
        assert_eq!(
            entry_fields(open),
            entry_fields(later),
            "{label}: open trade differs at cut {n}"
        );
        assert!(later.exit_index.map_or(true, |exit| exit >= n));
    }
}

#[test]
fn detector_prefix_is_stable() {
    let bars = make_test_bars(500);
    let full = detect_extremes(&bars, 1.5).unwrap();
    assert!(full.len() > 10);

    for n in CUTS {
        let truncated = detect_extremes(&bars[..n], 1.5).unwrap();
        assert_eq!(
            truncated.as_slice(),
            full.snapshot(n - 1).as_slice(),
            "detector leaked future data at cut {n}"
        );
    }
}

#[test]
fn rolling_atr_prefix_is_stable() {
    let bars = make_test_bars(500);
    let full = Atr::new(14).compute(&bars);

    let mut rolling = RollingAtr::new(14);
    for (i, bar) in bars.iter().enumerate() {
        let streamed = rolling.update(bar);
        match streamed {
            None => assert!(full[i].is_nan(), "bar {i}: batch has value during warmup"),
            Some(value) => assert_eq!(value, full[i], "bar {i}: rolling differs from batch"),
        }
    }

    for n in CUTS {
        let truncated = Atr::new(14).compute(&bars[..n]);
        for (i, (a, b)) in truncated.iter().zip(&full[..n]).enumerate() {
            assert!(
                (a.is_nan() && b.is_nan()) || a == b,
                "ATR leaked future data at bar {i} (cut {n})"
            );
        }
    }
}

#[test]
fn engine_prefix_is_stable_for_every_strategy() {
    let bars = make_test_bars(500);

    for strategy in strategies() {
        for (c, config) in configs().iter().enumerate() {
            let full = run_backtest(&bars, config, strategy.as_ref()).unwrap();
            let label = format!("{}/config {c}", strategy.name());
            for n in CUTS {
                let truncated = run_backtest(&bars[..n], config, strategy.as_ref()).unwrap();
                assert_prefix(&truncated, &full, n, &label);
            }
        }
    }
}

#[test]
fn bar_budget_equals_truncation() {
    let bars = make_test_bars(500);
    let strategy = create_strategy(&StrategyConfig::new("extreme_reversal")).unwrap();

    for n in CUTS {
        let config = EngineConfig::new(1.5).with_max_bars(n);
        let budgeted = run_backtest(&bars, &config, strategy.as_ref()).unwrap();
        let truncated = run_backtest(&bars[..n], &EngineConfig::new(1.5), strategy.as_ref()).unwrap();

        assert!(!budgeted.completed);
        assert!(truncated.completed);
        assert_eq!(budgeted.bars_processed, n);
        assert_eq!(budgeted.extremes, truncated.extremes);
        assert_eq!(budgeted.trades, truncated.trades);
        assert_eq!(budgeted.open_trade, truncated.open_trade);
    }
}

/// Wraps a strategy and checks, on every call, that the window it is handed
/// ends at the current bar.
struct SnapshotRecorder<'a> {
    inner: &'a dyn Strategy,
}

impl Strategy for SnapshotRecorder<'_> {
    fn name(&self) -> &str {
        "snapshot_recorder"
    }

    fn evaluate_entry(&self, window: &MarketWindow<'_>) -> Option<EntrySignal> {
        assert_eq!(window.bars.len(), window.index + 1);
        assert!(window
            .extremes
            .iter()
            .all(|e| e.confirm_index <= window.index && e.index < window.index));
        assert!(window.history_back(usize::MAX).all(|b| b.timestamp < window.bar().timestamp));
        self.inner.evaluate_entry(window).or_else(|| {
            // Keep the slot busy now and then so exits get exercised too.
            (window.index % 17 == 0).then(|| {
                EntrySignal::long(LevelSpec::AtrMultiple {
                    tp_mult: 1.0,
                    sl_mult: 1.0,
                })
            })
        })
    }
}

#[test]
fn strategies_never_see_past_the_current_bar() {
    let bars = make_test_bars(500);
    for inner in strategies() {
        let recorder = SnapshotRecorder {
            inner: inner.as_ref(),
        };
        let result = run_backtest(&bars, &EngineConfig::new(1.5), &recorder).unwrap();
        assert!(result.entries_evaluated > 0);
    }
}
