//! Performance summary: pure aggregation over a trade ledger.
//!
//! Every metric is a pure function of the per-trade returns (and, for
//! `avg_bars_held`, the trades themselves). Returns are price differences in
//! the run's price space, so they add up without compounding.
//!
//! Degenerate inputs (no trades, no losers, zero variance) produce sentinel
//! values, never NaN and never a panic: sweeps call this in a tight loop.

use serde::{Deserialize, Serialize};
use swinglab_core::domain::Trade;
use swinglab_core::engine::TradeLedger;

/// Aggregate statistics for a single backtest run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub trade_count: usize,
    pub win_count: usize,
    pub loss_count: usize,
    pub total_return: f64,
    pub win_rate: f64,
    /// Mean return of winning trades (positive), 0 without winners.
    pub avg_win: f64,
    /// Mean return of losing trades (negative), 0 without losers.
    pub avg_loss: f64,
    pub reward_risk: f64,
    pub expectancy: f64,
    pub sharpe: f64,
    pub profit_factor: f64,
    /// Deepest peak-to-trough fall of the cumulative return, as a value <= 0.
    pub max_drawdown: f64,
    pub max_consecutive_wins: usize,
    /// Longest run of trades with a return <= 0. Unlike `loss_count`, a
    /// zero-return trade extends this run.
    pub max_consecutive_non_wins: usize,
    pub avg_bars_held: f64,
}

impl PerformanceSummary {
    /// Summarize closed trades. Trades without an exit are ignored.
    pub fn from_trades(trades: &[Trade]) -> Self {
        let closed: Vec<&Trade> = trades.iter().filter(|t| t.is_closed()).collect();
        let returns: Vec<f64> = closed.iter().filter_map(|t| t.trade_return()).collect();
        let bars_held: Vec<f64> = closed
            .iter()
            .filter_map(|t| t.bars_held())
            .map(|b| b as f64)
            .collect();

        let wr = win_rate(&returns);
        let rr = reward_risk(&returns);
        Self {
            trade_count: returns.len(),
            win_count: returns.iter().filter(|&&r| r > 0.0).count(),
            loss_count: returns.iter().filter(|&&r| r < 0.0).count(),
            total_return: finite_or_zero(returns.iter().sum()),
            win_rate: wr,
            avg_win: mean_where(&returns, |r| r > 0.0),
            avg_loss: mean_where(&returns, |r| r < 0.0),
            reward_risk: rr,
            expectancy: expectancy(&returns),
            sharpe: sharpe_ratio(&returns),
            profit_factor: profit_factor(&returns),
            max_drawdown: max_drawdown(&returns),
            max_consecutive_wins: max_consecutive(&returns, true),
            max_consecutive_non_wins: max_consecutive(&returns, false),
            avg_bars_held: finite_or_zero(mean_f64(&bars_held)),
        }
    }

    pub fn from_ledger(ledger: &TradeLedger) -> Self {
        Self::from_trades(ledger.as_slice())
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Fraction of trades with a strictly positive return. 0 when empty.
pub fn win_rate(returns: &[f64]) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    returns.iter().filter(|&&r| r > 0.0).count() as f64 / returns.len() as f64
}

/// `mean(win) / |mean(loss)|`.
///
/// Returns 0.0 when there are no winners or no losers.
pub fn reward_risk(returns: &[f64]) -> f64 {
    let avg_win = mean_where(returns, |r| r > 0.0);
    let avg_loss = mean_where(returns, |r| r < 0.0);
    if avg_win <= 0.0 || avg_loss >= 0.0 {
        return 0.0;
    }
    finite_or_zero(avg_win / avg_loss.abs())
}

/// `win_rate · reward_risk − (1 − win_rate)`, in units of the average loss.
///
/// Returns 0.0 for an empty ledger.
pub fn expectancy(returns: &[f64]) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    let wr = win_rate(returns);
    finite_or_zero(wr * reward_risk(returns) - (1.0 - wr))
}

/// Per-trade Sharpe-like ratio: mean(return) / std(return).
///
/// Population standard deviation, no annualization. Returns 0.0 if the
/// deviation is zero or there are fewer than 2 trades.
pub fn sharpe_ratio(returns: &[f64]) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let std = std_dev(returns);
    if std < 1e-15 {
        return 0.0;
    }
    finite_or_zero(mean_f64(returns) / std)
}

/// Profit factor: gross profits / gross losses.
///
/// Capped at 100.0 for edge cases (all winners, zero losses).
pub fn profit_factor(returns: &[f64]) -> f64 {
    let gross_profit: f64 = returns.iter().filter(|&&r| r > 0.0).sum();
    let gross_loss: f64 = returns.iter().filter(|&&r| r < 0.0).map(|r| r.abs()).sum();

    if gross_loss < 1e-10 {
        return if gross_profit > 0.0 { 100.0 } else { 0.0 };
    }
    finite_or_zero((gross_profit / gross_loss).min(100.0))
}

/// Largest drop of the running sum of returns below its previous peak.
///
/// The curve starts at 0 before the first trade. Returns 0.0 if the curve
/// never falls, otherwise a negative value.
pub fn max_drawdown(returns: &[f64]) -> f64 {
    let mut equity = 0.0_f64;
    let mut peak = 0.0_f64;
    let mut max_dd = 0.0_f64;
    for &r in returns {
        equity += r;
        peak = peak.max(equity);
        max_dd = max_dd.min(equity - peak);
    }
    finite_or_zero(max_dd)
}

/// Longest run of winning (`winners = true`) or non-winning trades.
pub fn max_consecutive(returns: &[f64], winners: bool) -> usize {
    let mut max_streak = 0;
    let mut current = 0;
    for &r in returns {
        if (r > 0.0) == winners {
            current += 1;
            max_streak = max_streak.max(current);
        } else {
            current = 0;
        }
    }
    max_streak
}

// ─── Helpers ────────────────────────────────────────────────────────

fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn mean_where(values: &[f64], keep: impl Fn(f64) -> bool) -> f64 {
    let kept: Vec<f64> = values.iter().copied().filter(|&v| keep(v)).collect();
    finite_or_zero(mean_f64(&kept))
}

/// Population standard deviation.
fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use swinglab_core::domain::{Direction, ExitReason, Levels, TradeId};

    fn closed(id: u64, direction: Direction, entry: f64, exit: f64, bars: usize) -> Trade {
        let ts = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let entry_index = id as usize * 100;
        let mut trade = Trade::open(
            TradeId(id),
            direction,
            entry_index,
            ts,
            entry,
            Levels::new(0.0, 1_000.0),
            None,
        );
        trade.close(
            entry_index + bars,
            ts + chrono::Duration::hours(bars as i64),
            exit,
            ExitReason::HoldExpired,
        );
        trade
    }

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-10,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn empty_ledger_is_all_sentinels() {
        let s = PerformanceSummary::from_trades(&[]);
        assert_eq!(s, PerformanceSummary::default());
        assert_eq!(s.win_rate, 0.0);
        assert_eq!(s.total_return, 0.0);
        assert_eq!(s.expectancy, 0.0);
    }

    #[test]
    fn mixed_ledger() {
        // Returns: +2, -1, +4, -1
        let trades = vec![
            closed(0, Direction::Long, 10.0, 12.0, 3),
            closed(1, Direction::Short, 10.0, 11.0, 5),
            closed(2, Direction::Long, 20.0, 24.0, 2),
            closed(3, Direction::Long, 8.0, 7.0, 6),
        ];
        let s = PerformanceSummary::from_trades(&trades);

        assert_eq!(s.trade_count, 4);
        assert_eq!((s.win_count, s.loss_count), (2, 2));
        assert_approx(s.total_return, 4.0);
        assert_approx(s.win_rate, 0.5);
        assert_approx(s.avg_win, 3.0);
        assert_approx(s.avg_loss, -1.0);
        assert_approx(s.reward_risk, 3.0);
        assert_approx(s.expectancy, 0.5 * 3.0 - 0.5);
        assert_approx(s.profit_factor, 3.0);
        assert_approx(s.max_drawdown, -1.0);
        assert_eq!(s.max_consecutive_non_wins, 1);
        assert_approx(s.avg_bars_held, 4.0);

        // mean 1, population std sqrt(((1)+(4)+(9)+(4))/4) = sqrt(4.5)
        assert_approx(s.sharpe, 1.0 / 4.5_f64.sqrt());
    }

    #[test]
    fn no_losers_gives_zero_reward_risk() {
        let returns = [1.0, 2.0, 3.0];
        assert_eq!(reward_risk(&returns), 0.0);
        assert_eq!(expectancy(&returns), 0.0);
        assert_eq!(profit_factor(&returns), 100.0);
        assert_eq!(max_drawdown(&returns), 0.0);
    }

    #[test]
    fn no_winners_gives_zero_reward_risk() {
        let returns = [-1.0, -2.0];
        assert_eq!(reward_risk(&returns), 0.0);
        assert_eq!(win_rate(&returns), 0.0);
        assert_eq!(expectancy(&returns), -1.0);
        assert_eq!(profit_factor(&returns), 0.0);
        assert_eq!(max_drawdown(&returns), -3.0);
        assert_eq!(max_consecutive(&returns, false), 2);
    }

    #[test]
    fn constant_returns_have_zero_sharpe() {
        assert_eq!(sharpe_ratio(&[0.5, 0.5, 0.5]), 0.0);
        assert_eq!(sharpe_ratio(&[0.5]), 0.0);
        assert_eq!(sharpe_ratio(&[]), 0.0);
    }

    #[test]
    fn zero_return_trade_is_neither_win_nor_loss() {
        let trades = vec![closed(0, Direction::Long, 10.0, 10.0, 1)];
        let s = PerformanceSummary::from_trades(&trades);
        assert_eq!(s.trade_count, 1);
        assert_eq!((s.win_count, s.loss_count), (0, 0));
        assert_eq!(s.win_rate, 0.0);
        assert_eq!(s.expectancy, -1.0);
        assert_eq!(s.max_consecutive_non_wins, 1);
    }

    #[test]
    fn flat_trades_join_the_non_winning_run() {
        let trades = vec![
            closed(0, Direction::Long, 10.0, 11.0, 1),
            closed(1, Direction::Long, 10.0, 9.0, 1),
            closed(2, Direction::Short, 10.0, 10.0, 1),
            closed(3, Direction::Long, 10.0, 9.5, 1),
            closed(4, Direction::Long, 10.0, 12.0, 1),
        ];
        let s = PerformanceSummary::from_trades(&trades);
        assert_eq!(s.loss_count, 2);
        assert_eq!(s.max_consecutive_non_wins, 3);
        assert_eq!(s.max_consecutive_wins, 1);
    }

    #[test]
    fn drawdown_measures_from_running_peak() {
        assert_approx(max_drawdown(&[3.0, -1.0, -2.5, 1.0, 4.0, -0.5]), -3.5);
    }

    #[test]
    fn open_trades_are_ignored() {
        let ts = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let open = Trade::open(
            TradeId(9),
            Direction::Long,
            0,
            ts,
            10.0,
            Levels::new(9.0, 11.0),
            None,
        );
        let s = PerformanceSummary::from_trades(&[open]);
        assert_eq!(s.trade_count, 0);
    }

    #[test]
    fn summary_never_contains_nan() {
        let trades = vec![closed(0, Direction::Long, 1e308, -1e308, 1)];
        let s = PerformanceSummary::from_trades(&trades);
        for value in [
            s.total_return,
            s.win_rate,
            s.avg_win,
            s.avg_loss,
            s.reward_risk,
            s.expectancy,
            s.sharpe,
            s.profit_factor,
            s.max_drawdown,
            s.avg_bars_held,
        ] {
            assert!(value.is_finite());
        }
    }
}
