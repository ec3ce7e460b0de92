//! Reporting and export: JSON, CSV, and Markdown artifact generation.
//!
//! - **JSON**: full round-trip serialization with schema versioning
//! - **CSV**: trade ledger, extreme log, sweep table, and raw bars
//! - **Markdown**: human-readable single-run report
//!
//! Persisted results carry a `schema_version`; newer versions are rejected on
//! load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use swinglab_core::domain::{Bar, Extreme, Trade, TradeStatus};

use crate::runner::{BacktestResult, SCHEMA_VERSION};
use crate::sweep::SweepResults;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ─── JSON export ────────────────────────────────────────────────────

pub fn export_json(result: &BacktestResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize BacktestResult to JSON")
}

/// Deserialize a `BacktestResult`, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<BacktestResult> {
    let result: BacktestResult =
        serde_json::from_str(json).context("failed to deserialize BacktestResult from JSON")?;
    if result.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            result.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(result)
}

// ─── CSV export ─────────────────────────────────────────────────────

fn opt<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String> {
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Trade ledger as CSV, one row per trade. Open or pending trades leave the
/// exit columns empty.
pub fn export_trades_csv(trades: &[Trade]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "id",
        "direction",
        "status",
        "armed_index",
        "entry_index",
        "entry_timestamp",
        "entry_price",
        "stop_loss",
        "take_profit",
        "hold_deadline",
        "exit_index",
        "exit_timestamp",
        "exit_price",
        "exit_reason",
        "return",
        "bars_held",
    ])?;

    for t in trades {
        let status = match t.status {
            TradeStatus::Pending => "pending",
            TradeStatus::Open => "open",
            TradeStatus::Closed => "closed",
        };
        wtr.write_record([
            t.id.to_string(),
            t.direction.to_string(),
            status.to_string(),
            opt(t.armed_index),
            t.entry_index.to_string(),
            t.entry_timestamp.format(TIMESTAMP_FORMAT).to_string(),
            t.entry_price.to_string(),
            t.stop_loss.to_string(),
            t.take_profit.to_string(),
            opt(t.hold_deadline),
            opt(t.exit_index),
            opt(t.exit_timestamp.map(|ts| ts.format(TIMESTAMP_FORMAT))),
            opt(t.exit_price),
            opt(t.exit_reason),
            opt(t.trade_return()),
            opt(t.bars_held()),
        ])?;
    }
    finish(wtr)
}

/// Extreme log as CSV: `index, confirm_index, timestamp, price, kind`.
pub fn export_extremes_csv(extremes: &[Extreme]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["index", "confirm_index", "timestamp", "price", "kind"])?;
    for e in extremes {
        wtr.write_record([
            e.index.to_string(),
            e.confirm_index.to_string(),
            e.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            e.price.to_string(),
            e.kind.to_string(),
        ])?;
    }
    finish(wtr)
}

/// Bars in the layout the CSV loader reads back.
pub fn export_bars_csv(bars: &[Bar]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["timestamp", "open", "high", "low", "close", "volume"])?;
    for b in bars {
        wtr.write_record([
            b.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            b.open.to_string(),
            b.high.to_string(),
            b.low.to_string(),
            b.close.to_string(),
            b.volume.to_string(),
        ])?;
    }
    finish(wtr)
}

/// Sweep table, best first, one column per swept parameter.
pub fn export_sweep_csv(results: &SweepResults) -> Result<String> {
    let ranked = results.ranked();
    let param_keys: Vec<String> = ranked
        .first()
        .map(|row| row.params.iter().map(|(k, _)| k.clone()).collect())
        .unwrap_or_default();

    let mut wtr = csv::Writer::from_writer(vec![]);
    let mut header = vec!["rank".to_string()];
    header.extend(param_keys);
    header.push("run_id".to_string());
    header.push(format!("fitness_{}", results.metric.name()));
    header.extend(
        [
            "completed",
            "trade_count",
            "total_return",
            "win_rate",
            "expectancy",
            "sharpe",
            "profit_factor",
            "max_drawdown",
        ]
        .map(String::from),
    );
    wtr.write_record(&header)?;

    for (rank, row) in ranked.iter().enumerate() {
        let s = &row.summary;
        let mut record = vec![(rank + 1).to_string()];
        record.extend(row.params.iter().map(|(_, v)| v.to_string()));
        record.extend([
            row.run_id.clone(),
            row.fitness.to_string(),
            row.completed.to_string(),
            s.trade_count.to_string(),
            s.total_return.to_string(),
            s.win_rate.to_string(),
            s.expectancy.to_string(),
            s.sharpe.to_string(),
            s.profit_factor.to_string(),
            s.max_drawdown.to_string(),
        ]);
        wtr.write_record(&record)?;
    }
    finish(wtr)
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the full artifact set for a single backtest run.
///
/// Creates `{symbol}_{run id prefix}/` under `output_dir` containing:
/// - `result.json`: the full `BacktestResult`
/// - `trades.csv`: closed trades, then the trade left in the slot if any
/// - `extremes.csv`: every confirmed extreme
/// - `summary.md`: the Markdown report
///
/// Re-running the same config overwrites the same directory.
pub fn save_artifacts(result: &BacktestResult, output_dir: &Path) -> Result<PathBuf> {
    let prefix: String = result.run_id.chars().take(12).collect();
    let run_dir = output_dir.join(format!("{}_{}", result.symbol, prefix));
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    let write = |name: &str, contents: String| -> Result<()> {
        let path = run_dir.join(name);
        std::fs::write(&path, contents)
            .with_context(|| format!("failed to write {}", path.display()))
    };

    write("result.json", export_json(result)?)?;

    let mut trades: Vec<Trade> = result.run.trades.as_slice().to_vec();
    trades.extend(result.run.open_trade.iter().cloned());
    write("trades.csv", export_trades_csv(&trades)?)?;
    write("extremes.csv", export_extremes_csv(result.run.extremes.as_slice())?)?;
    write("summary.md", generate_report(result))?;

    Ok(run_dir)
}

/// Load a `BacktestResult` from an artifact directory's `result.json`.
pub fn load_artifacts(dir: &Path) -> Result<BacktestResult> {
    let path = dir.join("result.json");
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json)
}

// ─── Markdown report ────────────────────────────────────────────────

/// Generate a Markdown report for a single backtest run.
pub fn generate_report(result: &BacktestResult) -> String {
    let mut md = String::with_capacity(2048);
    let engine = &result.engine;

    md.push_str("# Backtest Report\n\n");

    md.push_str("## Run\n\n");
    md.push_str("| Field | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Symbol | {} |\n", result.symbol));
    if let (Some(start), Some(end)) = (result.start, result.end) {
        md.push_str(&format!("| Period | {start} to {end} |\n"));
    }
    md.push_str(&format!(
        "| Bars | {} ({} processed) |\n",
        result.bar_count, result.run.bars_processed
    ));
    if !result.run.completed {
        md.push_str("| Status | **INCOMPLETE** (bar budget reached) |\n");
    }
    md.push_str(&format!("| Run ID | {} |\n", result.run_id));
    md.push_str(&format!("| Dataset Hash | {} |\n", result.dataset_hash));
    if result.has_synthetic {
        md.push_str("| Data | **SYNTHETIC** |\n");
    }
    md.push('\n');

    md.push_str("## Configuration\n\n");
    md.push_str("| Setting | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Strategy | {} |\n", result.strategy.strategy_type));
    for (name, value) in &result.strategy.params {
        md.push_str(&format!("| {name} | {value} |\n"));
    }
    md.push_str(&format!(
        "| Sigma | {} ({:?} mode) |\n",
        engine.sigma, result.sigma_mode
    ));
    md.push_str(&format!("| Price Space | {:?} |\n", engine.price_space));
    md.push_str(&format!("| Lookback | {} |\n", engine.lookback));
    md.push_str(&format!("| Hold Period | {:?} |\n", engine.hold_period));
    md.push_str(&format!("| ATR Lookback | {} |\n", engine.atr_lookback));
    md.push_str(&format!("| Tie Break | {:?} |\n", engine.tie_break));
    if let Some(c) = &engine.confirmation {
        md.push_str(&format!(
            "| Confirmation | {} within {} bars |\n",
            c.distance, c.within_bars
        ));
    }
    md.push('\n');

    let s = &result.summary;
    md.push_str("## Performance Summary\n\n");
    md.push_str("| Metric | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Trades | {} |\n", s.trade_count));
    md.push_str(&format!(
        "| Wins / Losses | {} / {} |\n",
        s.win_count, s.loss_count
    ));
    md.push_str(&format!("| Total Return | {:.6} |\n", s.total_return));
    md.push_str(&format!("| Win Rate | {:.1}% |\n", s.win_rate * 100.0));
    md.push_str(&format!("| Avg Win | {:.6} |\n", s.avg_win));
    md.push_str(&format!("| Avg Loss | {:.6} |\n", s.avg_loss));
    md.push_str(&format!("| Reward / Risk | {:.3} |\n", s.reward_risk));
    md.push_str(&format!("| Expectancy | {:.3} |\n", s.expectancy));
    md.push_str(&format!("| Sharpe (per trade) | {:.3} |\n", s.sharpe));
    md.push_str(&format!("| Profit Factor | {:.2} |\n", s.profit_factor));
    md.push_str(&format!("| Max Drawdown | {:.6} |\n", s.max_drawdown));
    md.push_str(&format!(
        "| Max Consecutive Wins | {} |\n",
        s.max_consecutive_wins
    ));
    md.push_str(&format!(
        "| Max Consecutive Non-Wins | {} |\n",
        s.max_consecutive_non_wins
    ));
    md.push_str(&format!("| Avg Bars Held | {:.1} |\n", s.avg_bars_held));
    md.push('\n');

    let run = &result.run;
    md.push_str("## Activity\n\n");
    md.push_str(&format!("- Extremes confirmed: {}\n", run.extremes.len()));
    md.push_str(&format!("- Entry evaluations: {}\n", run.entries_evaluated));
    md.push_str(&format!("- Entry signals: {}\n", run.entry_signals));
    if engine.confirmation.is_some() {
        md.push_str(&format!(
            "- Armed entries discarded: {}\n",
            run.discarded_entries
        ));
    }
    if let Some(open) = &run.open_trade {
        md.push_str(&format!(
            "- Trade {} still {:?} at the last bar ({} from bar {})\n",
            open.id, open.status, open.direction, open.entry_index
        ));
    }

    md
}
