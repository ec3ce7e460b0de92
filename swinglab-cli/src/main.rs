//! SwingLab CLI: detect, run, sweep, and synthetic data commands.
//!
//! Commands:
//! - `detect`: print or save the confirmed extremes of a CSV bar file
//! - `run`: execute a backtest from a TOML config file and save artifacts
//! - `sweep`: run a parameter grid over one config and rank the results
//! - `synth`: write a seeded random-walk bar file
//! - `monte-carlo`: risk of ruin from a backtest's (or a given) win rate and
//!   reward/risk
//!
//! Logging goes through `tracing`; set `RUST_LOG=debug` to see every trade.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use swinglab_core::detect_extremes;
use swinglab_runner::data_loader::load_csv;
use swinglab_runner::export::{
    export_bars_csv, export_extremes_csv, export_sweep_csv, save_artifacts,
};
use swinglab_runner::{
    generate_synthetic, load_data, run_from_config, simulate, BacktestResult, FitnessMetric,
    MonteCarloConfig, MonteCarloResult, ParamAxis, ParamGrid, ParamSweep, RunConfig,
    SweepResults, SyntheticSpec,
};

#[derive(Parser)]
#[command(
    name = "swinglab",
    about = "SwingLab CLI: swing-extreme detection and single-trade backtesting"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect confirmed swing extremes in a CSV bar file.
    Detect {
        /// CSV with timestamp,open,high,low,close[,volume].
        #[arg(long)]
        data: PathBuf,

        /// Minimum reversal, in price units (log units with --log).
        #[arg(long)]
        sigma: f64,

        /// Detect on natural-log prices.
        #[arg(long, default_value_t = false)]
        log: bool,

        /// Write extremes CSV here instead of printing.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Execute a backtest from a TOML config file.
    Run {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,

        /// Override a numeric setting, e.g. `--set strategy.tp_mult=2`.
        #[arg(long = "set", value_name = "KEY=VALUE")]
        overrides: Vec<String>,

        /// Output directory for artifacts.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,

        /// Print the summary only.
        #[arg(long, default_value_t = false)]
        no_artifacts: bool,
    },
    /// Run every combination of the given axes and rank by a fitness metric.
    Sweep {
        /// Path to the base TOML config file.
        #[arg(long)]
        config: PathBuf,

        /// Swept parameter, e.g. `--axis strategy.tp_mult=1,2,3`. Repeatable.
        #[arg(long = "axis", value_name = "KEY=V1,V2,...", required = true)]
        axes: Vec<String>,

        /// Ranking metric: sharpe, total_return, expectancy, win_rate,
        /// profit_factor, max_drawdown.
        #[arg(long, default_value = "sharpe")]
        metric: FitnessMetric,

        /// Run on one thread.
        #[arg(long, default_value_t = false)]
        sequential: bool,

        /// Rows to print.
        #[arg(long, default_value_t = 10)]
        top: usize,

        /// Write the ranked table as CSV.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Write a seeded random-walk bar file.
    Synth {
        #[arg(long, default_value_t = 1000)]
        bars: usize,

        #[arg(long, default_value_t = 42)]
        seed: u64,

        #[arg(long, default_value_t = 100.0)]
        start_price: f64,

        /// Maximum absolute log return per bar.
        #[arg(long, default_value_t = 0.01)]
        volatility: f64,

        #[arg(long, default_value_t = 60)]
        interval_minutes: i64,

        #[arg(long)]
        output: PathBuf,
    },
    /// Simulate equity paths to estimate the risk of ruin.
    MonteCarlo {
        /// Backtest this config and use its win rate and reward/risk.
        #[arg(long, conflicts_with_all = ["win_rate", "reward_risk"])]
        config: Option<PathBuf>,

        #[arg(long, required_unless_present = "config", requires = "reward_risk")]
        win_rate: Option<f64>,

        #[arg(long, required_unless_present = "config", requires = "win_rate")]
        reward_risk: Option<f64>,

        /// Fraction of the balance risked per trade.
        #[arg(long, default_value_t = 0.01)]
        risk: f64,

        /// Gain that ends a path as a success, as a fraction of the start.
        #[arg(long, default_value_t = 0.2)]
        upper: f64,

        /// Loss that ends a path as ruin, as a fraction of the start.
        #[arg(long, default_value_t = 0.2)]
        lower: f64,

        #[arg(long, default_value_t = 1000)]
        paths: usize,

        #[arg(long, default_value_t = 1000)]
        max_trades: usize,

        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
}

fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Detect {
            data,
            sigma,
            log,
            output,
        } => run_detect(&data, sigma, log, output.as_deref()),
        Commands::Run {
            config,
            overrides,
            output_dir,
            no_artifacts,
        } => run_backtest_cmd(&config, &overrides, &output_dir, no_artifacts),
        Commands::Sweep {
            config,
            axes,
            metric,
            sequential,
            top,
            output,
        } => run_sweep_cmd(&config, &axes, metric, sequential, top, output.as_deref()),
        Commands::Synth {
            bars,
            seed,
            start_price,
            volatility,
            interval_minutes,
            output,
        } => {
            let spec = SyntheticSpec {
                bars,
                seed,
                start_price,
                volatility,
                interval_minutes,
            };
            run_synth(&spec, &output)
        }
        Commands::MonteCarlo {
            config,
            win_rate,
            reward_risk,
            risk,
            upper,
            lower,
            paths,
            max_trades,
            seed,
        } => {
            let base = match (config, win_rate, reward_risk) {
                (Some(path), _, _) => {
                    let result = run_from_config(&load_config(&path)?)?;
                    MonteCarloConfig::from_summary(&result.summary)
                }
                (None, Some(win_rate), Some(reward_risk)) => {
                    MonteCarloConfig::new(win_rate, reward_risk)
                }
                _ => bail!("pass --config, or both --win-rate and --reward-risk"),
            };
            let mc = base
                .with_risk_fraction(risk)
                .with_thresholds(upper, lower)
                .with_paths(paths, max_trades)
                .with_seed(seed);
            print_monte_carlo(&simulate(&mc)?);
            Ok(())
        }
    }
}

fn run_detect(data: &Path, sigma: f64, log: bool, output: Option<&Path>) -> Result<()> {
    let mut bars = load_csv(data)?;
    if log {
        for (i, bar) in bars.iter().enumerate() {
            bar.validate_positive()
                .with_context(|| format!("bar {i} cannot be log-transformed"))?;
        }
        bars = bars.iter().map(|b| b.to_log()).collect();
    }
    let extremes = detect_extremes(&bars, sigma)?;
    let csv = export_extremes_csv(extremes.as_slice())?;

    match output {
        Some(path) => {
            write_file(path, &csv)?;
            println!(
                "{} extremes over {} bars written to {}",
                extremes.len(),
                bars.len(),
                path.display()
            );
        }
        None => print!("{csv}"),
    }
    Ok(())
}

fn run_backtest_cmd(
    config_path: &Path,
    overrides: &[String],
    output_dir: &Path,
    no_artifacts: bool,
) -> Result<()> {
    let config = apply_overrides(load_config(config_path)?, overrides)?;
    let result = run_from_config(&config)?;

    print_summary(&result);

    if !no_artifacts {
        let run_dir = save_artifacts(&result, output_dir)?;
        println!("Artifacts saved to: {}", run_dir.display());
    }
    Ok(())
}

fn run_sweep_cmd(
    config_path: &Path,
    axes: &[String],
    metric: FitnessMetric,
    sequential: bool,
    top: usize,
    output: Option<&Path>,
) -> Result<()> {
    let config = load_config(config_path)?;
    let grid = axes
        .iter()
        .map(|a| ParamAxis::parse(a))
        .collect::<Result<Vec<_>>>()?
        .into_iter()
        .fold(ParamGrid::new(), ParamGrid::with_axis);
    if grid.size() == 0 {
        bail!("sweep grid is empty");
    }

    let data = load_data(&config.data)?;
    let results = ParamSweep::new(metric)
        .with_parallelism(!sequential)
        .sweep(&grid, &config, &data)?;

    print_sweep(&results, top);

    if let Some(path) = output {
        write_file(path, &export_sweep_csv(&results)?)?;
        println!("Sweep table saved to: {}", path.display());
    }
    Ok(())
}

fn run_synth(spec: &SyntheticSpec, output: &Path) -> Result<()> {
    let bars = generate_synthetic(spec)?;
    write_file(output, &export_bars_csv(&bars)?)?;
    println!("{} bars written to {}", bars.len(), output.display());
    Ok(())
}

fn load_config(path: &Path) -> Result<RunConfig> {
    RunConfig::load(path).with_context(|| format!("failed to load config {}", path.display()))
}

fn apply_overrides(mut config: RunConfig, overrides: &[String]) -> Result<RunConfig> {
    for item in overrides {
        let Some((key, value)) = item.split_once('=') else {
            bail!("override '{item}' must look like KEY=VALUE");
        };
        let value: f64 = value
            .trim()
            .parse()
            .with_context(|| format!("override '{item}': value is not a number"))?;
        config = config.with_override(key.trim(), value)?;
    }
    config.validate()?;
    Ok(config)
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}

fn print_summary(result: &BacktestResult) {
    let s = &result.summary;
    println!();
    println!("=== Backtest Result ===");
    println!("Symbol:         {}", result.symbol);
    if let (Some(start), Some(end)) = (result.start, result.end) {
        println!("Period:         {start} to {end}");
    }
    println!(
        "Bars:           {} ({} processed)",
        result.bar_count, result.run.bars_processed
    );
    println!("Strategy:       {}", result.strategy.strategy_type);
    println!("Sigma:          {}", result.engine.sigma);
    println!("Extremes:       {}", result.run.extremes.len());
    println!("Trades:         {}", s.trade_count);
    println!();
    println!("--- Performance ---");
    println!("Total Return:   {:.6}", s.total_return);
    println!("Win Rate:       {:.1}%", s.win_rate * 100.0);
    println!("Reward/Risk:    {:.3}", s.reward_risk);
    println!("Expectancy:     {:.3}", s.expectancy);
    println!("Sharpe:         {:.3}", s.sharpe);
    println!("Profit Factor:  {:.2}", s.profit_factor);
    println!("Max Drawdown:   {:.6}", s.max_drawdown);
    println!("Max Consec Win: {}", s.max_consecutive_wins);
    println!("Max Non-Win Run:{}", s.max_consecutive_non_wins);
    println!("Avg Bars Held:  {:.1}", s.avg_bars_held);
    if let Some(open) = &result.run.open_trade {
        println!(
            "Open Trade:     {} {} since bar {}",
            open.id, open.direction, open.entry_index
        );
    }
    if !result.run.completed {
        println!();
        println!("WARNING: bar budget reached, run is incomplete");
    }
    if result.has_synthetic {
        println!();
        println!("WARNING: Results based on SYNTHETIC data");
    }
}

fn print_sweep(results: &SweepResults, top: usize) {
    println!();
    println!(
        "=== Sweep: {} runs ranked by {} ===",
        results.len(),
        results.metric
    );
    for (rank, row) in results.top_n(top).iter().enumerate() {
        let params: Vec<String> = row.params.iter().map(|(k, v)| format!("{k}={v}")).collect();
        println!(
            "{:>3}. {:>12.6}  trades={:<5} {}{}",
            rank + 1,
            row.fitness,
            row.summary.trade_count,
            params.join(" "),
            if row.completed { "" } else { "  (incomplete)" }
        );
    }
}

fn print_monte_carlo(result: &MonteCarloResult) {
    let c = &result.config;
    println!();
    println!("=== Monte Carlo: {} paths (seed {}) ===", c.paths, c.seed);
    println!("Win Rate:       {:.1}%", c.win_rate * 100.0);
    println!("Reward/Risk:    {:.3}", c.reward_risk);
    println!("Risk per Trade: {:.2}%", c.risk_fraction * 100.0);
    println!(
        "Target / Ruin:  +{:.1}% / -{:.1}%",
        c.upper_threshold * 100.0,
        c.lower_threshold * 100.0
    );
    println!();
    println!("Ruin:           {:.2}%", result.ruin_probability * 100.0);
    println!("Target:         {:.2}%", result.target_probability * 100.0);
    println!("Unresolved:     {:.2}%", result.unresolved_probability * 100.0);
    println!(
        "Trades:         mean {:.1}, median {:.1}, std {:.1}",
        result.trades_mean, result.trades_median, result.trades_std
    );
    println!(
        "Drawdown:       median {:.2}%, p95 {:.2}%, worst {:.2}%",
        result.drawdown_median * 100.0,
        result.drawdown_p95 * 100.0,
        result.drawdown_worst * 100.0
    );
}
