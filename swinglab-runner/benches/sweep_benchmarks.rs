//! Criterion benchmarks for runner hot loops.
//!
//! Run with: `cargo bench -p swinglab-runner`
//!
//! - Performance summary over a large synthetic return series
//! - A small parameter sweep, sequential vs parallel

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use swinglab_core::strategy::StrategyConfig;
use swinglab_runner::metrics::{max_drawdown, sharpe_ratio};
use swinglab_runner::{
    load_data, DataConfig, FitnessMetric, ParamAxis, ParamGrid, ParamSweep, RunConfig,
    SyntheticSpec,
};

fn generate_returns(count: usize) -> Vec<f64> {
    (0..count)
        .map(|i| ((i * 7919) % 200) as f64 * 0.01 - 0.95)
        .collect()
}

fn bench_metrics(c: &mut Criterion) {
    let mut group = c.benchmark_group("metrics");
    for size in [100, 10_000, 1_000_000] {
        let returns = generate_returns(size);
        group.bench_with_input(BenchmarkId::new("sharpe", size), &returns, |b, r| {
            b.iter(|| sharpe_ratio(black_box(r)))
        });
        group.bench_with_input(BenchmarkId::new("max_drawdown", size), &returns, |b, r| {
            b.iter(|| max_drawdown(black_box(r)))
        });
    }
    group.finish();
}

fn bench_sweep(c: &mut Criterion) {
    let base = RunConfig::new(
        DataConfig::synthetic(SyntheticSpec::new(20_000, 7)),
        0.8,
        StrategyConfig::new("extreme_reversal").with_param("atr_min", 0.0),
    );
    let data = load_data(&base.data).unwrap();
    let grid = ParamGrid::new()
        .with_axis(ParamAxis::new("strategy.tp_mult", vec![1.0, 2.0, 3.0, 4.0]))
        .with_axis(ParamAxis::new("detector.sigma", vec![0.5, 1.0]));

    let mut group = c.benchmark_group("sweep_8_points");
    group.sample_size(10);
    for parallel in [false, true] {
        let sweep = ParamSweep::new(FitnessMetric::Sharpe).with_parallelism(parallel);
        let label = if parallel { "parallel" } else { "sequential" };
        group.bench_function(label, |b| {
            b.iter(|| sweep.sweep(&grid, &base, &data).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_metrics, bench_sweep);
criterion_main!(benches);
