//! Parameter sweeps over a cartesian grid of config overrides.

use anyhow::{bail, Context, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{RunConfig, RunId};
use crate::data_loader::LoadedData;
use crate::fitness::FitnessMetric;
use crate::metrics::PerformanceSummary;
use crate::runner::run_on_bars;

/// One swept parameter: a [`RunConfig::with_override`] key and its values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamAxis {
    pub key: String,
    pub values: Vec<f64>,
}

impl ParamAxis {
    pub fn new(key: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            key: key.into(),
            values,
        }
    }

    /// Parse `key=v1,v2,...`, e.g. `strategy.tp_mult=1,2,3`.
    pub fn parse(spec: &str) -> Result<Self> {
        let Some((key, values)) = spec.split_once('=') else {
            bail!("axis '{spec}' must look like key=v1,v2,...");
        };
        let key = key.trim();
        if key.is_empty() {
            bail!("axis '{spec}' has an empty key");
        }
        let values = values
            .split(',')
            .map(|v| {
                v.trim()
                    .parse::<f64>()
                    .with_context(|| format!("axis '{key}': '{v}' is not a number"))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(key, values))
    }
}

/// Parameter grid specification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamGrid {
    pub axes: Vec<ParamAxis>,
}

/// One point of the grid, in axis order.
pub type ParamPoint = Vec<(String, f64)>;

impl ParamGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_axis(mut self, axis: ParamAxis) -> Self {
        self.axes.push(axis);
        self
    }

    /// Number of points. A grid without axes has one point, the base config.
    pub fn size(&self) -> usize {
        self.axes.iter().map(|a| a.values.len()).product()
    }

    /// Every combination, the last axis varying fastest.
    pub fn points(&self) -> Vec<ParamPoint> {
        let mut points: Vec<ParamPoint> = vec![Vec::new()];
        for axis in &self.axes {
            points = points
                .into_iter()
                .flat_map(|prefix| {
                    axis.values.iter().map(move |&value| {
                        let mut point = prefix.clone();
                        point.push((axis.key.clone(), value));
                        point
                    })
                })
                .collect();
        }
        points
    }

    /// Apply every point to `base`. Each resulting config is validated.
    pub fn generate_configs(&self, base: &RunConfig) -> Result<Vec<(ParamPoint, RunConfig)>> {
        self.points()
            .into_iter()
            .map(|point| {
                let mut config = base.clone();
                for (key, value) in &point {
                    config = config.with_override(key, *value)?;
                }
                config
                    .validate()
                    .with_context(|| format!("invalid grid point {}", describe(&point)))?;
                Ok((point, config))
            })
            .collect()
    }
}

fn describe(point: &[(String, f64)]) -> String {
    point
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Summary of one sweep run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepRow {
    pub params: ParamPoint,
    pub run_id: RunId,
    pub fitness: f64,
    pub completed: bool,
    pub summary: PerformanceSummary,
}

/// Parameter sweep executor.
///
/// Runs every grid point against the same pre-loaded bars, optionally in
/// parallel. Rows come back in grid order either way.
#[derive(Debug, Clone)]
pub struct ParamSweep {
    metric: FitnessMetric,
    parallel: bool,
}

impl ParamSweep {
    pub fn new(metric: FitnessMetric) -> Self {
        Self {
            metric,
            parallel: true,
        }
    }

    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn sweep(
        &self,
        grid: &ParamGrid,
        base: &RunConfig,
        data: &LoadedData,
    ) -> Result<SweepResults> {
        let configs = grid.generate_configs(base)?;
        info!(
            points = configs.len(),
            metric = %self.metric,
            parallel = self.parallel,
            "starting sweep"
        );

        let run_one = |(params, config): &(ParamPoint, RunConfig)| -> Result<SweepRow> {
            let result = run_on_bars(config, data)
                .with_context(|| format!("sweep run {} failed", describe(params)))?;
            Ok(SweepRow {
                params: params.clone(),
                run_id: result.run_id,
                fitness: self.metric.extract(&result.summary),
                completed: result.run.completed,
                summary: result.summary,
            })
        };

        let rows = if self.parallel {
            configs.par_iter().map(run_one).collect::<Result<Vec<_>>>()?
        } else {
            configs.iter().map(run_one).collect::<Result<Vec<_>>>()?
        };

        let results = SweepResults {
            metric: self.metric,
            rows,
        };
        if let Some(best) = results.best() {
            info!(
                best_fitness = best.fitness,
                params = %describe(&best.params),
                "sweep finished"
            );
        }
        Ok(results)
    }
}

/// Results from a parameter sweep, in grid order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepResults {
    pub metric: FitnessMetric,
    pub rows: Vec<SweepRow>,
}

impl SweepResults {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, run_id: &str) -> Option<&SweepRow> {
        self.rows.iter().find(|r| r.run_id == run_id)
    }

    /// Best first. Ties keep grid order.
    pub fn ranked(&self) -> Vec<&SweepRow> {
        let mut sorted: Vec<&SweepRow> = self.rows.iter().collect();
        sorted.sort_by(|a, b| {
            b.fitness
                .partial_cmp(&a.fitness)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        sorted
    }

    pub fn top_n(&self, n: usize) -> Vec<&SweepRow> {
        self.ranked().into_iter().take(n).collect()
    }

    pub fn best(&self) -> Option<&SweepRow> {
        self.ranked().into_iter().next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DataConfig;
    use crate::data_loader::{load_data, SyntheticSpec};
    use swinglab_core::strategy::StrategyConfig;

    fn base() -> RunConfig {
        RunConfig::new(
            DataConfig::synthetic(SyntheticSpec::new(800, 3)),
            0.6,
            StrategyConfig::new("extreme_reversal").with_param("atr_min", 0.0),
        )
    }

    fn grid() -> ParamGrid {
        ParamGrid::new()
            .with_axis(ParamAxis::new("strategy.tp_mult", vec![1.0, 2.0, 3.0]))
            .with_axis(ParamAxis::new("detector.sigma", vec![0.4, 0.8]))
    }

    #[test]
    fn parses_axis_specs() {
        let axis = ParamAxis::parse("strategy.tp_mult=1, 2.5,3").unwrap();
        assert_eq!(axis, ParamAxis::new("strategy.tp_mult", vec![1.0, 2.5, 3.0]));
        assert!(ParamAxis::parse("strategy.tp_mult").is_err());
        assert!(ParamAxis::parse("=1,2").is_err());
        assert!(ParamAxis::parse("detector.sigma=1,x").is_err());
    }

    #[test]
    fn grid_points_are_cartesian() {
        let grid = grid();
        assert_eq!(grid.size(), 6);
        let points = grid.points();
        assert_eq!(points.len(), 6);
        assert_eq!(
            points[0],
            vec![
                ("strategy.tp_mult".to_string(), 1.0),
                ("detector.sigma".to_string(), 0.4)
            ]
        );
        assert_eq!(points[1][1].1, 0.8);
        assert_eq!(points[5][0].1, 3.0);

        assert_eq!(ParamGrid::new().size(), 1);
        assert_eq!(ParamGrid::new().points(), vec![Vec::new()]);
    }

    #[test]
    fn invalid_points_fail_fast() {
        let grid = ParamGrid::new().with_axis(ParamAxis::new("strategy.tp_mult", vec![1.0, -1.0]));
        let err = grid.generate_configs(&base()).unwrap_err();
        assert!(format!("{err:#}").contains("strategy.tp_mult=-1"), "{err:#}");

        let unknown = ParamGrid::new().with_axis(ParamAxis::new("engine.warmup", vec![1.0]));
        assert!(unknown.generate_configs(&base()).is_err());
    }

    #[test]
    fn parallel_matches_sequential() {
        let base = base();
        let data = load_data(&base.data).unwrap();
        let parallel = ParamSweep::new(FitnessMetric::TotalReturn)
            .sweep(&grid(), &base, &data)
            .unwrap();
        let sequential = ParamSweep::new(FitnessMetric::TotalReturn)
            .with_parallelism(false)
            .sweep(&grid(), &base, &data)
            .unwrap();
        assert_eq!(parallel, sequential);
        assert_eq!(parallel.len(), 6);

        for (row, (point, config)) in parallel
            .rows
            .iter()
            .zip(grid().generate_configs(&base).unwrap())
        {
            assert_eq!(row.params, point);
            assert_eq!(row.run_id, config.run_id().unwrap());
            assert_eq!(row.fitness, row.summary.total_return);
        }
    }

    #[test]
    fn ranking_is_descending_and_stable() {
        let row = |fitness: f64, id: &str| SweepRow {
            params: Vec::new(),
            run_id: id.to_string(),
            fitness,
            completed: true,
            summary: PerformanceSummary::default(),
        };
        let results = SweepResults {
            metric: FitnessMetric::Sharpe,
            rows: vec![row(0.5, "a"), row(1.5, "b"), row(0.5, "c"), row(-1.0, "d")],
        };
        let order: Vec<&str> = results.ranked().iter().map(|r| r.run_id.as_str()).collect();
        assert_eq!(order, vec!["b", "a", "c", "d"]);
        assert_eq!(results.best().unwrap().run_id, "b");
        assert_eq!(results.top_n(2).len(), 2);
        assert_eq!(results.get("d").unwrap().fitness, -1.0);
    }
}
