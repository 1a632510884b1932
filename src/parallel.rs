//! Independent replications of one configuration.
//!
//! A single run is strictly sequential. To estimate how much the statistics
//! depend on the random stream, the same configuration is run once per seed
//! and the reports are summarized. With the `parallel` feature the
//! replications run on a rayon thread pool; without it they run one after
//! another and produce identical results.
//!
//! # Feature Flag
//!
//! ```toml
//! [dependencies]
//! queuenet = { version = "0.1", features = ["parallel"] }
//! ```

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::SimConfig;
use crate::engine::SimulationEngine;
use crate::error::SimResult;
use crate::stats::SimulationReport;
use crate::types::SectionKind;

/// Mean and sample standard deviation of one metric across replications.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    pub mean: f64,
    pub std_dev: f64,
}

impl Estimate {
    fn from_samples(samples: impl Iterator<Item = f64>) -> Self {
        let values: Vec<f64> = samples.collect();
        let n = values.len() as f64;
        if values.is_empty() {
            return Self::default();
        }
        let mean = values.iter().sum::<f64>() / n;
        let std_dev = if values.len() > 1 {
            let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
            var.sqrt()
        } else {
            0.0
        };
        Self { mean, std_dev }
    }
}

/// Aggregated results of several replications.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ReplicationSummary {
    /// Seed of each replication, matching `reports`
    pub seeds: Vec<u64>,
    pub reports: Vec<SimulationReport>,
    pub avg_queue_length: Estimate,
    pub avg_queueing_delay: Estimate,
    pub completion_rate: Estimate,
    pub drop_rate: Estimate,
    /// Utilization per section, in processing order
    pub utilization: Vec<(SectionKind, Estimate)>,
}

impl ReplicationSummary {
    fn from_reports(seeds: Vec<u64>, reports: Vec<SimulationReport>) -> Self {
        let utilization = reports
            .first()
            .map(|first| {
                first
                    .sections
                    .iter()
                    .filter_map(|s| s.kind)
                    .map(|kind| {
                        let samples = reports
                            .iter()
                            .filter_map(|r| r.section(kind))
                            .map(|s| s.utilization);
                        (kind, Estimate::from_samples(samples))
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            avg_queue_length: Estimate::from_samples(reports.iter().map(|r| r.avg_queue_length)),
            avg_queueing_delay: Estimate::from_samples(reports.iter().map(|r| r.avg_queueing_delay)),
            completion_rate: Estimate::from_samples(reports.iter().map(|r| r.completion_rate)),
            drop_rate: Estimate::from_samples(reports.iter().map(|r| r.drop_rate)),
            utilization,
            seeds,
            reports,
        }
    }

    /// Exports the summary to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Runs one configuration under several seeds.
pub struct ReplicationRunner {
    config: SimConfig,
    /// Worker threads for the parallel feature (0 = rayon default)
    num_threads: usize,
}

impl ReplicationRunner {
    /// Creates a runner; the configuration's own seed is ignored.
    pub fn new(config: SimConfig) -> Self {
        Self {
            config,
            num_threads: 0,
        }
    }

    /// Sets the number of worker threads.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.num_threads = threads;
        self
    }

    /// Returns the configured thread count.
    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    fn run_one(config: &SimConfig, seed: u64) -> SimResult<SimulationReport> {
        let mut config = config.clone();
        config.seed = Some(seed);
        SimulationEngine::new(config)?.run()
    }

    /// Runs one replication per seed, sequentially.
    #[cfg(not(feature = "parallel"))]
    pub fn run(&self, seeds: &[u64]) -> SimResult<ReplicationSummary> {
        let reports = seeds
            .iter()
            .map(|&seed| Self::run_one(&self.config, seed))
            .collect::<SimResult<Vec<_>>>()?;
        info!(replications = reports.len(), "replications finished");
        Ok(ReplicationSummary::from_reports(seeds.to_vec(), reports))
    }

    /// Runs one replication per seed on a rayon pool.
    #[cfg(feature = "parallel")]
    pub fn run(&self, seeds: &[u64]) -> SimResult<ReplicationSummary> {
        let config = &self.config;
        let run_all = || {
            seeds
                .par_iter()
                .map(|&seed| Self::run_one(config, seed))
                .collect::<SimResult<Vec<_>>>()
        };

        let reports = match rayon::ThreadPoolBuilder::new()
            .num_threads(self.num_threads)
            .build()
        {
            Ok(pool) => pool.install(run_all)?,
            Err(err) => {
                tracing::warn!(%err, "could not build thread pool, using the global one");
                run_all()?
            }
        };
        info!(replications = reports.len(), "replications finished");
        Ok(ReplicationSummary::from_reports(seeds.to_vec(), reports))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfigBuilder;

    fn small_config() -> SimConfig {
        SimConfigBuilder::new()
            .arrival_rate(2)
            .warmup_ticks(30)
            .build()
            .unwrap()
    }

    #[test]
    fn test_estimate() {
        let est = Estimate::from_samples([2.0, 4.0, 6.0].into_iter());
        assert!((est.mean - 4.0).abs() < 1e-12);
        assert!((est.std_dev - 2.0).abs() < 1e-12);

        let single = Estimate::from_samples([3.0].into_iter());
        assert_eq!(single.std_dev, 0.0);
        assert_eq!(Estimate::from_samples(std::iter::empty()), Estimate::default());
    }

    #[test]
    fn test_replications_match_single_runs() {
        let runner = ReplicationRunner::new(small_config()).with_threads(2);
        let summary = runner.run(&[1, 2, 3]).unwrap();
        assert_eq!(summary.reports.len(), 3);
        assert_eq!(summary.seeds, vec![1, 2, 3]);
        assert_eq!(summary.utilization.len(), 7);

        let mut config = small_config();
        config.seed = Some(2);
        let single = SimulationEngine::new(config).unwrap().run().unwrap();
        assert_eq!(summary.reports[1], single);
    }

    #[test]
    fn test_empty_seed_list() {
        let summary = ReplicationRunner::new(small_config()).run(&[]).unwrap();
        assert!(summary.reports.is_empty());
        assert!(summary.utilization.is_empty());
    }
}
