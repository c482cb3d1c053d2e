//! Batch episode runner.
//!
//! Runs many independent single-episode games in parallel using rayon. Each
//! worker owns its own arena and core; seeds are `seed_start + index`.

use std::path::Path;
use std::time::Instant;

use ctf_core::config::ScenarioConfig;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::metrics::{save_json, EpisodeMetrics, RunSummary};
use crate::policy::PolicyKind;
use crate::runner::{run, RunError, RunOptions};

/// Configuration for a batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Scenario name or path, for the report
    pub scenario: String,
    /// Number of episodes to run
    pub episode_count: u32,
    /// Maximum parallel episodes (0 = use rayon default)
    pub parallel: u32,
    /// Seed of the first episode
    pub seed_start: u64,
    /// Red team policy
    pub red: PolicyKind,
    /// Blue team policy
    pub blue: PolicyKind,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            scenario: "standard_2v2".to_string(),
            episode_count: 100,
            parallel: 0,
            seed_start: 0,
            red: PolicyKind::Scripted,
            blue: PolicyKind::Random,
        }
    }
}

impl BatchConfig {
    /// Create config for a specific scenario
    pub fn new(scenario: &str, episode_count: u32) -> Self {
        Self {
            scenario: scenario.to_string(),
            episode_count,
            ..Default::default()
        }
    }

    /// Set seed start
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed_start = seed;
        self
    }

    /// Set policies
    pub fn with_policies(mut self, red: PolicyKind, blue: PolicyKind) -> Self {
        self.red = red;
        self.blue = blue;
        self
    }

    fn options(&self, seed: u64) -> RunOptions {
        RunOptions {
            episodes: 1,
            red: self.red,
            blue: self.blue,
            seed,
            record_replay: false,
        }
    }
}

/// One finished batch episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchEpisode {
    /// Index within the batch
    pub index: u32,
    /// Seed used
    pub seed: u64,
    /// Final core and arena hash
    pub final_hash: u64,
    /// Episode metrics
    pub metrics: EpisodeMetrics,
}

/// Error during batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchError {
    /// Episode index
    pub index: u32,
    /// Seed used
    pub seed: u64,
    /// Error message
    pub message: String,
}

/// Results from a batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResults {
    /// Configuration used
    pub config: BatchConfig,
    /// Finished episodes, in index order
    pub episodes: Vec<BatchEpisode>,
    /// Aggregate summary
    pub summary: RunSummary,
    /// Total runtime
    pub duration_seconds: f64,
    /// Errors encountered
    pub errors: Vec<BatchError>,
}

impl BatchResults {
    /// Save results to JSON file
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        save_json(self, path)
    }

    /// Load results from JSON file
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(std::io::Error::other)
    }
}

fn run_single_episode(
    scenario: &ScenarioConfig,
    config: &BatchConfig,
    index: u32,
) -> Result<BatchEpisode, BatchError> {
    let seed = config.seed_start.wrapping_add(u64::from(index));
    let report = run(scenario.clone(), config.options(seed)).map_err(|e| BatchError {
        index,
        seed,
        message: e.to_string(),
    })?;
    let metrics = report.episodes.into_iter().next().ok_or_else(|| BatchError {
        index,
        seed,
        message: "run finished without an episode".to_string(),
    })?;
    Ok(BatchEpisode {
        index,
        seed,
        final_hash: report.final_hash,
        metrics,
    })
}

/// Run a batch of episodes
pub fn run_batch(scenario: &ScenarioConfig, config: BatchConfig) -> BatchResults {
    let start = Instant::now();
    info!(
        "Starting batch run: {} episodes of '{}' ({} vs {})",
        config.episode_count, config.scenario, config.red, config.blue
    );

    let work = || -> Vec<Result<BatchEpisode, BatchError>> {
        (0..config.episode_count)
            .into_par_iter()
            .map(|index| {
                let result = run_single_episode(scenario, &config, index);
                match &result {
                    Ok(episode) => debug!(
                        index,
                        seed = episode.seed,
                        winner = ?episode.metrics.winner,
                        "Batch episode finished"
                    ),
                    Err(e) => warn!("Episode {} failed: {}", index, e.message),
                }
                result
            })
            .collect()
    };

    let results = if config.parallel > 0 {
        match rayon::ThreadPoolBuilder::new()
            .num_threads(config.parallel as usize)
            .build()
        {
            Ok(pool) => pool.install(work),
            Err(e) => {
                warn!("Failed to build thread pool: {}, using global pool", e);
                work()
            }
        }
    } else {
        work()
    };

    let (episodes, errors): (Vec<_>, Vec<_>) = results.into_iter().partition(Result::is_ok);
    let episodes: Vec<BatchEpisode> = episodes.into_iter().filter_map(Result::ok).collect();
    let errors: Vec<BatchError> = errors.into_iter().filter_map(Result::err).collect();

    let metrics: Vec<EpisodeMetrics> = episodes.iter().map(|e| e.metrics.clone()).collect();
    let summary = RunSummary::from_episodes(&metrics);
    let duration_seconds = start.elapsed().as_secs_f64();

    info!(
        "Batch complete: {} episodes in {:.1}s ({:.1} episodes/sec)",
        episodes.len(),
        duration_seconds,
        episodes.len() as f64 / duration_seconds.max(0.001)
    );

    BatchResults {
        config,
        episodes,
        summary,
        duration_seconds,
        errors,
    }
}

/// Outcome of a determinism check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeterminismReport {
    /// Final hash of every run.
    pub hashes: Vec<u64>,
    /// Ticks each run took.
    pub ticks: Vec<u64>,
}

impl DeterminismReport {
    /// Whether every run matched.
    #[must_use]
    pub fn is_deterministic(&self) -> bool {
        self.hashes.windows(2).all(|w| w[0] == w[1])
            && self.ticks.windows(2).all(|w| w[0] == w[1])
    }
}

/// Run the same seeded episode `runs` times and compare final hashes.
pub fn verify_determinism(
    scenario: &ScenarioConfig,
    options: &RunOptions,
    runs: u32,
) -> Result<DeterminismReport, RunError> {
    let mut report = DeterminismReport {
        hashes: Vec::new(),
        ticks: Vec::new(),
    };
    for run_index in 0..runs {
        let result = run(scenario.clone(), options.clone())?;
        debug!(run = run_index, hash = result.final_hash, "Determinism run finished");
        report.hashes.push(result.final_hash);
        report.ticks.push(result.ticks);
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::duel_1v1;

    fn quick_duel() -> ScenarioConfig {
        let mut scenario = duel_1v1();
        scenario.rules.max_steps = 200;
        scenario
    }

    #[test]
    fn test_batch_config_builder() {
        let config = BatchConfig::new("duel_1v1", 500)
            .with_seed(12345)
            .with_policies(PolicyKind::Random, PolicyKind::Idle);
        assert_eq!(config.scenario, "duel_1v1");
        assert_eq!(config.episode_count, 500);
        assert_eq!(config.seed_start, 12345);
        assert_eq!(config.blue, PolicyKind::Idle);
    }

    #[test]
    fn test_run_batch_small() {
        let config =
            BatchConfig::new("duel_1v1", 8).with_policies(PolicyKind::Random, PolicyKind::Random);
        let results = run_batch(&quick_duel(), config);

        assert_eq!(results.episodes.len(), 8);
        assert!(results.errors.is_empty());
        assert_eq!(results.summary.total_episodes, 8);
        let indices: Vec<u32> = results.episodes.iter().map(|e| e.index).collect();
        assert_eq!(indices, (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn test_batch_is_reproducible_across_pool_sizes() {
        let config =
            BatchConfig::new("duel_1v1", 6).with_policies(PolicyKind::Random, PolicyKind::Scripted);
        let serial = run_batch(&quick_duel(), BatchConfig { parallel: 1, ..config.clone() });
        let parallel = run_batch(&quick_duel(), BatchConfig { parallel: 4, ..config });
        assert_eq!(serial.episodes, parallel.episodes);
    }

    #[test]
    fn test_verify_determinism() {
        let options = RunOptions {
            red: PolicyKind::Random,
            blue: PolicyKind::Random,
            seed: 12345,
            ..RunOptions::default()
        };
        let report = verify_determinism(&quick_duel(), &options, 3).unwrap();
        assert_eq!(report.hashes.len(), 3);
        assert!(report.is_deterministic());
    }

    #[test]
    fn test_batch_results_save_load() {
        let config =
            BatchConfig::new("duel_1v1", 3).with_policies(PolicyKind::Idle, PolicyKind::Idle);
        let results = run_batch(&quick_duel(), config);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");

        results.save(&path).unwrap();
        assert!(path.exists());

        let loaded = BatchResults::load(&path).unwrap();
        assert_eq!(loaded.episodes.len(), 3);
        assert_eq!(loaded.config.scenario, "duel_1v1");
        assert_eq!(loaded.summary.timeouts, 3);
    }
}
