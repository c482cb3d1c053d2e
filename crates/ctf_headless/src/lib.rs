//! Headless capture-the-flag runner.
//!
//! Drives the deterministic core against the reference arena without any
//! rendering. This enables:
//!
//! - **Policy smoke tests**: scripted and random policies play full episodes
//! - **Batch metrics**: many seeded episodes in parallel, summarized as JSON
//! - **Determinism checks**: repeated runs and replays must reproduce hashes
//!
//! # Output
//!
//! - **stdout**: JSON reports
//! - **stderr**: logs (human-readable)
//!
//! # Example
//!
//! ```bash
//! # One episode of the standard field, scripted vs random
//! cargo run -p ctf_headless -- run --red scripted --blue random
//!
//! # 1000 episodes in parallel
//! cargo run -p ctf_headless -- batch --count 1000 --output results/
//!
//! # Check a scenario file
//! cargo run -p ctf_headless -- validate --scenario scenarios/duel_1v1.ron
//! ```

pub mod batch;
pub mod metrics;
pub mod policy;
pub mod runner;
pub mod scenario;

pub use batch::{run_batch, verify_determinism, BatchConfig, BatchResults, DeterminismReport};
pub use metrics::{EpisodeMetrics, MetricsCollector, RunSummary};
pub use policy::{Policy, PolicyKind};
pub use runner::{run, EpisodeRunner, RunError, RunOptions, RunReport};
pub use scenario::ScenarioError;
