//! Determinism testing utilities.
//!
//! Provides a harness for verifying that the core produces identical results
//! given an identical scenario and action stream.
//!
//! # Testing Strategy
//!
//! Training runs and replays depend on episodes being reproducible. Sources
//! of non-determinism include:
//!
//! - **Floating-point geometry**: positions, headings and ray casts use
//!   [`ctf_core::math::Fixed`]; floats only leave the core as rewards and
//!   observations.
//!
//! - **Map iteration order**: agents and contacts are always processed in
//!   sorted id order.
//!
//! - **Randomness**: action streams come from seeded generators.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: individual state transitions
//! 2. **Property tests**: random action streams must replay identically
//! 3. **Integration tests**: scripted scenarios are reproducible
//! 4. **Parallel tests**: N cores on N threads all match

use std::collections::BTreeMap;
use std::thread;

use ctf_core::agent::{ActionPair, AgentId};
use ctf_core::arena::Arena;
use ctf_core::config::ScenarioConfig;
use ctf_core::simulation::CaptureTheFlag;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Final hash from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks simulated.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for a deterministic core).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that every run matched, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the runs produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Match is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a scenario with an action stream and return the hash after every
/// tick (core state plus arena transforms).
///
/// # Panics
///
/// Panics if the scenario is invalid or a tick fails.
#[must_use]
pub fn hash_trace(config: &ScenarioConfig, stream: &[BTreeMap<AgentId, ActionPair>]) -> Vec<u64> {
    let mut arena = Arena::from_scenario(config);
    let mut game = CaptureTheFlag::new(config, &mut arena).expect("scenario should be valid");
    stream
        .iter()
        .map(|actions| {
            game.tick(&mut arena, actions).expect("tick should succeed");
            game.state_hash_with(&arena)
        })
        .collect()
}

/// Run the same scenario and stream `runs` times and compare final hashes.
#[must_use]
pub fn verify_determinism(
    config: &ScenarioConfig,
    stream: &[BTreeMap<AgentId, ActionPair>],
    runs: usize,
) -> DeterminismResult {
    let hashes: Vec<u64> = (0..runs)
        .map(|_| hash_trace(config, stream).last().copied().unwrap_or_default())
        .collect();
    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);
    DeterminismResult {
        is_deterministic,
        hashes,
        ticks: stream.len() as u64,
    }
}

/// Run `runs` copies on scoped threads and compare final hashes.
///
/// # Panics
///
/// Panics if a worker thread panics.
#[must_use]
pub fn verify_parallel_determinism(
    config: &ScenarioConfig,
    stream: &[BTreeMap<AgentId, ActionPair>],
    runs: usize,
) -> DeterminismResult {
    let hashes: Vec<u64> = thread::scope(|s| {
        let handles: Vec<_> = (0..runs)
            .map(|_| s.spawn(|| hash_trace(config, stream).last().copied().unwrap_or_default()))
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("worker should not panic"))
            .collect()
    });
    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);
    DeterminismResult {
        is_deterministic,
        hashes,
        ticks: stream.len() as u64,
    }
}

/// Compare two runs tick by tick and return the first tick (1-based) at
/// which they diverge.
#[must_use]
pub fn find_first_divergence(
    config: &ScenarioConfig,
    stream: &[BTreeMap<AgentId, ActionPair>],
) -> Option<u64> {
    let first = hash_trace(config, stream);
    let second = hash_trace(config, stream);
    first
        .iter()
        .zip(&second)
        .position(|(a, b)| a != b)
        .map(|i| i as u64 + 1)
}

/// Proptest strategies for determinism testing.
pub mod strategies {
    use std::collections::BTreeMap;

    use ctf_core::agent::{ActionPair, AgentId};
    use proptest::prelude::*;

    /// Any valid action.
    pub fn arb_action() -> impl Strategy<Value = ActionPair> {
        (0u8..3, 0u8..3).prop_map(|(movement, turn)| {
            ActionPair::new(movement, turn).unwrap_or(ActionPair::IDLE)
        })
    }

    /// Any raw index pair, valid or not.
    pub fn arb_raw_action() -> impl Strategy<Value = (u8, u8)> {
        (any::<u8>(), any::<u8>())
    }

    /// One tick of actions for the listed agents.
    pub fn arb_tick_actions(
        ids: Vec<AgentId>,
    ) -> impl Strategy<Value = BTreeMap<AgentId, ActionPair>> {
        proptest::collection::vec(arb_action(), ids.len())
            .prop_map(move |actions| ids.iter().copied().zip(actions).collect())
    }

    /// A stream of up to `max_ticks` ticks of actions.
    pub fn arb_action_stream(
        ids: Vec<AgentId>,
        max_ticks: usize,
    ) -> impl Strategy<Value = Vec<BTreeMap<AgentId, ActionPair>>> {
        proptest::collection::vec(arb_tick_actions(ids), 1..max_ticks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{random_action_stream, standard_scenario};

    #[test]
    fn test_idle_stream_is_deterministic() {
        let config = standard_scenario();
        let stream = vec![idle_tick(); 100];
        verify_determinism(&config, &stream, 3).assert_deterministic();
    }

    #[test]
    fn test_random_stream_is_deterministic() {
        let config = standard_scenario();
        let stream = random_action_stream(&[1, 2, 3, 4], 300, 42);
        verify_determinism(&config, &stream, 3).assert_deterministic();
        assert_eq!(find_first_divergence(&config, &stream), None);
    }

    #[test]
    fn test_parallel_runs_match() {
        let config = standard_scenario();
        let stream = random_action_stream(&[1, 2, 3, 4], 200, 9);
        verify_parallel_determinism(&config, &stream, 4).assert_deterministic();
    }

    #[test]
    fn test_different_streams_diverge() {
        let config = standard_scenario();
        let a = hash_trace(&config, &random_action_stream(&[1, 2, 3, 4], 50, 1));
        let b = hash_trace(&config, &random_action_stream(&[1, 2, 3, 4], 50, 2));
        assert_ne!(a.last(), b.last());
    }

    fn idle_tick() -> BTreeMap<AgentId, ActionPair> {
        [1, 2, 3, 4].into_iter().map(|id| (id, ActionPair::IDLE)).collect()
    }
}
