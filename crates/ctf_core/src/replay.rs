//! Episode replay records.
//!
//! A replay stores the scenario and the action stream fed to the core. Since
//! the core and the reference arena are deterministic, playing the stream
//! back against a fresh arena must reproduce the recorded final hash.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::agent::{ActionPair, AgentId};
use crate::arena::Arena;
use crate::config::ScenarioConfig;
use crate::error::{CtfError, Result};
use crate::simulation::CaptureTheFlag;

/// Replay file format version for compatibility.
pub const REPLAY_VERSION: u32 = 1;

/// Actions for every agent on one tick, in ascending id order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayFrame {
    /// `(agent, action)` pairs.
    pub actions: Vec<(AgentId, ActionPair)>,
}

impl ReplayFrame {
    /// Action map as the core expects it.
    #[must_use]
    pub fn action_map(&self) -> BTreeMap<AgentId, ActionPair> {
        self.actions.iter().copied().collect()
    }
}

/// Complete replay data structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Replay {
    /// Replay format version.
    pub version: u32,
    /// Scenario the run started from.
    pub scenario: ScenarioConfig,
    /// One frame per tick.
    pub frames: Vec<ReplayFrame>,
    /// Final tick when recording stopped.
    pub final_tick: u64,
    /// Core and arena hash after the final tick.
    pub final_hash: u64,
}

impl Replay {
    /// Start an empty replay for `scenario`.
    #[must_use]
    pub fn new(scenario: ScenarioConfig) -> Self {
        Self {
            version: REPLAY_VERSION,
            scenario,
            frames: Vec::new(),
            final_tick: 0,
            final_hash: 0,
        }
    }

    /// Append one tick of actions.
    pub fn record_tick(&mut self, actions: &BTreeMap<AgentId, ActionPair>) {
        self.frames.push(ReplayFrame {
            actions: actions.iter().map(|(&id, &action)| (id, action)).collect(),
        });
    }

    /// Finalize the replay with end state.
    pub fn finalize(&mut self, final_hash: u64) {
        self.final_tick = self.frames.len() as u64;
        self.final_hash = final_hash;
    }

    /// Frame for a tick, if recorded.
    #[must_use]
    pub fn frame(&self, tick: u64) -> Option<&ReplayFrame> {
        usize::try_from(tick).ok().and_then(|i| self.frames.get(i))
    }

    /// Number of recorded ticks.
    #[must_use]
    pub const fn duration(&self) -> u64 {
        self.final_tick
    }

    /// Encode with bincode.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| CtfError::Serialization(format!("Failed to serialize replay: {e}")))
    }

    /// Decode with bincode and check the version.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let replay: Self = bincode::deserialize(bytes)
            .map_err(|e| CtfError::Serialization(format!("Failed to deserialize replay: {e}")))?;
        if replay.version != REPLAY_VERSION {
            return Err(CtfError::Serialization(format!(
                "Replay version mismatch: expected {REPLAY_VERSION}, got {}",
                replay.version
            )));
        }
        Ok(replay)
    }

    /// Save the replay to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let bytes = self.to_bytes()?;
        std::fs::write(path.as_ref(), bytes)
            .map_err(|e| CtfError::Serialization(format!("Failed to write replay file: {e}")))
    }

    /// Load a replay from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())
            .map_err(|e| CtfError::Serialization(format!("Failed to read replay file: {e}")))?;
        Self::from_bytes(&bytes)
    }

    /// Play the action stream against a fresh reference arena and return
    /// the resulting hash.
    pub fn play(&self) -> Result<u64> {
        let mut arena = Arena::try_from_scenario(&self.scenario)?;
        let mut game = CaptureTheFlag::new(&self.scenario, &mut arena)?;
        for frame in &self.frames {
            game.tick(&mut arena, &frame.action_map())?;
        }
        Ok(game.state_hash_with(&arena))
    }

    /// Whether playback reproduces the recorded final hash.
    pub fn verify(&self) -> Result<bool> {
        let hash = self.play()?;
        if hash != self.final_hash {
            tracing::warn!(
                expected = self.final_hash,
                actual = hash,
                ticks = self.final_tick,
                "Replay diverged"
            );
        }
        Ok(hash == self.final_hash)
    }
}
