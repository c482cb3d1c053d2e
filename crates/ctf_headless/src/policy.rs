//! Built-in policies for smoke runs.
//!
//! Policies map an observation to an [`ActionPair`]. None of them learn;
//! they exist to exercise the core end to end and to give batch runs
//! something to measure.

use std::collections::BTreeMap;

use clap::ValueEnum;
use ctf_core::agent::{ActionPair, AgentId, Observation};
use ctf_core::config::ScenarioConfig;
use ctf_core::team::Team;
use serde::{Deserialize, Serialize};

/// Move channel index for full speed forward.
const FORWARD: u8 = 2;
/// Turn channel indices.
const TURN_LEFT: u8 = 0;
const STRAIGHT: u8 = 1;
const TURN_RIGHT: u8 = 2;

/// Sine of the heading error below which a scripted agent stops turning.
const AIM_TOLERANCE: f32 = 0.05;

/// Chooses actions from observations.
pub trait Policy: Send {
    /// Short name for logs and metrics.
    fn name(&self) -> &'static str;

    /// Action for `agent` this tick.
    fn act(&mut self, agent: AgentId, observation: &Observation) -> ActionPair;
}

/// Which built-in policy to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    /// Never moves.
    Idle,
    /// Uniformly random actions from a seeded generator.
    Random,
    /// Seek the enemy flag, carry it home.
    #[default]
    Scripted,
}

impl PolicyKind {
    /// Build the policy for one team of `scenario`.
    #[must_use]
    pub fn build(self, scenario: &ScenarioConfig, team: Team, seed: u64) -> Box<dyn Policy> {
        match self {
            Self::Idle => Box::new(IdlePolicy),
            Self::Random => Box::new(RandomPolicy::new(seed.wrapping_add(team.index() as u64))),
            Self::Scripted => Box::new(ScriptedPolicy::for_team(scenario, team)),
        }
    }
}

impl std::fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Random => "random",
            Self::Scripted => "scripted",
        };
        f.write_str(name)
    }
}

/// Always [`ActionPair::IDLE`].
#[derive(Debug, Clone, Copy, Default)]
pub struct IdlePolicy;

impl Policy for IdlePolicy {
    fn name(&self) -> &'static str {
        "idle"
    }

    fn act(&mut self, _agent: AgentId, _observation: &Observation) -> ActionPair {
        ActionPair::IDLE
    }
}

/// Seeded random actions.
///
/// Uses a linear congruential generator so a seed reproduces the same
/// stream on every platform.
#[derive(Debug, Clone)]
pub struct RandomPolicy {
    state: u64,
}

impl RandomPolicy {
    /// Create a policy from a seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            state: seed.wrapping_add(0x9E37_79B9_7F4A_7C15),
        }
    }

    fn next_index(&mut self) -> u8 {
        self.state = self.state.wrapping_mul(0x5_DEEC_E66D).wrapping_add(11);
        ((self.state >> 17) % 3) as u8
    }
}

impl Policy for RandomPolicy {
    fn name(&self) -> &'static str {
        "random"
    }

    fn act(&mut self, _agent: AgentId, _observation: &Observation) -> ActionPair {
        let movement = self.next_index();
        let turn = self.next_index();
        ActionPair::new(movement, turn).unwrap_or(ActionPair::IDLE)
    }
}

/// Heuristic capture behaviour.
///
/// Without the flag an agent steers at the enemy flag; carrying it, at its
/// own base (or its own flag home when the team has no base).
#[derive(Debug, Clone)]
pub struct ScriptedPolicy {
    home: BTreeMap<AgentId, (f32, f32)>,
}

impl ScriptedPolicy {
    /// Policy for every agent of `team`.
    #[must_use]
    pub fn for_team(scenario: &ScenarioConfig, team: Team) -> Self {
        let layout = scenario.layout(team);
        let target = layout
            .base
            .map(|base| base.center)
            .or(layout.flag)
            .unwrap_or(layout.release);
        let home = layout.agents.iter().map(|spawn| (spawn.id, target)).collect();
        Self { home }
    }

    /// Steer from the observed transform towards `target`.
    fn steer(observation: &Observation, target: (f32, f32)) -> ActionPair {
        let (px, pz) = observation.position();
        let (fx, fz) = observation.forward();
        let (tx, tz) = (target.0 - px, target.1 - pz);
        let length = (tx * tx + tz * tz).sqrt();
        if length <= f32::EPSILON {
            return ActionPair::IDLE;
        }

        // Positive cross product means the target is to the left.
        let sin = (fx * tz - fz * tx) / length;
        let cos = (fx * tx + fz * tz) / length;
        let turn = if cos < 0.0 {
            if sin >= 0.0 {
                TURN_LEFT
            } else {
                TURN_RIGHT
            }
        } else if sin > AIM_TOLERANCE {
            TURN_LEFT
        } else if sin < -AIM_TOLERANCE {
            TURN_RIGHT
        } else {
            STRAIGHT
        };
        ActionPair::new(FORWARD, turn).unwrap_or(ActionPair::IDLE)
    }
}

impl Policy for ScriptedPolicy {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn act(&mut self, agent: AgentId, observation: &Observation) -> ActionPair {
        let target = if observation.is_carrying() {
            match self.home.get(&agent) {
                Some(&home) => home,
                None => return ActionPair::IDLE,
            }
        } else {
            observation.enemy_flag()
        };
        Self::steer(observation, target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observation(position: (f32, f32), forward: (f32, f32), carrying: bool) -> Observation {
        Observation {
            vector: [
                position.0,
                position.1,
                forward.0,
                forward.1,
                if carrying { 1.0 } else { 0.0 },
                0.0,
                -20.0,
                0.0,
                20.0,
                0.0,
            ],
            perception: Vec::new(),
        }
    }

    #[test]
    fn test_scripted_goes_straight_at_aligned_flag() {
        let scenario = ScenarioConfig::standard_2v2();
        let mut policy = ScriptedPolicy::for_team(&scenario, Team::Red);
        let action = policy.act(1, &observation((0.0, 0.0), (1.0, 0.0), false));
        assert_eq!(action, ActionPair::new(FORWARD, STRAIGHT).unwrap());
    }

    #[test]
    fn test_scripted_turns_right_towards_target_on_the_right() {
        let scenario = ScenarioConfig::standard_2v2();
        let mut policy = ScriptedPolicy::for_team(&scenario, Team::Red);
        // Facing +z; the flag at +x is clockwise, i.e. to the right.
        let action = policy.act(1, &observation((0.0, 0.0), (0.0, 1.0), false));
        assert_eq!(action.turn_index(), TURN_RIGHT);
    }

    #[test]
    fn test_scripted_carrier_heads_home() {
        let scenario = ScenarioConfig::standard_2v2();
        let mut policy = ScriptedPolicy::for_team(&scenario, Team::Red);
        // Facing +x while the base is behind on the -x side.
        let action = policy.act(1, &observation((10.0, 6.0), (1.0, 0.0), true));
        assert_ne!(action.turn_index(), STRAIGHT);
        // Facing -x towards the base at (-20, 6).
        let action = policy.act(1, &observation((10.0, 6.0), (-1.0, 0.0), true));
        assert_eq!(action.turn_index(), STRAIGHT);
    }

    #[test]
    fn test_random_policy_is_seeded() {
        let obs = observation((0.0, 0.0), (0.0, 1.0), false);
        let mut a = RandomPolicy::new(5);
        let mut b = RandomPolicy::new(5);
        let first: Vec<_> = (0..64).map(|_| a.act(1, &obs)).collect();
        let second: Vec<_> = (0..64).map(|_| b.act(1, &obs)).collect();
        assert_eq!(first, second);
        assert!(first.iter().any(|action| *action != first[0]));
    }

    #[test]
    fn test_policy_kind_names() {
        assert_eq!(PolicyKind::Scripted.to_string(), "scripted");
        let scenario = ScenarioConfig::standard_2v2();
        assert_eq!(PolicyKind::Idle.build(&scenario, Team::Blue, 0).name(), "idle");
    }
}
