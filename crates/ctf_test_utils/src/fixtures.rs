//! Test fixtures and helpers.
//!
//! Pre-built scenarios, placement helpers and action streams for
//! consistent testing.

use std::collections::BTreeMap;

use ctf_core::agent::{ActionPair, AgentId};
use ctf_core::arena::Arena;
use ctf_core::config::{AgentSpawn, BaseZone, ScenarioConfig, ShapingRewards, TeamLayout};
use ctf_core::math::Vec2Fixed;
use ctf_core::simulation::CaptureTheFlag;
use ctf_core::team::Team;
use ctf_core::world::{PhysicsWorld, Transform};

/// A fixed-point point from float coordinates.
#[must_use]
pub fn point(x: f32, z: f32) -> Vec2Fixed {
    Vec2Fixed::from_f32(x, z)
}

/// The standard 2v2 field.
#[must_use]
pub fn standard_scenario() -> ScenarioConfig {
    ScenarioConfig::standard_2v2()
}

/// The standard field with every continuous shaping term and the idle
/// penalty switched off, so rewards are exact event sums.
#[must_use]
pub fn unshaped_scenario() -> ScenarioConfig {
    let mut config = ScenarioConfig::standard_2v2();
    config.rewards.shaping = ShapingRewards {
        wall_proximity: 0.0,
        enemy_flag_approach: 0.0,
        carry_home: 0.0,
        defend: 0.0,
        ..ShapingRewards::default()
    };
    config.rewards.individual.idle = 0.0;
    config
}

/// One agent per team on an open field without interior obstacles.
#[must_use]
pub fn duel_scenario() -> ScenarioConfig {
    let mut config = unshaped_scenario();
    config.name = "Duel".to_string();
    config.description = "One agent per team, open field".to_string();
    config.arena.obstacles.clear();
    config.red = TeamLayout {
        agents: vec![AgentSpawn::new(1, (-10.0, 0.0), 90.0)],
        flag: Some((-20.0, 0.0)),
        base: Some(BaseZone::new((-20.0, 6.0), (2.5, 2.5))),
        jail: (-30.0, -20.0),
        release: (-22.0, -12.0),
    };
    config.blue = TeamLayout {
        agents: vec![AgentSpawn::new(2, (10.0, 0.0), 270.0)],
        flag: Some((20.0, 0.0)),
        base: Some(BaseZone::new((20.0, 6.0), (2.5, 2.5))),
        jail: (30.0, -20.0),
        release: (22.0, -12.0),
    };
    config
}

/// A scenario paired with its arena and an initialized core.
#[derive(Debug)]
pub struct Harness {
    /// The scenario the harness was built from.
    pub config: ScenarioConfig,
    /// Reference physics world.
    pub arena: Arena,
    /// The core under test.
    pub game: CaptureTheFlag,
}

impl Harness {
    /// Build the arena and core for `config`.
    ///
    /// # Panics
    ///
    /// Panics if the scenario is rejected.
    #[must_use]
    pub fn new(config: ScenarioConfig) -> Self {
        let mut arena = Arena::from_scenario(&config);
        let game = CaptureTheFlag::new(&config, &mut arena).expect("scenario should be valid");
        // Swallow the contacts agents have at their spawns.
        arena.drain_contacts();
        Self {
            config,
            arena,
            game,
        }
    }

    /// Idle actions for every agent.
    #[must_use]
    pub fn idle_actions(&self) -> BTreeMap<AgentId, ActionPair> {
        uniform_actions(&self.game.agent_ids(), ActionPair::IDLE)
    }

    /// Run one tick with every agent idle.
    ///
    /// # Panics
    ///
    /// Panics if the tick fails.
    pub fn tick_idle(&mut self) -> ctf_core::simulation::TickOutcome {
        let actions = self.idle_actions();
        self.game
            .tick(&mut self.arena, &actions)
            .expect("idle tick should succeed")
    }

    /// Teleport an agent, keeping its heading.
    pub fn place(&mut self, agent: AgentId, position: Vec2Fixed) {
        let forward = self
            .arena
            .transform(agent)
            .map_or(Vec2Fixed::FORWARD, |t| t.forward);
        self.arena.teleport(agent, Transform::new(position, forward));
    }

    /// Home position of a team's flag.
    ///
    /// # Panics
    ///
    /// Panics if the scenario has no flag for `team`.
    #[must_use]
    pub fn flag_home(&self, team: Team) -> Vec2Fixed {
        self.game
            .state()
            .layout()
            .anchors[team]
            .flag_home
            .expect("scenario should have a flag")
    }

    /// Center of a team's base.
    ///
    /// # Panics
    ///
    /// Panics if the scenario has no base for `team`.
    #[must_use]
    pub fn base_center(&self, team: Team) -> Vec2Fixed {
        self.game
            .state()
            .layout()
            .anchors[team]
            .base
            .expect("scenario should have a base")
            .center
    }

    /// Position of an agent.
    ///
    /// # Panics
    ///
    /// Panics if the arena does not know the agent.
    #[must_use]
    pub fn position(&self, agent: AgentId) -> Vec2Fixed {
        self.arena
            .transform(agent)
            .expect("agent should exist")
            .position
    }
}

/// The same action for every listed agent.
#[must_use]
pub fn uniform_actions(ids: &[AgentId], action: ActionPair) -> BTreeMap<AgentId, ActionPair> {
    ids.iter().map(|&id| (id, action)).collect()
}

/// Seeded linear congruential generator for reproducible action streams.
#[derive(Debug, Clone)]
pub struct ActionRng {
    state: u64,
}

impl ActionRng {
    /// Create a generator from a seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            state: seed.wrapping_add(0x9E37_79B9_7F4A_7C15),
        }
    }

    fn next(&mut self) -> u64 {
        self.state = self.state.wrapping_mul(0x5_DEEC_E66D).wrapping_add(11);
        self.state >> 17
    }

    /// A uniformly chosen action.
    pub fn action(&mut self) -> ActionPair {
        let movement = (self.next() % 3) as u8;
        let turn = (self.next() % 3) as u8;
        ActionPair::new(movement, turn).unwrap_or(ActionPair::IDLE)
    }

    /// One tick of random actions for the listed agents.
    pub fn actions(&mut self, ids: &[AgentId]) -> BTreeMap<AgentId, ActionPair> {
        ids.iter().map(|&id| (id, self.action())).collect()
    }
}

/// A reproducible stream of `ticks` action maps.
#[must_use]
pub fn random_action_stream(
    ids: &[AgentId],
    ticks: usize,
    seed: u64,
) -> Vec<BTreeMap<AgentId, ActionPair>> {
    let mut rng = ActionRng::new(seed);
    (0..ticks).map(|_| rng.actions(ids)).collect()
}

/// Absolute tolerance for comparing f32 rewards.
pub const REWARD_EPSILON: f32 = 1e-4;

/// Whether two rewards are equal within [`REWARD_EPSILON`].
#[must_use]
pub fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < REWARD_EPSILON
}

/// Distance between two points as f32.
#[must_use]
pub fn distance(a: Vec2Fixed, b: Vec2Fixed) -> f32 {
    a.distance(b).to_num::<f32>()
}
