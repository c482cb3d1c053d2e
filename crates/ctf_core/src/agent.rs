//! Per-agent control: discrete actions, the Free/Carrying/Jailed state
//! machine, observations and individual reward shaping.
//!
//! An [`AgentController`] never stores its own transform. Position and
//! heading are read from the [`PhysicsWorld`] on demand; the controller only
//! decides what motion to request and which rewards to grant itself.

use serde::{Deserialize, Serialize};

use crate::config::{AgentSpawn, IndividualRewards, ScenarioConfig, ShapingRewards};
use crate::error::{CtfError, Result};
use crate::field::{FieldLayout, TeamAnchors};
use crate::flag::FlagState;
use crate::math::{linear_falloff, Fixed, Rotation, Vec2Fixed};
use crate::team::{Team, TeamPair};
use crate::world::{MotionDelta, PhysicsWorld, RaycastQuery, SurfaceCategory, Transform};

/// Unique identifier for an agent.
pub type AgentId = u64;

/// Number of scalars in the fixed part of an observation.
pub const OBSERVATION_SIZE: usize = 10;

/// One tick of discrete input: a move channel and a turn channel.
///
/// Each channel is an index in `{0, 1, 2}` meaning `{-1, 0, +1}`. For the
/// turn channel `+1` turns right (clockwise from above).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionPair {
    movement: u8,
    turn: u8,
}

impl ActionPair {
    /// Stand still and keep the current heading.
    pub const IDLE: Self = Self { movement: 1, turn: 1 };

    /// Validate and build an action from raw indices.
    pub fn new(movement: u8, turn: u8) -> Result<Self> {
        if movement > 2 {
            return Err(CtfError::InvalidAction {
                channel: "move",
                value: movement,
            });
        }
        if turn > 2 {
            return Err(CtfError::InvalidAction {
                channel: "turn",
                value: turn,
            });
        }
        Ok(Self { movement, turn })
    }

    /// Raw move index.
    #[must_use]
    pub const fn movement_index(self) -> u8 {
        self.movement
    }

    /// Raw turn index.
    #[must_use]
    pub const fn turn_index(self) -> u8 {
        self.turn
    }

    /// Move direction: -1 backwards, 0 none, +1 forwards.
    #[must_use]
    pub const fn move_axis(self) -> i32 {
        self.movement as i32 - 1
    }

    /// Turn direction: -1 left, 0 none, +1 right.
    #[must_use]
    pub const fn turn_axis(self) -> i32 {
        self.turn as i32 - 1
    }

    /// Whether both channels are neutral.
    #[must_use]
    pub const fn is_idle(self) -> bool {
        self.movement == 1 && self.turn == 1
    }
}

impl Default for ActionPair {
    fn default() -> Self {
        Self::IDLE
    }
}

/// Agent state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AgentMode {
    /// Moving freely.
    #[default]
    Free,
    /// Holding the given team's flag.
    CarryingFlag(Team),
    /// Immobilized until the countdown reaches zero.
    Jailed {
        /// Ticks left before release.
        ticks_remaining: u32,
    },
}

/// Policy input for one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Self position (x, z), forward (x, z), carrying flag, team id,
    /// own flag position (x, z), enemy flag position (x, z).
    pub vector: [f32; OBSERVATION_SIZE],
    /// Ray perception channels supplied by physics.
    pub perception: Vec<f32>,
}

impl Observation {
    /// Flatten into one vector: the fixed part followed by perception.
    #[must_use]
    pub fn to_vec(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(OBSERVATION_SIZE + self.perception.len());
        out.extend_from_slice(&self.vector);
        out.extend_from_slice(&self.perception);
        out
    }

    /// Self position.
    #[must_use]
    pub const fn position(&self) -> (f32, f32) {
        (self.vector[0], self.vector[1])
    }

    /// Unit forward vector.
    #[must_use]
    pub const fn forward(&self) -> (f32, f32) {
        (self.vector[2], self.vector[3])
    }

    /// Whether the agent holds a flag.
    #[must_use]
    pub fn is_carrying(&self) -> bool {
        self.vector[4] > 0.5
    }

    /// Own flag position.
    #[must_use]
    pub const fn own_flag(&self) -> (f32, f32) {
        (self.vector[6], self.vector[7])
    }

    /// Enemy flag position.
    #[must_use]
    pub const fn enemy_flag(&self) -> (f32, f32) {
        (self.vector[8], self.vector[9])
    }
}

/// Reward granted to an agent, split by source.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RewardDelta {
    /// Individual and shaping reward.
    pub individual: f32,
    /// Group reward delivered through the team aggregator.
    pub group: f32,
}

impl RewardDelta {
    /// Sum of both parts.
    #[must_use]
    pub fn total(self) -> f32 {
        self.individual + self.group
    }
}

/// Read-only view of match state an agent needs for observing and shaping.
#[derive(Debug, Clone, Copy)]
pub struct FieldView<'a> {
    /// Static geometry.
    pub layout: &'a FieldLayout,
    /// Flag state per team.
    pub flags: &'a TeamPair<Option<FlagState>>,
}

/// Episode-end signal delivered to an agent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpisodeEnd {
    /// Episode index that ended.
    pub episode: u64,
    /// Winning team, `None` on timeout.
    pub winner: Option<Team>,
    /// Reward this agent collected over the episode.
    pub cumulative_reward: f32,
}

/// Per-tick motion constants derived once from configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
struct MotionProfile {
    move_step: Fixed,
    turn_left: Rotation,
    turn_right: Rotation,
    probe_distance: Fixed,
}

impl MotionProfile {
    fn from_config(config: &ScenarioConfig) -> Self {
        let rate = config.rules.tick_rate.max(1) as f32;
        let movement = &config.movement;
        let move_step = Fixed::from_num(movement.move_speed / rate);
        let turn_step = Fixed::from_num(movement.turn_speed / rate);
        let probe_distance = move_step * Fixed::from_num(movement.safety_factor)
            + Fixed::from_num(movement.agent_radius);
        Self {
            move_step,
            turn_left: Rotation::from_degrees(-turn_step),
            turn_right: Rotation::from_degrees(turn_step),
            probe_distance,
        }
    }
}

/// Fixed-point shaping radii and magnitudes.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Shaping {
    magnitudes: ShapingRewards,
    wall_radius: Fixed,
    approach_radius: Fixed,
    carry_home_radius: Fixed,
    defend_radius: Fixed,
}

impl Shaping {
    fn from_config(shaping: ShapingRewards) -> Self {
        Self {
            magnitudes: shaping,
            wall_radius: Fixed::from_num(shaping.wall_radius),
            approach_radius: Fixed::from_num(shaping.approach_radius),
            carry_home_radius: Fixed::from_num(shaping.carry_home_radius),
            defend_radius: Fixed::from_num(shaping.defend_radius),
        }
    }
}

/// Spawn transform for a configured agent.
#[must_use]
pub fn spawn_transform(spawn: &AgentSpawn) -> Transform {
    let heading = Rotation::from_degrees(Fixed::from_num(spawn.heading_degrees));
    Transform::new(
        Vec2Fixed::from_f32(spawn.position.0, spawn.position.1),
        Vec2Fixed::FORWARD.rotate(heading).normalize(),
    )
}

/// Lifecycle hooks the tick driver calls on every agent.
pub trait TickAgent {
    /// Return to the start transform in Free mode with zero episode reward.
    fn reset<W: PhysicsWorld + ?Sized>(&mut self, world: &mut W);

    /// Build the policy input for this tick.
    fn build_observation<W: PhysicsWorld + ?Sized>(
        &self,
        world: &W,
        view: &FieldView<'_>,
    ) -> Result<Observation>;

    /// Apply one action and return the shaping reward it produced.
    fn apply_action<W: PhysicsWorld + ?Sized>(
        &mut self,
        action: ActionPair,
        world: &mut W,
        view: &FieldView<'_>,
    ) -> Result<f32>;
}

/// Controller for one agent.
#[derive(Debug, Clone)]
pub struct AgentController {
    id: AgentId,
    team: Team,
    spawn: Transform,
    jail: Vec2Fixed,
    release: Vec2Fixed,
    base: Option<Vec2Fixed>,
    mode: AgentMode,
    jail_duration: u32,
    motion: MotionProfile,
    rewards: IndividualRewards,
    flag_loss_penalty: f32,
    shaping: Shaping,
    episode_reward: f32,
    pending: RewardDelta,
    episode_end: Option<EpisodeEnd>,
}

impl AgentController {
    /// Create a controller for a configured agent.
    #[must_use]
    pub fn new(
        spawn: &AgentSpawn,
        team: Team,
        config: &ScenarioConfig,
        anchors: &TeamAnchors,
    ) -> Self {
        Self {
            id: spawn.id,
            team,
            spawn: spawn_transform(spawn),
            jail: anchors.jail,
            release: anchors.release,
            base: anchors.base.map(|zone| zone.center),
            mode: AgentMode::Free,
            jail_duration: config.rules.jail_duration_ticks(),
            motion: MotionProfile::from_config(config),
            rewards: config.rewards.individual,
            flag_loss_penalty: config.rewards.flag_loss_penalty(),
            shaping: Shaping::from_config(config.rewards.shaping),
            episode_reward: 0.0,
            pending: RewardDelta::default(),
            episode_end: None,
        }
    }

    /// Agent id.
    #[must_use]
    pub const fn id(&self) -> AgentId {
        self.id
    }

    /// Owning team.
    #[must_use]
    pub const fn team(&self) -> Team {
        self.team
    }

    /// Current mode.
    #[must_use]
    pub const fn mode(&self) -> AgentMode {
        self.mode
    }

    /// Start transform used on reset.
    #[must_use]
    pub const fn spawn(&self) -> Transform {
        self.spawn
    }

    /// Configured jail length in ticks.
    #[must_use]
    pub const fn jail_duration(&self) -> u32 {
        self.jail_duration
    }

    /// Whether the agent is in jail.
    #[must_use]
    pub const fn is_jailed(&self) -> bool {
        matches!(self.mode, AgentMode::Jailed { .. })
    }

    /// Team whose flag the agent carries.
    #[must_use]
    pub const fn carried_flag(&self) -> Option<Team> {
        match self.mode {
            AgentMode::CarryingFlag(team) => Some(team),
            _ => None,
        }
    }

    /// Reward collected this episode, individual and group.
    #[must_use]
    pub const fn episode_reward(&self) -> f32 {
        self.episode_reward
    }

    /// Reward granted since the last [`take_reward`](Self::take_reward).
    #[must_use]
    pub const fn pending_reward(&self) -> RewardDelta {
        self.pending
    }

    /// Take the reward granted since the last call.
    pub fn take_reward(&mut self) -> RewardDelta {
        std::mem::take(&mut self.pending)
    }

    /// Take the episode-end signal, if one arrived.
    pub fn take_episode_end(&mut self) -> Option<EpisodeEnd> {
        self.episode_end.take()
    }

    /// Grant an individual reward.
    pub fn add_reward(&mut self, amount: f32) {
        self.pending.individual += amount;
        self.episode_reward += amount;
    }

    /// Receive a group reward from the team aggregator.
    pub fn receive_group_reward(&mut self, amount: f32) {
        self.pending.group += amount;
        self.episode_reward += amount;
    }

    /// Record that the episode ended. Called before the reset.
    pub fn signal_episode_end(&mut self, episode: u64, winner: Option<Team>) {
        self.episode_end = Some(EpisodeEnd {
            episode,
            winner,
            cumulative_reward: self.episode_reward,
        });
    }

    /// Try to pick up `flag`. Returns whether the agent now carries it.
    ///
    /// Own flags, carried flags and jailed or already-carrying agents are
    /// no-ops.
    pub fn try_pickup(&mut self, flag: &mut FlagState) -> Result<bool> {
        if flag.team() == self.team || flag.is_carried() || self.mode != AgentMode::Free {
            return Ok(false);
        }
        flag.take(self.id)?;
        self.mode = AgentMode::CarryingFlag(flag.team());
        self.add_reward(self.rewards.get_flag);
        tracing::debug!(agent = self.id, flag = %flag.team(), "Flag picked up");
        Ok(true)
    }

    /// Try to score in a base of `base_team`. Returns the captured flag's
    /// team on success.
    pub fn try_score(&mut self, base_team: Team) -> Option<Team> {
        if base_team != self.team {
            return None;
        }
        let flag = self.carried_flag()?;
        self.mode = AgentMode::Free;
        self.add_reward(self.rewards.return_flag);
        Some(flag)
    }

    /// Drop a carried flag on being tagged. Returns the flag's team so the
    /// match can force-return it.
    pub fn release_flag(&mut self) -> Option<Team> {
        let flag = self.carried_flag()?;
        self.mode = AgentMode::Free;
        self.add_reward(self.flag_loss_penalty);
        Some(flag)
    }

    /// Pin the agent at its team jail and start the countdown.
    ///
    /// A carried flag must be released first.
    pub fn enter_jail<W: PhysicsWorld + ?Sized>(&mut self, world: &mut W) -> Result<()> {
        if let Some(flag) = self.carried_flag() {
            return Err(CtfError::InvariantViolation(format!(
                "agent {} jailed while still carrying the {flag} flag",
                self.id
            )));
        }
        let forward = world
            .transform(self.id)
            .map_or(self.spawn.forward, |t| t.forward);
        world.teleport(self.id, Transform::new(self.jail, forward));
        self.mode = AgentMode::Jailed {
            ticks_remaining: self.jail_duration,
        };
        self.add_reward(self.rewards.jailed);
        tracing::debug!(agent = self.id, ticks = self.jail_duration, "Agent jailed");
        Ok(())
    }

    /// Reward for sending an opponent to jail.
    pub fn award_tag(&mut self, target_was_carrying: bool) {
        let amount = if target_was_carrying {
            self.rewards.tag_carrier
        } else {
            self.rewards.tag
        };
        self.add_reward(amount);
    }

    /// Individual penalty for the own flag being stolen.
    pub fn suffer_flag_stolen(&mut self) {
        self.add_reward(self.rewards.flag_stolen);
    }

    fn tick_jail<W: PhysicsWorld + ?Sized>(&mut self, ticks_remaining: u32, world: &mut W) {
        let left = ticks_remaining.saturating_sub(1);
        if left == 0 {
            let forward = world
                .transform(self.id)
                .map_or(self.spawn.forward, |t| t.forward);
            world.teleport(self.id, Transform::new(self.release, forward));
            self.mode = AgentMode::Free;
            tracing::debug!(agent = self.id, "Agent released");
        } else {
            self.mode = AgentMode::Jailed {
                ticks_remaining: left,
            };
        }
    }

    fn shaping_reward<W: PhysicsWorld + ?Sized>(
        &self,
        action: ActionPair,
        after: Transform,
        world: &W,
        view: &FieldView<'_>,
    ) -> f32 {
        let magnitudes = &self.shaping.magnitudes;
        let mut reward = 0.0;

        if action.is_idle() {
            reward += self.rewards.idle;
        }

        let ahead = RaycastQuery::obstacles_from(
            self.id,
            after.position,
            after.forward,
            self.shaping.wall_radius,
        );
        if let Some(hit) = world.raycast(ahead) {
            let falloff = linear_falloff(hit.distance, self.shaping.wall_radius);
            reward += magnitudes.wall_proximity * falloff.to_num::<f32>();
        }

        let territory = &view.layout.territory;
        let position = after.position;
        match self.mode {
            AgentMode::CarryingFlag(_) => {
                if let Some(base) = self.base {
                    let falloff =
                        linear_falloff(position.distance(base), self.shaping.carry_home_radius);
                    reward += magnitudes.carry_home * falloff.to_num::<f32>();
                }
            }
            AgentMode::Free if territory.is_enemy(self.team, position) => {
                if let Some(flag) = &view.flags[self.team.opponent()] {
                    let falloff =
                        linear_falloff(position.distance(flag.position()), self.shaping.approach_radius);
                    reward += magnitudes.enemy_flag_approach * falloff.to_num::<f32>();
                }
            }
            AgentMode::Free => {
                // A carried flag sits on its carrier, so this tracks the thief.
                if let Some(flag) = &view.flags[self.team] {
                    let falloff =
                        linear_falloff(position.distance(flag.position()), self.shaping.defend_radius);
                    reward += magnitudes.defend * falloff.to_num::<f32>();
                }
            }
            AgentMode::Jailed { .. } => {}
        }
        reward
    }
}

impl TickAgent for AgentController {
    fn reset<W: PhysicsWorld + ?Sized>(&mut self, world: &mut W) {
        self.mode = AgentMode::Free;
        self.episode_reward = 0.0;
        world.teleport(self.id, self.spawn);
    }

    fn build_observation<W: PhysicsWorld + ?Sized>(
        &self,
        world: &W,
        view: &FieldView<'_>,
    ) -> Result<Observation> {
        let transform = world
            .transform(self.id)
            .ok_or(CtfError::UnknownAgent(self.id))?;
        let (px, pz) = transform.position.to_f32();
        let (fx, fz) = transform.forward.to_f32();
        let flag_position = |team: Team| {
            view.flags[team]
                .as_ref()
                .map_or((0.0, 0.0), |flag| flag.position().to_f32())
        };
        let (ox, oz) = flag_position(self.team);
        let (ex, ez) = flag_position(self.team.opponent());
        let carrying = if self.carried_flag().is_some() { 1.0 } else { 0.0 };

        Ok(Observation {
            vector: [
                px,
                pz,
                fx,
                fz,
                carrying,
                self.team.observation_id(),
                ox,
                oz,
                ex,
                ez,
            ],
            perception: world.perceive(self.id),
        })
    }

    fn apply_action<W: PhysicsWorld + ?Sized>(
        &mut self,
        action: ActionPair,
        world: &mut W,
        view: &FieldView<'_>,
    ) -> Result<f32> {
        if let AgentMode::Jailed { ticks_remaining } = self.mode {
            self.tick_jail(ticks_remaining, world);
            return Ok(0.0);
        }

        let before = world
            .transform(self.id)
            .ok_or(CtfError::UnknownAgent(self.id))?;

        let forward = match action.turn_axis() {
            -1 => before.forward.rotate(self.motion.turn_left).normalize(),
            1 => before.forward.rotate(self.motion.turn_right).normalize(),
            _ => before.forward,
        };

        let mut translate = self.motion.move_step * Fixed::from_num(action.move_axis());
        if translate != Fixed::ZERO {
            let direction = if translate > Fixed::ZERO { forward } else { -forward };
            let probe = RaycastQuery::obstacles_from(
                self.id,
                before.position,
                direction,
                self.motion.probe_distance,
            );
            if world.raycast(probe).is_some() {
                tracing::trace!(agent = self.id, "Translation blocked by obstacle");
                translate = Fixed::ZERO;
            }
        }

        world.apply_motion(self.id, MotionDelta { translate, forward });

        let after = world
            .transform(self.id)
            .ok_or(CtfError::UnknownAgent(self.id))?;
        let reward = self.shaping_reward(action, after, world, view);
        self.add_reward(reward);
        Ok(reward)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;
    use crate::config::ScenarioConfig;

    fn setup() -> (ScenarioConfig, FieldLayout, Arena) {
        let mut config = ScenarioConfig::standard_2v2();
        config.arena.obstacles.clear();
        let layout = FieldLayout::from_scenario(&config);
        let arena = Arena::from_scenario(&config);
        (config, layout, arena)
    }

    fn controller(config: &ScenarioConfig, layout: &FieldLayout, id: AgentId) -> AgentController {
        let (team, spawn) = Team::ALL
            .iter()
            .find_map(|&team| {
                config
                    .layout(team)
                    .agents
                    .iter()
                    .find(|s| s.id == id)
                    .map(|s| (team, s))
            })
            .unwrap();
        AgentController::new(spawn, team, config, &layout.anchors[team])
    }

    fn no_flags() -> TeamPair<Option<FlagState>> {
        TeamPair::new(None, None)
    }

    #[test]
    fn test_action_pair_validation() {
        assert!(ActionPair::new(0, 2).is_ok());
        assert_eq!(
            ActionPair::new(3, 1),
            Err(CtfError::InvalidAction {
                channel: "move",
                value: 3
            })
        );
        assert_eq!(
            ActionPair::new(1, 9),
            Err(CtfError::InvalidAction {
                channel: "turn",
                value: 9
            })
        );
        let pair = ActionPair::new(2, 0).unwrap();
        assert_eq!(pair.move_axis(), 1);
        assert_eq!(pair.turn_axis(), -1);
        assert!(ActionPair::IDLE.is_idle());
    }

    #[test]
    fn test_spawn_heading_faces_enemy_side() {
        let red = spawn_transform(&AgentSpawn::new(1, (-15.0, 0.0), 90.0));
        assert!(red.forward.x > Fixed::from_num(0.99));
        let blue = spawn_transform(&AgentSpawn::new(3, (15.0, 0.0), 270.0));
        assert!(blue.forward.x < Fixed::from_num(-0.99));
    }

    #[test]
    fn test_forward_move_advances_one_step() {
        let (config, layout, mut arena) = setup();
        let mut agent = controller(&config, &layout, 1);
        agent.reset(&mut arena);
        let flags = no_flags();
        let view = FieldView { layout: &layout, flags: &flags };

        let before = arena.transform(1).unwrap().position;
        agent
            .apply_action(ActionPair::new(2, 1).unwrap(), &mut arena, &view)
            .unwrap();
        let after = arena.transform(1).unwrap().position;
        // 5 units/s at 50 ticks/s.
        let moved = (after.x - before.x).to_num::<f32>();
        assert!((moved - 0.1).abs() < 1e-3, "moved {moved}");
    }

    #[test]
    fn test_translation_blocked_near_wall() {
        let (config, layout, mut arena) = setup();
        let mut agent = controller(&config, &layout, 1);
        // Face the +x boundary wall from just inside it.
        let x = Fixed::from_num(config.arena.half_width) - Fixed::from_num(0.6);
        arena.teleport(1, Transform::new(Vec2Fixed::new(x, Fixed::ZERO), Vec2Fixed::new(Fixed::ONE, Fixed::ZERO)));
        let flags = no_flags();
        let view = FieldView { layout: &layout, flags: &flags };

        agent
            .apply_action(ActionPair::new(2, 1).unwrap(), &mut arena, &view)
            .unwrap();
        assert_eq!(arena.transform(1).unwrap().position.x, x);
    }

    #[test]
    fn test_idle_penalty_applied() {
        let (config, layout, mut arena) = setup();
        let mut agent = controller(&config, &layout, 1);
        agent.reset(&mut arena);
        let flags = no_flags();
        let view = FieldView { layout: &layout, flags: &flags };

        let reward = agent.apply_action(ActionPair::IDLE, &mut arena, &view).unwrap();
        assert!((reward - config.rewards.individual.idle).abs() < 1e-6);
        assert!((agent.take_reward().individual - reward).abs() < 1e-6);
        assert_eq!(agent.take_reward(), RewardDelta::default());
    }

    #[test]
    fn test_jailed_agent_ignores_input_and_is_released() {
        let (mut config, _, _) = setup();
        config.rules.jail_seconds = 0.06;
        let layout = FieldLayout::from_scenario(&config);
        let mut arena = Arena::from_scenario(&config);
        let mut agent = controller(&config, &layout, 1);
        agent.reset(&mut arena);
        let flags = no_flags();
        let view = FieldView { layout: &layout, flags: &flags };

        agent.enter_jail(&mut arena).unwrap();
        assert_eq!(agent.mode(), AgentMode::Jailed { ticks_remaining: 3 });
        let jail = layout.anchors[Team::Red].jail;
        assert_eq!(arena.transform(1).unwrap().position, jail);

        let forward = ActionPair::new(2, 2).unwrap();
        agent.apply_action(forward, &mut arena, &view).unwrap();
        agent.apply_action(forward, &mut arena, &view).unwrap();
        assert_eq!(arena.transform(1).unwrap().position, jail);
        assert_eq!(agent.mode(), AgentMode::Jailed { ticks_remaining: 1 });

        agent.apply_action(forward, &mut arena, &view).unwrap();
        assert_eq!(agent.mode(), AgentMode::Free);
        assert_eq!(
            arena.transform(1).unwrap().position,
            layout.anchors[Team::Red].release
        );
    }

    #[test]
    fn test_pickup_rules() {
        let (config, layout, _) = setup();
        let mut agent = controller(&config, &layout, 1);
        let mut own = FlagState::new(Team::Red, Vec2Fixed::ZERO);
        let mut enemy = FlagState::new(Team::Blue, Vec2Fixed::ZERO);

        assert!(!agent.try_pickup(&mut own).unwrap());
        assert!(agent.try_pickup(&mut enemy).unwrap());
        assert_eq!(agent.carried_flag(), Some(Team::Blue));
        assert!(!enemy.is_visible());

        let mut other = controller(&config, &layout, 2);
        assert!(!other.try_pickup(&mut enemy).unwrap());
        assert_eq!(enemy.carrier(), Some(1));
    }

    #[test]
    fn test_release_flag_applies_loss_penalty() {
        let (config, layout, _) = setup();
        let mut agent = controller(&config, &layout, 1);
        let mut enemy = FlagState::new(Team::Blue, Vec2Fixed::ZERO);
        agent.try_pickup(&mut enemy).unwrap();
        agent.take_reward();

        assert_eq!(agent.release_flag(), Some(Team::Blue));
        assert_eq!(agent.mode(), AgentMode::Free);
        let penalty = agent.take_reward().individual;
        assert!((penalty - config.rewards.flag_loss_penalty()).abs() < 1e-6);
        assert_eq!(agent.release_flag(), None);
    }

    #[test]
    fn test_score_only_in_own_base() {
        let (config, layout, _) = setup();
        let mut agent = controller(&config, &layout, 1);
        assert_eq!(agent.try_score(Team::Red), None);
        let mut enemy = FlagState::new(Team::Blue, Vec2Fixed::ZERO);
        agent.try_pickup(&mut enemy).unwrap();
        assert_eq!(agent.try_score(Team::Blue), None);
        assert_eq!(agent.try_score(Team::Red), Some(Team::Blue));
        assert_eq!(agent.mode(), AgentMode::Free);
    }

    #[test]
    fn test_observation_layout() {
        let (config, layout, mut arena) = setup();
        let mut agent = controller(&config, &layout, 3);
        agent.reset(&mut arena);
        let flags = TeamPair::from_fn(|team| {
            layout.anchors[team]
                .flag_home
                .map(|home| FlagState::new(team, home))
        });
        let view = FieldView { layout: &layout, flags: &flags };

        let obs = agent.build_observation(&arena, &view).unwrap();
        assert_eq!(obs.position(), (15.0, -3.0));
        assert!(!obs.is_carrying());
        assert_eq!(obs.vector[5], Team::Blue.observation_id());
        assert_eq!(obs.own_flag(), (20.0, 0.0));
        assert_eq!(obs.enemy_flag(), (-20.0, 0.0));
        assert_eq!(obs.perception.len(), 25);
        assert_eq!(obs.to_vec().len(), OBSERVATION_SIZE + 25);
    }
}
