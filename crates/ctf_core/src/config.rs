//! Scenario configuration.
//!
//! Pure data structures that describe one capture-the-flag scenario: team
//! rosters and anchor positions, match rules, movement constants, every reward
//! magnitude, the territory convention and the arena geometry. All structs
//! deserialize from RON; optional sections fall back to the standard field.
//!
//! **Note:** This module contains no IO. File loading is handled by
//! `ctf_headless`.
//!
//! # Example RON
//!
//! ```ron
//! ScenarioConfig(
//!     name: "Narrow field",
//!     rules: (score_to_win: 1, max_steps: 2000),
//!     red: (
//!         agents: [(id: 1, position: (-10.0, 0.0), heading_degrees: 90.0)],
//!         flag: Some((-20.0, 0.0)),
//!         base: Some((center: (-20.0, 6.0), half_extents: (2.5, 2.5))),
//!         jail: (-30.0, -20.0),
//!         release: (-22.0, -12.0),
//!     ),
//!     blue: (
//!         agents: [(id: 2, position: (10.0, 0.0), heading_degrees: 270.0)],
//!         flag: Some((20.0, 0.0)),
//!         base: Some((center: (20.0, 6.0), half_extents: (2.5, 2.5))),
//!         jail: (30.0, -20.0),
//!         release: (22.0, -12.0),
//!     ),
//! )
//! ```

use serde::{Deserialize, Serialize};

use crate::agent::AgentId;
use crate::error::{CtfError, Result};
use crate::team::Team;

/// A point on the ground plane as `(x, z)`.
pub type Point = (f32, f32);

/// A complete scenario definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Win/timeout rules and tick rate.
    #[serde(default)]
    pub rules: MatchRules,
    /// Agent movement constants.
    #[serde(default)]
    pub movement: MovementConfig,
    /// Every reward magnitude.
    #[serde(default)]
    pub rewards: RewardConfig,
    /// Which side of the dividing line each team calls home.
    #[serde(default)]
    pub territory: TerritoryConfig,
    /// Red team layout.
    pub red: TeamLayout,
    /// Blue team layout.
    pub blue: TeamLayout,
    /// Geometry for the reference kinematic arena.
    #[serde(default)]
    pub arena: ArenaConfig,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self::standard_2v2()
    }
}

impl ScenarioConfig {
    /// The standard two-versus-two field.
    ///
    /// Red defends the `x < 0` half, Blue the `x > 0` half. Flags sit near the
    /// back walls with the scoring bases just beside them; jails are outside
    /// the playable walls so jailed agents cannot be touched.
    #[must_use]
    pub fn standard_2v2() -> Self {
        Self {
            name: "Standard 2v2".to_string(),
            description: "Two agents per team on a 50x30 field".to_string(),
            rules: MatchRules::default(),
            movement: MovementConfig::default(),
            rewards: RewardConfig::default(),
            territory: TerritoryConfig::default(),
            red: TeamLayout {
                agents: vec![
                    AgentSpawn::new(1, (-15.0, -3.0), 90.0),
                    AgentSpawn::new(2, (-15.0, 3.0), 90.0),
                ],
                flag: Some((-20.0, 0.0)),
                base: Some(BaseZone::new((-20.0, 6.0), (2.5, 2.5))),
                jail: (-30.0, -20.0),
                release: (-22.0, -12.0),
            },
            blue: TeamLayout {
                agents: vec![
                    AgentSpawn::new(3, (15.0, -3.0), 270.0),
                    AgentSpawn::new(4, (15.0, 3.0), 270.0),
                ],
                flag: Some((20.0, 0.0)),
                base: Some(BaseZone::new((20.0, 6.0), (2.5, 2.5))),
                jail: (30.0, -20.0),
                release: (22.0, -12.0),
            },
            arena: ArenaConfig::default(),
        }
    }

    /// Layout for one team.
    #[must_use]
    pub fn layout(&self, team: Team) -> &TeamLayout {
        match team {
            Team::Red => &self.red,
            Team::Blue => &self.blue,
        }
    }

    /// Check the configuration for values the core cannot run with.
    ///
    /// Missing flags or bases are *not* errors; those features stay inert.
    pub fn validate(&self) -> Result<()> {
        if self.rules.score_to_win == 0 {
            return Err(CtfError::InvalidConfig(
                "score_to_win must be at least 1".to_string(),
            ));
        }
        if self.rules.max_steps == 0 {
            return Err(CtfError::InvalidConfig(
                "max_steps must be at least 1".to_string(),
            ));
        }
        if self.rules.tick_rate == 0 {
            return Err(CtfError::InvalidConfig(
                "tick_rate must be at least 1".to_string(),
            ));
        }
        if !(self.rules.jail_seconds > 0.0) {
            return Err(CtfError::InvalidConfig(format!(
                "jail_seconds must be positive, got {}",
                self.rules.jail_seconds
            )));
        }
        check_magnitude("rules.jail_seconds", self.rules.jail_seconds)?;
        self.validate_geometry()?;
        self.validate_rewards()?;
        if self.territory.red_home == self.territory.blue_home {
            return Err(CtfError::InvalidConfig(
                "red and blue must defend opposite sides of the dividing line".to_string(),
            ));
        }

        let mut ids: Vec<AgentId> = self
            .red
            .agents
            .iter()
            .chain(&self.blue.agents)
            .map(|spawn| spawn.id)
            .collect();
        ids.sort_unstable();
        if let Some(pair) = ids.windows(2).find(|w| w[0] == w[1]) {
            return Err(CtfError::InvalidConfig(format!(
                "agent id {} is used more than once",
                pair[0]
            )));
        }
        Ok(())
    }

    /// Every length, position and angle must convert into fixed-point.
    fn validate_geometry(&self) -> Result<()> {
        let movement = &self.movement;
        check_non_negative("movement.move_speed", movement.move_speed)?;
        check_non_negative("movement.turn_speed", movement.turn_speed)?;
        check_non_negative("movement.agent_radius", movement.agent_radius)?;
        check_non_negative("movement.safety_factor", movement.safety_factor)?;
        check_magnitude("territory.divide_x", self.territory.divide_x)?;

        for (team, layout) in [("red", &self.red), ("blue", &self.blue)] {
            for spawn in &layout.agents {
                check_point(&format!("{team} agent {} position", spawn.id), spawn.position)?;
                check_magnitude(
                    &format!("{team} agent {} heading", spawn.id),
                    spawn.heading_degrees,
                )?;
            }
            if let Some(flag) = layout.flag {
                check_point(&format!("{team}.flag"), flag)?;
            }
            if let Some(base) = layout.base {
                check_point(&format!("{team}.base.center"), base.center)?;
                check_extents(&format!("{team}.base.half_extents"), base.half_extents)?;
            }
            check_point(&format!("{team}.jail"), layout.jail)?;
            check_point(&format!("{team}.release"), layout.release)?;
        }

        let arena = &self.arena;
        check_non_negative("arena.half_width", arena.half_width)?;
        check_non_negative("arena.half_depth", arena.half_depth)?;
        check_non_negative("arena.wall_thickness", arena.wall_thickness)?;
        check_non_negative("arena.flag_radius", arena.flag_radius)?;
        for (i, obstacle) in arena.obstacles.iter().enumerate() {
            check_point(&format!("arena.obstacles[{i}].center"), obstacle.center)?;
            check_extents(
                &format!("arena.obstacles[{i}].half_extents"),
                obstacle.half_extents,
            )?;
        }
        check_non_negative("arena.perception.spread_degrees", arena.perception.spread_degrees)?;
        check_non_negative("arena.perception.length", arena.perception.length)?;

        let shaping = &self.rewards.shaping;
        check_non_negative("rewards.shaping.wall_radius", shaping.wall_radius)?;
        check_non_negative("rewards.shaping.approach_radius", shaping.approach_radius)?;
        check_non_negative("rewards.shaping.carry_home_radius", shaping.carry_home_radius)?;
        check_non_negative("rewards.shaping.defend_radius", shaping.defend_radius)?;
        Ok(())
    }

    fn validate_rewards(&self) -> Result<()> {
        let individual = &self.rewards.individual;
        let group = &self.rewards.group;
        let shaping = &self.rewards.shaping;
        let magnitudes = [
            ("rewards.individual.get_flag", individual.get_flag),
            ("rewards.individual.return_flag", individual.return_flag),
            ("rewards.individual.tag", individual.tag),
            ("rewards.individual.tag_carrier", individual.tag_carrier),
            ("rewards.individual.jailed", individual.jailed),
            ("rewards.individual.flag_stolen", individual.flag_stolen),
            ("rewards.individual.idle", individual.idle),
            ("rewards.group.flag_pickup", group.flag_pickup),
            ("rewards.group.score", group.score),
            ("rewards.group.scored_against", group.scored_against),
            ("rewards.group.win", group.win),
            ("rewards.group.tag", group.tag),
            ("rewards.group.tag_carrier", group.tag_carrier),
            ("rewards.group.tag_carrier_penalty", group.tag_carrier_penalty),
            ("rewards.shaping.wall_proximity", shaping.wall_proximity),
            ("rewards.shaping.enemy_flag_approach", shaping.enemy_flag_approach),
            ("rewards.shaping.carry_home", shaping.carry_home),
            ("rewards.shaping.defend", shaping.defend),
        ];
        for (what, value) in magnitudes {
            if !value.is_finite() {
                return Err(CtfError::InvalidConfig(format!(
                    "{what} must be finite, got {value}"
                )));
            }
        }
        Ok(())
    }

    /// Parse a scenario from RON text.
    pub fn from_ron_str(ron: &str) -> Result<Self> {
        ron::from_str(ron).map_err(|e| CtfError::InvalidConfig(e.to_string()))
    }

    /// Render the scenario as pretty-printed RON.
    pub fn to_ron_string(&self) -> Result<String> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| CtfError::Serialization(e.to_string()))
    }
}

/// Largest magnitude accepted for any configured length, position, speed or
/// angle. Keeps squared distances inside the fixed-point range.
pub const MAX_CONFIG_MAGNITUDE: f32 = 10_000.0;

fn check_magnitude(what: &str, value: f32) -> Result<()> {
    if value.is_finite() && value.abs() <= MAX_CONFIG_MAGNITUDE {
        Ok(())
    } else {
        Err(CtfError::InvalidConfig(format!(
            "{what} must be finite and within {MAX_CONFIG_MAGNITUDE} of zero, got {value}"
        )))
    }
}

fn check_non_negative(what: &str, value: f32) -> Result<()> {
    check_magnitude(what, value)?;
    if value < 0.0 {
        return Err(CtfError::InvalidConfig(format!(
            "{what} must not be negative, got {value}"
        )));
    }
    Ok(())
}

fn check_point(what: &str, point: Point) -> Result<()> {
    check_magnitude(what, point.0)?;
    check_magnitude(what, point.1)
}

fn check_extents(what: &str, extents: Point) -> Result<()> {
    check_non_negative(what, extents.0)?;
    check_non_negative(what, extents.1)
}

/// How group rewards issued by the match reach agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GroupRewardDelivery {
    /// Accumulate and deliver at episode end.
    #[default]
    Deferred,
    /// Deliver to every registered member as soon as it is issued.
    Immediate,
}

/// Episode rules.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchRules {
    /// Captures needed to win an episode.
    pub score_to_win: u32,
    /// Episode length limit in ticks.
    pub max_steps: u64,
    /// Simulation ticks per second.
    pub tick_rate: u32,
    /// Jail duration in seconds.
    pub jail_seconds: f32,
    /// Group reward delivery mode.
    pub group_reward_delivery: GroupRewardDelivery,
}

impl Default for MatchRules {
    fn default() -> Self {
        Self {
            score_to_win: 3,
            max_steps: 10_000,
            tick_rate: 50,
            jail_seconds: 10.0,
            group_reward_delivery: GroupRewardDelivery::Deferred,
        }
    }
}

impl MatchRules {
    /// Jail duration converted to ticks (at least one).
    #[must_use]
    pub fn jail_duration_ticks(&self) -> u32 {
        let ticks = (self.jail_seconds * self.tick_rate as f32).round();
        if ticks < 1.0 {
            1
        } else {
            ticks as u32
        }
    }
}

/// Agent movement constants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementConfig {
    /// Forward speed in world units per second.
    pub move_speed: f32,
    /// Turn speed in degrees per second.
    pub turn_speed: f32,
    /// Agent collider radius.
    pub agent_radius: f32,
    /// Obstacle look-ahead as a multiple of the per-tick step.
    pub safety_factor: f32,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            move_speed: 5.0,
            turn_speed: 100.0,
            agent_radius: 0.5,
            safety_factor: 2.0,
        }
    }
}

/// All reward magnitudes.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardConfig {
    /// Rewards granted to a single agent.
    pub individual: IndividualRewards,
    /// Rewards issued to a whole team through its aggregator.
    pub group: GroupRewards,
    /// Continuous per-tick shaping.
    pub shaping: ShapingRewards,
}

impl RewardConfig {
    /// Penalty for losing a carried flag to a tag: the negative of the
    /// group pickup reward.
    #[must_use]
    pub fn flag_loss_penalty(&self) -> f32 {
        -self.group.flag_pickup
    }
}

/// Rewards granted to a single agent on discrete events.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndividualRewards {
    /// Picking up the enemy flag.
    pub get_flag: f32,
    /// Bringing the enemy flag home.
    pub return_flag: f32,
    /// Sending an opponent to jail.
    pub tag: f32,
    /// Sending a flag-carrying opponent to jail.
    pub tag_carrier: f32,
    /// Being sent to jail.
    pub jailed: f32,
    /// Applied to each member of a team whose flag was just stolen.
    pub flag_stolen: f32,
    /// No translation and no rotation input this tick.
    pub idle: f32,
}

impl Default for IndividualRewards {
    fn default() -> Self {
        Self {
            get_flag: 0.5,
            return_flag: 1.0,
            tag: 0.2,
            tag_carrier: 0.5,
            jailed: -0.2,
            flag_stolen: -0.5,
            idle: -0.01,
        }
    }
}

/// Team-level rewards issued by the match.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupRewards {
    /// Capturing team gains this, victim team loses it.
    pub flag_pickup: f32,
    /// Scoring team.
    pub score: f32,
    /// Team that was scored against.
    pub scored_against: f32,
    /// Winner gains, loser loses.
    pub win: f32,
    /// Tagging team, target not carrying.
    pub tag: f32,
    /// Tagging team, target carrying a flag.
    pub tag_carrier: f32,
    /// Tagged team when its carrier was caught.
    pub tag_carrier_penalty: f32,
}

impl Default for GroupRewards {
    fn default() -> Self {
        Self {
            flag_pickup: 0.3,
            score: 1.0,
            scored_against: -0.5,
            win: 2.0,
            tag: 0.1,
            tag_carrier: 0.3,
            tag_carrier_penalty: -0.1,
        }
    }
}

/// Continuous shaping magnitudes. Every distance term falls off linearly
/// to zero at its radius.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShapingRewards {
    /// Scaled by proximity to an obstacle hit by the forward ray.
    pub wall_proximity: f32,
    /// Radius for the wall term.
    pub wall_radius: f32,
    /// Scaled by proximity to the enemy flag while raiding.
    pub enemy_flag_approach: f32,
    /// Radius for the raid term.
    pub approach_radius: f32,
    /// Scaled by proximity to the own base while carrying.
    pub carry_home: f32,
    /// Radius for the carry term.
    pub carry_home_radius: f32,
    /// Scaled by proximity to the enemy carrier, or the own flag, while defending.
    pub defend: f32,
    /// Radius for the defend term.
    pub defend_radius: f32,
}

impl Default for ShapingRewards {
    fn default() -> Self {
        Self {
            wall_proximity: -0.005,
            wall_radius: 2.0,
            enemy_flag_approach: 0.001,
            approach_radius: 20.0,
            carry_home: 0.003,
            carry_home_radius: 45.0,
            defend: 0.0005,
            defend_radius: 15.0,
        }
    }
}

/// Which side of the dividing line is home.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HomeSide {
    /// `x < divide_x`.
    Negative,
    /// `x > divide_x`.
    Positive,
}

/// Territory convention: a dividing line at `x = divide_x` and a home side
/// per team.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerritoryConfig {
    /// X coordinate of the dividing line.
    pub divide_x: f32,
    /// Red team's home side.
    pub red_home: HomeSide,
    /// Blue team's home side.
    pub blue_home: HomeSide,
}

impl Default for TerritoryConfig {
    fn default() -> Self {
        Self {
            divide_x: 0.0,
            red_home: HomeSide::Negative,
            blue_home: HomeSide::Positive,
        }
    }
}

/// Starting transform of one agent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AgentSpawn {
    /// Agent identifier, unique across both teams.
    pub id: AgentId,
    /// Start position.
    pub position: Point,
    /// Start heading in degrees, 0 = +z, 90 = +x.
    #[serde(default)]
    pub heading_degrees: f32,
}

impl AgentSpawn {
    /// Create a new spawn entry.
    #[must_use]
    pub const fn new(id: AgentId, position: Point, heading_degrees: f32) -> Self {
        Self {
            id,
            position,
            heading_degrees,
        }
    }
}

/// Axis-aligned base trigger zone.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaseZone {
    /// Zone center.
    pub center: Point,
    /// Half width along x and half depth along z.
    pub half_extents: Point,
}

impl BaseZone {
    /// Create a new base zone.
    #[must_use]
    pub const fn new(center: Point, half_extents: Point) -> Self {
        Self {
            center,
            half_extents,
        }
    }
}

/// Everything placed on the field for one team.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamLayout {
    /// Team roster.
    pub agents: Vec<AgentSpawn>,
    /// Flag home position; `None` leaves the flag out of the scenario.
    #[serde(default)]
    pub flag: Option<Point>,
    /// Scoring base; `None` disables scoring for this team.
    #[serde(default)]
    pub base: Option<BaseZone>,
    /// Where jailed agents are held.
    pub jail: Point,
    /// Where agents reappear when released.
    pub release: Point,
}

/// Reference arena geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    /// Playable half width (x).
    pub half_width: f32,
    /// Playable half depth (z).
    pub half_depth: f32,
    /// Thickness of the boundary walls.
    pub wall_thickness: f32,
    /// Flag pickup radius.
    pub flag_radius: f32,
    /// Interior obstacles.
    pub obstacles: Vec<ObstacleConfig>,
    /// Ray perception layout.
    pub perception: PerceptionConfig,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            half_width: 25.0,
            half_depth: 15.0,
            wall_thickness: 1.0,
            flag_radius: 0.5,
            obstacles: vec![
                ObstacleConfig::new((0.0, 8.0), (1.0, 2.0)),
                ObstacleConfig::new((0.0, -8.0), (1.0, 2.0)),
            ],
            perception: PerceptionConfig::default(),
        }
    }
}

/// Axis-aligned box obstacle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObstacleConfig {
    /// Box center.
    pub center: Point,
    /// Half extents along x and z.
    pub half_extents: Point,
}

impl ObstacleConfig {
    /// Create a new obstacle.
    #[must_use]
    pub const fn new(center: Point, half_extents: Point) -> Self {
        Self {
            center,
            half_extents,
        }
    }
}

/// Fan of perception rays around the agent heading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerceptionConfig {
    /// Number of rays.
    pub rays: u32,
    /// Total spread in degrees.
    pub spread_degrees: f32,
    /// Ray length.
    pub length: f32,
}

impl Default for PerceptionConfig {
    fn default() -> Self {
        Self {
            rays: 5,
            spread_degrees: 120.0,
            length: 20.0,
        }
    }
}
