//! Collaborator interfaces at the edge of the core.
//!
//! The core never integrates motion or detects overlaps itself. A
//! [`PhysicsWorld`] owns every transform, reports contact-begin events and
//! answers ray casts; a [`ScoreDisplay`] optionally receives the scoreboard.

use serde::{Deserialize, Serialize};

use crate::agent::AgentId;
use crate::math::{Fixed, Vec2Fixed};
use crate::team::Team;

/// Position and facing of a body on the ground plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Transform {
    /// World position.
    pub position: Vec2Fixed,
    /// Unit forward vector.
    pub forward: Vec2Fixed,
}

impl Transform {
    /// Create a transform.
    #[must_use]
    pub const fn new(position: Vec2Fixed, forward: Vec2Fixed) -> Self {
        Self { position, forward }
    }
}

/// Motion issued by an agent for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct MotionDelta {
    /// Signed distance along the post-rotation forward vector.
    #[serde(with = "crate::math::fixed_serde")]
    pub translate: Fixed,
    /// Heading after rotation.
    pub forward: Vec2Fixed,
}

/// Semantic category of whatever a ray or contact touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SurfaceCategory {
    /// A non-traversable wall or box.
    Obstacle,
    /// Another agent.
    Agent,
    /// A visible flag.
    Flag,
    /// A base trigger zone.
    Base,
}

impl SurfaceCategory {
    /// All categories in perception encoding order.
    pub const ALL: [Self; 4] = [Self::Obstacle, Self::Agent, Self::Flag, Self::Base];
}

/// What an agent started touching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ContactKind {
    /// A flag of the given team.
    Flag(Team),
    /// Another agent.
    Agent(AgentId),
    /// A base zone of the given team.
    Base(Team),
    /// An obstacle.
    Obstacle,
}

impl ContactKind {
    /// Category of the touched body.
    #[must_use]
    pub const fn category(self) -> SurfaceCategory {
        match self {
            Self::Flag(_) => SurfaceCategory::Flag,
            Self::Agent(_) => SurfaceCategory::Agent,
            Self::Base(_) => SurfaceCategory::Base,
            Self::Obstacle => SurfaceCategory::Obstacle,
        }
    }
}

/// A contact-begin event reported by physics.
///
/// Ordering is by agent first, so sorting a queue gives the deterministic
/// resolution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContactEvent {
    /// The agent that touched something.
    pub agent: AgentId,
    /// What it touched.
    pub other: ContactKind,
}

impl ContactEvent {
    /// Create a contact event.
    #[must_use]
    pub const fn new(agent: AgentId, other: ContactKind) -> Self {
        Self { agent, other }
    }
}

/// A ray cast request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RaycastQuery {
    /// Ray origin.
    pub origin: Vec2Fixed,
    /// Unit direction.
    pub direction: Vec2Fixed,
    /// Maximum hit distance.
    pub max_distance: Fixed,
    /// Agent whose own collider is ignored.
    pub ignore: Option<AgentId>,
    /// Restrict hits to one category.
    pub only: Option<SurfaceCategory>,
}

impl RaycastQuery {
    /// A ray from an agent that only reports obstacles.
    #[must_use]
    pub const fn obstacles_from(
        agent: AgentId,
        origin: Vec2Fixed,
        direction: Vec2Fixed,
        max_distance: Fixed,
    ) -> Self {
        Self {
            origin,
            direction,
            max_distance,
            ignore: Some(agent),
            only: Some(SurfaceCategory::Obstacle),
        }
    }
}

/// Nearest ray hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RayHit {
    /// Distance from the ray origin.
    pub distance: Fixed,
    /// What was hit.
    pub category: SurfaceCategory,
}

/// Physics/collision collaborator.
///
/// Implementations own agent transforms and flag bodies. The core calls these
/// methods synchronously from inside a tick.
pub trait PhysicsWorld {
    /// Current transform of an agent.
    fn transform(&self, agent: AgentId) -> Option<Transform>;

    /// Apply one tick of motion to an agent.
    fn apply_motion(&mut self, agent: AgentId, motion: MotionDelta);

    /// Move an agent without integrating (jail, release, reset).
    fn teleport(&mut self, agent: AgentId, transform: Transform);

    /// Place or hide a team's flag body.
    fn place_flag(&mut self, team: Team, position: Vec2Fixed, visible: bool);

    /// Nearest hit along a ray, if any.
    fn raycast(&self, query: RaycastQuery) -> Option<RayHit>;

    /// Contact-begin events since the previous call.
    fn drain_contacts(&mut self) -> Vec<ContactEvent>;

    /// Ray perception channels for an agent's policy input.
    fn perceive(&self, _agent: AgentId) -> Vec<f32> {
        Vec::new()
    }
}

/// Optional score display collaborator.
pub trait ScoreDisplay {
    /// Show the formatted scoreboard.
    fn show_scores(&mut self, scoreboard: &str);
}
