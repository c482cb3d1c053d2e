//! Reference kinematic arena.
//!
//! A small deterministic [`PhysicsWorld`] used by tests, benchmarks and the
//! headless runner. Agents and flags are circles, obstacles and bases are
//! axis-aligned boxes, and the field boundary is four walls added from the
//! arena configuration. Motion is applied as requested; the core is
//! responsible for refusing moves into obstacles.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

use crate::agent::{spawn_transform, AgentId};
use crate::config::ScenarioConfig;
use crate::error::Result;
use crate::field::Zone;
use crate::math::{fixed_sqrt, Fixed, Rotation, Vec2Fixed};
use crate::team::{Team, TeamPair};
use crate::world::{
    ContactEvent, ContactKind, MotionDelta, PhysicsWorld, RayHit, RaycastQuery, SurfaceCategory,
    Transform,
};

/// Floats emitted per perception ray: one-hot category plus distance.
pub const CHANNELS_PER_RAY: usize = SurfaceCategory::ALL.len() + 1;

/// A flag body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagBody {
    /// Position.
    pub position: Vec2Fixed,
    /// Whether the flag can be touched and seen.
    pub visible: bool,
}

/// Deterministic fixed-point arena.
#[derive(Debug, Clone)]
pub struct Arena {
    agents: BTreeMap<AgentId, Transform>,
    flags: TeamPair<Option<FlagBody>>,
    bases: TeamPair<Option<Zone>>,
    obstacles: Vec<Zone>,
    agent_radius: Fixed,
    flag_radius: Fixed,
    rays: Vec<Rotation>,
    ray_length: Fixed,
    touching: BTreeSet<ContactEvent>,
}

impl Arena {
    /// Validate `config`, then build its arena.
    pub fn try_from_scenario(config: &ScenarioConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_scenario(config))
    }

    /// Build the arena for a scenario, with agents at their spawns and
    /// flags at home.
    ///
    /// # Panics
    ///
    /// Panics on geometry that [`ScenarioConfig::validate`] rejects.
    #[must_use]
    pub fn from_scenario(config: &ScenarioConfig) -> Self {
        let arena = &config.arena;
        let half_width = Fixed::from_num(arena.half_width);
        let half_depth = Fixed::from_num(arena.half_depth);
        let half_wall = Fixed::from_num(arena.wall_thickness) / Fixed::from_num(2);

        let mut obstacles = vec![
            Zone::new(
                Vec2Fixed::new(Fixed::ZERO, half_depth + half_wall),
                Vec2Fixed::new(half_width + half_wall * 2, half_wall),
            ),
            Zone::new(
                Vec2Fixed::new(Fixed::ZERO, -(half_depth + half_wall)),
                Vec2Fixed::new(half_width + half_wall * 2, half_wall),
            ),
            Zone::new(
                Vec2Fixed::new(half_width + half_wall, Fixed::ZERO),
                Vec2Fixed::new(half_wall, half_depth + half_wall * 2),
            ),
            Zone::new(
                Vec2Fixed::new(-(half_width + half_wall), Fixed::ZERO),
                Vec2Fixed::new(half_wall, half_depth + half_wall * 2),
            ),
        ];
        obstacles.extend(arena.obstacles.iter().map(|o| {
            Zone::new(
                Vec2Fixed::from_f32(o.center.0, o.center.1),
                Vec2Fixed::from_f32(o.half_extents.0, o.half_extents.1),
            )
        }));

        let agents = Team::ALL
            .iter()
            .flat_map(|&team| config.layout(team).agents.iter())
            .map(|spawn| (spawn.id, spawn_transform(spawn)))
            .collect();

        let flags = TeamPair::from_fn(|team| {
            config.layout(team).flag.map(|(x, z)| FlagBody {
                position: Vec2Fixed::from_f32(x, z),
                visible: true,
            })
        });
        let bases = TeamPair::from_fn(|team| config.layout(team).base.as_ref().map(Zone::from_base));

        let perception = arena.perception;
        let rays = ray_fan(perception.rays, perception.spread_degrees);

        Self {
            agents,
            flags,
            bases,
            obstacles,
            agent_radius: Fixed::from_num(config.movement.agent_radius),
            flag_radius: Fixed::from_num(arena.flag_radius),
            rays,
            ray_length: Fixed::from_num(perception.length),
            touching: BTreeSet::new(),
        }
    }

    /// Flag body of a team.
    #[must_use]
    pub fn flag(&self, team: Team) -> Option<FlagBody> {
        self.flags[team]
    }

    /// Every obstacle, boundary walls first.
    #[must_use]
    pub fn obstacles(&self) -> &[Zone] {
        &self.obstacles
    }

    /// Length of the vector returned by [`PhysicsWorld::perceive`].
    #[must_use]
    pub fn perception_len(&self) -> usize {
        self.rays.len() * CHANNELS_PER_RAY
    }

    fn current_contacts(&self) -> BTreeSet<ContactEvent> {
        let mut contacts = BTreeSet::new();
        let agent_reach = self.agent_radius * 2;
        let flag_reach = self.agent_radius + self.flag_radius;

        for (&id, transform) in &self.agents {
            let position = transform.position;

            for (&other, other_transform) in self.agents.range((Bound::Excluded(id), Bound::Unbounded)) {
                if position.distance_squared(other_transform.position) < agent_reach * agent_reach {
                    contacts.insert(ContactEvent::new(id, ContactKind::Agent(other)));
                    contacts.insert(ContactEvent::new(other, ContactKind::Agent(id)));
                }
            }

            for (team, flag) in self.flags.iter() {
                if let Some(flag) = flag {
                    if flag.visible
                        && position.distance_squared(flag.position) < flag_reach * flag_reach
                    {
                        contacts.insert(ContactEvent::new(id, ContactKind::Flag(team)));
                    }
                }
            }

            for (team, base) in self.bases.iter() {
                if base.is_some_and(|zone| zone.overlaps_circle(position, self.agent_radius)) {
                    contacts.insert(ContactEvent::new(id, ContactKind::Base(team)));
                }
            }

            if self
                .obstacles
                .iter()
                .any(|zone| zone.overlaps_circle(position, self.agent_radius))
            {
                contacts.insert(ContactEvent::new(id, ContactKind::Obstacle));
            }
        }
        contacts
    }
}

impl PhysicsWorld for Arena {
    fn transform(&self, agent: AgentId) -> Option<Transform> {
        self.agents.get(&agent).copied()
    }

    fn apply_motion(&mut self, agent: AgentId, motion: MotionDelta) {
        if let Some(transform) = self.agents.get_mut(&agent) {
            transform.forward = motion.forward;
            transform.position = transform.position + motion.forward.scale(motion.translate);
        }
    }

    fn teleport(&mut self, agent: AgentId, transform: Transform) {
        self.agents.insert(agent, transform);
    }

    fn place_flag(&mut self, team: Team, position: Vec2Fixed, visible: bool) {
        if let Some(flag) = self.flags[team].as_mut() {
            flag.position = position;
            flag.visible = visible;
        }
    }

    fn raycast(&self, query: RaycastQuery) -> Option<RayHit> {
        let wants = |category| query.only.map_or(true, |only| only == category);
        let mut best: Option<RayHit> = None;
        let mut consider = |distance: Option<Fixed>, category| {
            if let Some(distance) = distance {
                if distance <= query.max_distance
                    && best.map_or(true, |hit| distance < hit.distance)
                {
                    best = Some(RayHit { distance, category });
                }
            }
        };

        if wants(SurfaceCategory::Obstacle) {
            for zone in &self.obstacles {
                consider(ray_box(query.origin, query.direction, zone), SurfaceCategory::Obstacle);
            }
        }
        if wants(SurfaceCategory::Base) {
            for (_, base) in self.bases.iter() {
                if let Some(zone) = base {
                    consider(ray_box(query.origin, query.direction, zone), SurfaceCategory::Base);
                }
            }
        }
        if wants(SurfaceCategory::Agent) {
            for (&id, transform) in &self.agents {
                if query.ignore == Some(id) {
                    continue;
                }
                consider(
                    ray_circle(query.origin, query.direction, transform.position, self.agent_radius),
                    SurfaceCategory::Agent,
                );
            }
        }
        if wants(SurfaceCategory::Flag) {
            for (_, flag) in self.flags.iter() {
                if let Some(flag) = flag.filter(|f| f.visible) {
                    consider(
                        ray_circle(query.origin, query.direction, flag.position, self.flag_radius),
                        SurfaceCategory::Flag,
                    );
                }
            }
        }
        best
    }

    fn drain_contacts(&mut self) -> Vec<ContactEvent> {
        let current = self.current_contacts();
        let began = current.difference(&self.touching).copied().collect();
        self.touching = current;
        began
    }

    fn perceive(&self, agent: AgentId) -> Vec<f32> {
        let Some(transform) = self.agents.get(&agent) else {
            return Vec::new();
        };
        let mut out = Vec::with_capacity(self.perception_len());
        for &rotation in &self.rays {
            let direction = transform.forward.rotate(rotation).normalize();
            let hit = self.raycast(RaycastQuery {
                origin: transform.position,
                direction,
                max_distance: self.ray_length,
                ignore: Some(agent),
                only: None,
            });
            for category in SurfaceCategory::ALL {
                let on = hit.is_some_and(|h| h.category == category);
                out.push(if on { 1.0 } else { 0.0 });
            }
            let fraction = match hit {
                Some(hit) if self.ray_length > Fixed::ZERO => {
                    (hit.distance / self.ray_length).to_num::<f32>()
                }
                _ => 1.0,
            };
            out.push(fraction);
        }
        out
    }
}

/// Rotations for `count` rays spread evenly over `spread_degrees`, centered
/// on the heading.
fn ray_fan(count: u32, spread_degrees: f32) -> Vec<Rotation> {
    match count {
        0 => Vec::new(),
        1 => vec![Rotation::IDENTITY],
        _ => {
            let spread = Fixed::from_num(spread_degrees);
            let step = spread / Fixed::from_num(count - 1);
            let start = -(spread / Fixed::from_num(2));
            (0..count)
                .map(|i| Rotation::from_degrees(start + step * Fixed::from_num(i)))
                .collect()
        }
    }
}

/// Entry distance of a ray into an axis-aligned box (0 if it starts inside).
fn ray_box(origin: Vec2Fixed, direction: Vec2Fixed, zone: &Zone) -> Option<Fixed> {
    let min = zone.min();
    let max = zone.max();
    let mut near = Fixed::MIN;
    let mut far = Fixed::MAX;

    for (o, d, lo, hi) in [
        (origin.x, direction.x, min.x, max.x),
        (origin.y, direction.y, min.y, max.y),
    ] {
        if d == Fixed::ZERO {
            if o < lo || o > hi {
                return None;
            }
            continue;
        }
        let mut t1 = (lo - o).saturating_div(d);
        let mut t2 = (hi - o).saturating_div(d);
        if t1 > t2 {
            std::mem::swap(&mut t1, &mut t2);
        }
        near = near.max(t1);
        far = far.min(t2);
    }

    let entry = near.max(Fixed::ZERO);
    if far < entry {
        None
    } else {
        Some(entry)
    }
}

/// Entry distance of a ray into a circle (0 if it starts inside).
fn ray_circle(origin: Vec2Fixed, direction: Vec2Fixed, center: Vec2Fixed, radius: Fixed) -> Option<Fixed> {
    let offset = origin - center;
    let b = offset.dot(direction);
    let c = offset.dot(offset) - radius * radius;
    if c <= Fixed::ZERO {
        return Some(Fixed::ZERO);
    }
    if b > Fixed::ZERO {
        return None;
    }
    let discriminant = b * b - c;
    if discriminant < Fixed::ZERO {
        return None;
    }
    Some((-b - fixed_sqrt(discriminant)).max(Fixed::ZERO))
}
