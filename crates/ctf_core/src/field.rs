//! Fixed-point field layout: territory, anchors and zones.
//!
//! Built once from [`ScenarioConfig`] so the per-tick code never touches
//! floats.

use serde::{Deserialize, Serialize};

use crate::config::{BaseZone, HomeSide, ScenarioConfig, TerritoryConfig};
use crate::math::{Fixed, Vec2Fixed};
use crate::team::{Team, TeamPair};

/// Axis-aligned rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Zone {
    /// Center point.
    pub center: Vec2Fixed,
    /// Half extents along x and z.
    pub half_extents: Vec2Fixed,
}

impl Zone {
    /// Create a zone from its center and half extents.
    #[must_use]
    pub const fn new(center: Vec2Fixed, half_extents: Vec2Fixed) -> Self {
        Self {
            center,
            half_extents,
        }
    }

    /// Convert a configured base zone.
    #[must_use]
    pub fn from_base(base: &BaseZone) -> Self {
        Self::new(
            Vec2Fixed::from_f32(base.center.0, base.center.1),
            Vec2Fixed::from_f32(base.half_extents.0, base.half_extents.1),
        )
    }

    /// Minimum corner.
    #[must_use]
    pub fn min(&self) -> Vec2Fixed {
        self.center - self.half_extents
    }

    /// Maximum corner.
    #[must_use]
    pub fn max(&self) -> Vec2Fixed {
        self.center + self.half_extents
    }

    /// Whether a circle of `radius` at `point` overlaps the zone.
    #[must_use]
    pub fn overlaps_circle(&self, point: Vec2Fixed, radius: Fixed) -> bool {
        let closest = self.closest_point(point);
        closest.distance_squared(point) < radius * radius
            || (point.x > self.min().x
                && point.x < self.max().x
                && point.y > self.min().y
                && point.y < self.max().y)
    }

    /// Closest point of the zone to `point`.
    #[must_use]
    pub fn closest_point(&self, point: Vec2Fixed) -> Vec2Fixed {
        let min = self.min();
        let max = self.max();
        Vec2Fixed::new(point.x.clamp(min.x, max.x), point.y.clamp(min.y, max.y))
    }
}

/// The dividing line and each team's home side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Territory {
    /// X coordinate of the dividing line.
    #[serde(with = "crate::math::fixed_serde")]
    pub divide_x: Fixed,
    /// Home side per team.
    pub home: TeamPair<HomeSide>,
}

impl Territory {
    /// Convert the configured convention.
    #[must_use]
    pub fn from_config(config: &TerritoryConfig) -> Self {
        Self {
            divide_x: Fixed::from_num(config.divide_x),
            home: TeamPair::new(config.red_home, config.blue_home),
        }
    }

    /// Whether `position` lies strictly on `team`'s home side.
    #[must_use]
    pub fn is_home(&self, team: Team, position: Vec2Fixed) -> bool {
        match self.home[team] {
            HomeSide::Negative => position.x < self.divide_x,
            HomeSide::Positive => position.x > self.divide_x,
        }
    }

    /// Whether `position` counts as enemy territory for `team`.
    ///
    /// A point exactly on the dividing line is enemy territory for both teams.
    #[must_use]
    pub fn is_enemy(&self, team: Team, position: Vec2Fixed) -> bool {
        !self.is_home(team, position)
    }
}

/// Per-team anchor positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TeamAnchors {
    /// Flag home, if the team has a flag.
    pub flag_home: Option<Vec2Fixed>,
    /// Scoring zone, if the team has a base.
    pub base: Option<Zone>,
    /// Jail position.
    pub jail: Vec2Fixed,
    /// Release position.
    pub release: Vec2Fixed,
}

/// All static field geometry the core reasons about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldLayout {
    /// Territory convention.
    pub territory: Territory,
    /// Anchors per team.
    pub anchors: TeamPair<TeamAnchors>,
}

impl FieldLayout {
    /// Build the layout from a scenario.
    #[must_use]
    pub fn from_scenario(config: &ScenarioConfig) -> Self {
        let anchors = TeamPair::from_fn(|team| {
            let layout = config.layout(team);
            TeamAnchors {
                flag_home: layout.flag.map(|(x, z)| Vec2Fixed::from_f32(x, z)),
                base: layout.base.as_ref().map(Zone::from_base),
                jail: Vec2Fixed::from_f32(layout.jail.0, layout.jail.1),
                release: Vec2Fixed::from_f32(layout.release.0, layout.release.1),
            }
        });
        Self {
            territory: Territory::from_config(&config.territory),
            anchors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(x: i32, z: i32) -> Vec2Fixed {
        Vec2Fixed::new(Fixed::from_num(x), Fixed::from_num(z))
    }

    #[test]
    fn test_default_territory_convention() {
        let territory = Territory::from_config(&TerritoryConfig::default());
        assert!(territory.is_home(Team::Red, point(-3, 0)));
        assert!(territory.is_enemy(Team::Red, point(3, 0)));
        assert!(territory.is_home(Team::Blue, point(3, 0)));
        assert!(territory.is_enemy(Team::Blue, point(-3, 0)));
    }

    #[test]
    fn test_dividing_line_is_enemy_for_both() {
        let territory = Territory::from_config(&TerritoryConfig::default());
        assert!(territory.is_enemy(Team::Red, point(0, 5)));
        assert!(territory.is_enemy(Team::Blue, point(0, 5)));
    }

    #[test]
    fn test_flipped_territory_convention() {
        let territory = Territory::from_config(&TerritoryConfig {
            divide_x: 2.0,
            red_home: HomeSide::Positive,
            blue_home: HomeSide::Negative,
        });
        assert!(territory.is_home(Team::Red, point(5, 0)));
        assert!(territory.is_home(Team::Blue, point(1, 0)));
    }

    #[test]
    fn test_zone_overlap() {
        let zone = Zone::new(point(0, 0), point(2, 2));
        assert!(zone.overlaps_circle(point(0, 0), Fixed::from_num(0.5)));
        assert!(zone.overlaps_circle(point(2, 0) + point(0, 0), Fixed::from_num(0.5)));
        assert!(zone.overlaps_circle(
            Vec2Fixed::new(Fixed::from_num(2.4), Fixed::ZERO),
            Fixed::from_num(0.5)
        ));
        assert!(!zone.overlaps_circle(point(3, 0), Fixed::from_num(0.5)));
    }
}
