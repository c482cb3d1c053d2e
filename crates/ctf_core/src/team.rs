//! Team identifiers and per-team storage.

use serde::{Deserialize, Serialize};

/// One of the two sides of the match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Team {
    /// The red team.
    Red,
    /// The blue team.
    Blue,
}

impl Team {
    /// Both teams in a fixed order.
    pub const ALL: [Self; 2] = [Self::Red, Self::Blue];

    /// The other team.
    #[must_use]
    pub const fn opponent(self) -> Self {
        match self {
            Self::Red => Self::Blue,
            Self::Blue => Self::Red,
        }
    }

    /// Stable index into per-team arrays.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Red => 0,
            Self::Blue => 1,
        }
    }

    /// Team identifier as reported in the observation vector.
    #[must_use]
    pub const fn observation_id(self) -> f32 {
        match self {
            Self::Red => 0.0,
            Self::Blue => 1.0,
        }
    }

    /// Get the display name for this team.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Red => "Red",
            Self::Blue => "Blue",
        }
    }
}

impl std::fmt::Display for Team {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A value stored once per team, indexable by [`Team`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TeamPair<T> {
    /// Red team's value.
    pub red: T,
    /// Blue team's value.
    pub blue: T,
}

impl<T> TeamPair<T> {
    /// Create a pair from both values.
    pub const fn new(red: T, blue: T) -> Self {
        Self { red, blue }
    }

    /// Build a pair by calling `f` for each team.
    pub fn from_fn(mut f: impl FnMut(Team) -> T) -> Self {
        Self {
            red: f(Team::Red),
            blue: f(Team::Blue),
        }
    }

    /// Iterate `(team, &value)` in team order.
    pub fn iter(&self) -> impl Iterator<Item = (Team, &T)> {
        [(Team::Red, &self.red), (Team::Blue, &self.blue)].into_iter()
    }

    /// Map each value.
    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> TeamPair<U> {
        TeamPair {
            red: f(self.red),
            blue: f(self.blue),
        }
    }
}

impl<T> std::ops::Index<Team> for TeamPair<T> {
    type Output = T;

    fn index(&self, team: Team) -> &T {
        match team {
            Team::Red => &self.red,
            Team::Blue => &self.blue,
        }
    }
}

impl<T> std::ops::IndexMut<Team> for TeamPair<T> {
    fn index_mut(&mut self, team: Team) -> &mut T {
        match team {
            Team::Red => &mut self.red,
            Team::Blue => &mut self.blue,
        }
    }
}
