//! Flag lifecycle.

use serde::{Deserialize, Serialize};

use crate::agent::AgentId;
use crate::error::{CtfError, Result};
use crate::math::Vec2Fixed;
use crate::team::Team;

/// One team's flag.
///
/// A carried flag is hidden; an uncarried flag is visible at its rest
/// position. At most one agent carries a flag at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlagState {
    team: Team,
    home: Vec2Fixed,
    position: Vec2Fixed,
    carrier: Option<AgentId>,
    visible: bool,
}

impl FlagState {
    /// A flag resting at its home position.
    #[must_use]
    pub const fn new(team: Team, home: Vec2Fixed) -> Self {
        Self {
            team,
            home,
            position: home,
            carrier: None,
            visible: true,
        }
    }

    /// Owning team.
    #[must_use]
    pub const fn team(&self) -> Team {
        self.team
    }

    /// Home position recorded at setup.
    #[must_use]
    pub const fn home(&self) -> Vec2Fixed {
        self.home
    }

    /// Current position (the carrier's position while carried).
    #[must_use]
    pub const fn position(&self) -> Vec2Fixed {
        self.position
    }

    /// Agent currently holding the flag.
    #[must_use]
    pub const fn carrier(&self) -> Option<AgentId> {
        self.carrier
    }

    /// Whether some agent holds the flag.
    #[must_use]
    pub const fn is_carried(&self) -> bool {
        self.carrier.is_some()
    }

    /// Whether the flag is shown in the world.
    #[must_use]
    pub const fn is_visible(&self) -> bool {
        self.visible
    }

    /// Whether the flag sits uncarried at home.
    #[must_use]
    pub fn is_at_home(&self) -> bool {
        !self.is_carried() && self.position == self.home
    }

    /// Hand the flag to `agent` and hide it.
    ///
    /// Taking a flag someone else already holds is an invariant violation;
    /// callers check [`is_carried`](Self::is_carried) first.
    pub fn take(&mut self, agent: AgentId) -> Result<()> {
        if let Some(holder) = self.carrier {
            return Err(CtfError::InvariantViolation(format!(
                "agent {agent} picked up the {} flag already carried by agent {holder}",
                self.team
            )));
        }
        self.carrier = Some(agent);
        self.visible = false;
        Ok(())
    }

    /// Follow the carrier.
    pub fn follow(&mut self, position: Vec2Fixed) {
        if self.is_carried() {
            self.position = position;
        }
    }

    /// Put the flag back at home, visible and uncarried.
    pub fn reset(&mut self) {
        self.position = self.home;
        self.carrier = None;
        self.visible = true;
    }
}
