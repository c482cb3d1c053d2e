//! Agent storage with deterministic iteration.

use std::collections::BTreeMap;

use crate::agent::{AgentController, AgentId};
use crate::error::{CtfError, Result};
use crate::team::Team;

/// Every agent controller in the scenario, keyed and iterated by id.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    agents: BTreeMap<AgentId, AgentController>,
}

impl Roster {
    /// Create an empty roster.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a controller. Ids must be unique.
    pub fn insert(&mut self, agent: AgentController) -> Result<()> {
        let id = agent.id();
        if self.agents.contains_key(&id) {
            return Err(CtfError::InvalidConfig(format!(
                "agent id {id} registered twice"
            )));
        }
        self.agents.insert(id, agent);
        Ok(())
    }

    /// Get an agent by id.
    #[must_use]
    pub fn get(&self, id: AgentId) -> Option<&AgentController> {
        self.agents.get(&id)
    }

    /// Get a mutable agent by id.
    pub fn get_mut(&mut self, id: AgentId) -> Option<&mut AgentController> {
        self.agents.get_mut(&id)
    }

    /// Get an agent or fail with [`CtfError::UnknownAgent`].
    pub fn require(&self, id: AgentId) -> Result<&AgentController> {
        self.get(id).ok_or(CtfError::UnknownAgent(id))
    }

    /// Get a mutable agent or fail with [`CtfError::UnknownAgent`].
    pub fn require_mut(&mut self, id: AgentId) -> Result<&mut AgentController> {
        self.get_mut(id).ok_or(CtfError::UnknownAgent(id))
    }

    /// Ids in ascending order.
    #[must_use]
    pub fn ids(&self) -> Vec<AgentId> {
        self.agents.keys().copied().collect()
    }

    /// Iterate agents in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &AgentController> {
        self.agents.values()
    }

    /// Iterate agents mutably in ascending id order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut AgentController> {
        self.agents.values_mut()
    }

    /// Agents of one team in ascending id order.
    pub fn team(&self, team: Team) -> impl Iterator<Item = &AgentController> {
        self.agents.values().filter(move |a| a.team() == team)
    }

    /// Mutable agents of one team in ascending id order.
    pub fn team_mut(&mut self, team: Team) -> impl Iterator<Item = &mut AgentController> {
        self.agents.values_mut().filter(move |a| a.team() == team)
    }

    /// Number of agents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Whether the roster is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
