//! Group reward bookkeeping for cooperative credit assignment.
//!
//! Each team has one [`TeamRewardAggregator`]. The match issues team-level
//! rewards into it; the aggregator either holds them until the episode ends
//! or injects them straight into every registered member.

use serde::{Deserialize, Serialize};

use crate::agent::AgentId;
use crate::roster::Roster;
use crate::team::Team;

/// Pending and delivered group reward for one team.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamRewardAggregator {
    team: Team,
    members: Vec<AgentId>,
    pending: f32,
    episode_total: f32,
    tick_delta: f32,
}

impl TeamRewardAggregator {
    /// Create an empty aggregator for `team`.
    #[must_use]
    pub const fn new(team: Team) -> Self {
        Self {
            team,
            members: Vec::new(),
            pending: 0.0,
            episode_total: 0.0,
            tick_delta: 0.0,
        }
    }

    /// Team this aggregator serves.
    #[must_use]
    pub const fn team(&self) -> Team {
        self.team
    }

    /// Register an agent to receive this team's group rewards.
    ///
    /// Registering twice has no effect.
    pub fn register(&mut self, agent: AgentId) {
        if let Err(slot) = self.members.binary_search(&agent) {
            self.members.insert(slot, agent);
        }
    }

    /// Stop delivering to an agent. Returns whether it was registered.
    pub fn unregister(&mut self, agent: AgentId) -> bool {
        match self.members.binary_search(&agent) {
            Ok(slot) => {
                self.members.remove(slot);
                true
            }
            Err(_) => false,
        }
    }

    /// Registered agents in ascending id order.
    #[must_use]
    pub fn members(&self) -> &[AgentId] {
        &self.members
    }

    /// Accumulate a group reward for delivery at episode end.
    pub fn add_group_reward(&mut self, amount: f32) {
        self.pending += amount;
        self.episode_total += amount;
        self.tick_delta += amount;
    }

    /// Deliver a group reward to every registered member now.
    pub fn inject(&mut self, amount: f32, roster: &mut Roster) {
        self.deliver(amount, roster);
        self.episode_total += amount;
        self.tick_delta += amount;
    }

    /// Deliver everything pending and clear it. Returns the delivered amount.
    pub fn flush(&mut self, roster: &mut Roster) -> f32 {
        let amount = std::mem::take(&mut self.pending);
        if amount != 0.0 {
            self.deliver(amount, roster);
        }
        amount
    }

    /// Reward accumulated but not yet delivered.
    #[must_use]
    pub const fn pending(&self) -> f32 {
        self.pending
    }

    /// All group reward issued this episode, delivered or not.
    #[must_use]
    pub const fn episode_total(&self) -> f32 {
        self.episode_total
    }

    /// Group reward issued since the last call.
    pub fn take_tick_delta(&mut self) -> f32 {
        std::mem::take(&mut self.tick_delta)
    }

    /// Forget the episode total at reset. Pending reward must already have
    /// been flushed.
    pub fn begin_episode(&mut self) {
        self.pending = 0.0;
        self.episode_total = 0.0;
    }

    fn deliver(&self, amount: f32, roster: &mut Roster) {
        for &id in &self.members {
            match roster.get_mut(id) {
                Some(agent) => agent.receive_group_reward(amount),
                None => tracing::warn!(
                    team = %self.team,
                    agent = id,
                    "Group reward member is not in the roster"
                ),
            }
        }
    }
}
