//! # CTF Core
//!
//! Deterministic core of a multi-agent capture-the-flag environment.
//!
//! Two teams of agents act on a fixed timestep. Each agent steals the enemy
//! flag, carries it home to score, and tags intruders on its own half to
//! send them to jail. The core owns match rules, agent state machines and
//! reward shaping; motion integration and overlap detection are delegated to
//! an injected [`world::PhysicsWorld`].
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No randomness
//! - Fixed-point geometry (floats only in exported rewards and observations)
//!
//! ## Crate Structure
//!
//! - [`config`] - Scenario configuration (RON)
//! - [`agent`] - Per-agent controller, actions and observations
//! - [`match_state`] - Score, flags and the episode lifecycle
//! - [`team_reward`] - Group reward aggregation
//! - [`simulation`] - Tick driver
//! - [`arena`] - Reference kinematic physics world
//! - [`replay`] - Episode replay records
//! - [`math`] - Fixed-point math utilities

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod agent;
pub mod arena;
pub mod config;
pub mod error;
pub mod field;
pub mod flag;
pub mod match_state;
pub mod math;
pub mod replay;
pub mod roster;
pub mod simulation;
pub mod team;
pub mod team_reward;
pub mod world;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::agent::{
        ActionPair, AgentController, AgentId, AgentMode, EpisodeEnd, Observation, RewardDelta,
        TickAgent, OBSERVATION_SIZE,
    };
    pub use crate::arena::Arena;
    pub use crate::config::{GroupRewardDelivery, HomeSide, ScenarioConfig};
    pub use crate::error::{CtfError, Result};
    pub use crate::match_state::{EpisodeOutcome, EpisodeSummary, MatchEvent, MatchState};
    pub use crate::math::{Fixed, Vec2Fixed};
    pub use crate::simulation::{CaptureTheFlag, TickOutcome};
    pub use crate::team::{Team, TeamPair};
    pub use crate::world::{PhysicsWorld, ScoreDisplay, Transform};
}
