//! Tick driver.
//!
//! [`CaptureTheFlag`] owns the match state and every agent controller and
//! advances them one fixed step at a time against an injected
//! [`PhysicsWorld`].
//!
//! # Determinism
//!
//! - Agents act in ascending [`AgentId`] order
//! - Contacts are sorted and deduplicated before resolution
//! - All geometry is fixed-point; floats only appear in rewards and
//!   observations handed out to policies
//! - Same scenario and same action stream always produce the same
//!   [`state_hash`](CaptureTheFlag::state_hash) sequence
//!
//! # Example
//!
//! ```
//! use std::collections::BTreeMap;
//!
//! use ctf_core::agent::ActionPair;
//! use ctf_core::arena::Arena;
//! use ctf_core::config::ScenarioConfig;
//! use ctf_core::simulation::CaptureTheFlag;
//!
//! let config = ScenarioConfig::standard_2v2();
//! let mut arena = Arena::from_scenario(&config);
//! let mut game = CaptureTheFlag::new(&config, &mut arena).unwrap();
//!
//! let actions: BTreeMap<_, _> = game
//!     .agent_ids()
//!     .into_iter()
//!     .map(|id| (id, ActionPair::IDLE))
//!     .collect();
//! let outcome = game.tick(&mut arena, &actions).unwrap();
//! assert_eq!(outcome.step, 1);
//! ```

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use crate::agent::{ActionPair, AgentController, AgentId, EpisodeEnd, Observation, RewardDelta, TickAgent};
use crate::config::ScenarioConfig;
use crate::error::{CtfError, Result};
use crate::match_state::{EpisodeSummary, MatchEvent, MatchState};
use crate::roster::Roster;
use crate::team::{Team, TeamPair};
use crate::world::{ContactEvent, ContactKind, PhysicsWorld, ScoreDisplay};

/// Everything a tick produced for the policy layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickOutcome {
    /// Step counter after the tick (0 right after an episode reset).
    pub step: u64,
    /// Reward granted to each agent this tick.
    pub rewards: BTreeMap<AgentId, RewardDelta>,
    /// Group reward issued per team this tick.
    pub group_rewards: TeamPair<f32>,
    /// Match events in the order they happened.
    pub events: Vec<MatchEvent>,
    /// Set when an episode ended during this tick.
    pub episode_end: Option<EpisodeSummary>,
    /// Per-agent episode-end signals.
    pub agent_ends: BTreeMap<AgentId, EpisodeEnd>,
}

impl TickOutcome {
    /// Whether an episode ended this tick.
    #[must_use]
    pub const fn episode_ended(&self) -> bool {
        self.episode_end.is_some()
    }

    /// Total reward granted to one agent this tick.
    #[must_use]
    pub fn reward(&self, agent: AgentId) -> f32 {
        self.rewards.get(&agent).map_or(0.0, |r| r.total())
    }
}

/// The capture-the-flag core.
pub struct CaptureTheFlag {
    state: MatchState,
    roster: Roster,
    display: Option<Box<dyn ScoreDisplay>>,
}

impl std::fmt::Debug for CaptureTheFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureTheFlag")
            .field("state", &self.state)
            .field("roster", &self.roster)
            .field("display", &self.display.is_some())
            .finish()
    }
}

impl CaptureTheFlag {
    /// Validate the scenario, build the match and every agent, and run the
    /// initial reset against `world`.
    pub fn new<W: PhysicsWorld + ?Sized>(config: &ScenarioConfig, world: &mut W) -> Result<Self> {
        config.validate()?;

        let mut state = MatchState::new(config);
        let mut roster = Roster::new();
        for team in Team::ALL {
            let agents = &config.layout(team).agents;
            if agents.is_empty() {
                tracing::warn!(%team, "Team has no agents");
            }
            for spawn in agents {
                let anchors = &state.layout().anchors[team];
                roster.insert(AgentController::new(spawn, team, config, anchors))?;
                state.aggregator_mut(team).register(spawn.id);
            }
        }

        state.reset_game(&mut roster, world);
        state.drain_events();

        tracing::info!(
            scenario = %config.name,
            agents = roster.len(),
            score_to_win = config.rules.score_to_win,
            max_steps = config.rules.max_steps,
            "Capture the flag initialized"
        );

        Ok(Self {
            state,
            roster,
            display: None,
        })
    }

    /// Attach a score display. It is shown the current scoreboard at once.
    pub fn set_display(&mut self, mut display: Box<dyn ScoreDisplay>) {
        display.show_scores(&self.state.scoreboard());
        self.display = Some(display);
    }

    /// Match state.
    #[must_use]
    pub const fn state(&self) -> &MatchState {
        &self.state
    }

    /// Agent controllers.
    #[must_use]
    pub const fn roster(&self) -> &Roster {
        &self.roster
    }

    /// One agent's controller.
    #[must_use]
    pub fn agent(&self, id: AgentId) -> Option<&AgentController> {
        self.roster.get(id)
    }

    /// Agent ids in ascending order.
    #[must_use]
    pub fn agent_ids(&self) -> Vec<AgentId> {
        self.roster.ids()
    }

    /// Observation for one agent.
    pub fn observe<W: PhysicsWorld + ?Sized>(&self, world: &W, agent: AgentId) -> Result<Observation> {
        self.roster
            .require(agent)?
            .build_observation(world, &self.state.view())
    }

    /// Observations for every agent, keyed by id.
    pub fn observations<W: PhysicsWorld + ?Sized>(
        &self,
        world: &W,
    ) -> Result<BTreeMap<AgentId, Observation>> {
        let view = self.state.view();
        self.roster
            .iter()
            .map(|agent| Ok((agent.id(), agent.build_observation(world, &view)?)))
            .collect()
    }

    /// Advance the match by one tick.
    ///
    /// Every agent must have an action. Nothing is mutated if one is
    /// missing.
    pub fn tick<W: PhysicsWorld + ?Sized>(
        &mut self,
        world: &mut W,
        actions: &BTreeMap<AgentId, ActionPair>,
    ) -> Result<TickOutcome> {
        let ids = self.roster.ids();
        if let Some(&missing) = ids.iter().find(|id| !actions.contains_key(id)) {
            return Err(CtfError::MissingAction(missing));
        }

        // 1. Agents act in id order
        for &id in &ids {
            let action = actions[&id];
            let view = self.state.view();
            let agent = self.roster.require_mut(id)?;
            let was_jailed = agent.is_jailed();
            agent.apply_action(action, world, &view)?;
            if was_jailed && !agent.is_jailed() {
                self.state.record(MatchEvent::Released { agent: id });
            }
        }

        // 2. Carried flags follow
        self.state.follow_carriers(world);

        // 3. Contacts
        let mut episode_end = None;
        for contact in self.normalize_contacts(world.drain_contacts()) {
            if let Some(summary) = self.resolve_contact(contact, world)? {
                episode_end = Some(summary);
                break;
            }
            #[cfg(feature = "debug-validation")]
            {
                self.state.follow_carriers(world);
                self.state.check_invariants(&self.roster, world)?;
            }
        }

        // 4. Step counter
        if episode_end.is_none() {
            self.state.follow_carriers(world);
            episode_end = self.state.advance_step(&mut self.roster, world);
        }

        // 5. Invariants
        self.state.check_invariants(&self.roster, world)?;

        // 6. Outputs
        let mut outcome = TickOutcome {
            step: self.state.step(),
            group_rewards: self.state.take_group_deltas(),
            events: self.state.drain_events(),
            episode_end,
            ..TickOutcome::default()
        };
        for agent in self.roster.iter_mut() {
            outcome.rewards.insert(agent.id(), agent.take_reward());
            if let Some(end) = agent.take_episode_end() {
                outcome.agent_ends.insert(agent.id(), end);
            }
        }
        self.notify_display(&outcome.events);

        #[cfg(debug_assertions)]
        {
            let hash = self.state_hash();
            tracing::debug!(
                episode = self.state.episode(),
                step = self.state.step(),
                state_hash = hash,
                "Match state hash"
            );
        }

        Ok(outcome)
    }

    /// Sort, deduplicate and filter a raw contact queue.
    ///
    /// Agent pairs are kept once, as `(lower id, Agent(higher id))`.
    fn normalize_contacts(&self, raw: Vec<ContactEvent>) -> Vec<ContactEvent> {
        let mut contacts: Vec<ContactEvent> = raw
            .into_iter()
            .filter_map(|contact| {
                if self.roster.get(contact.agent).is_none() {
                    tracing::warn!(agent = contact.agent, "Contact for unknown agent ignored");
                    return None;
                }
                match contact.other {
                    ContactKind::Agent(other) if other == contact.agent => None,
                    ContactKind::Agent(other) if self.roster.get(other).is_none() => {
                        tracing::warn!(agent = other, "Contact with unknown agent ignored");
                        None
                    }
                    ContactKind::Agent(other) if other < contact.agent => Some(ContactEvent::new(
                        other,
                        ContactKind::Agent(contact.agent),
                    )),
                    _ => Some(contact),
                }
            })
            .collect();
        contacts.sort_unstable();
        contacts.dedup();
        contacts
    }

    fn resolve_contact<W: PhysicsWorld + ?Sized>(
        &mut self,
        contact: ContactEvent,
        world: &mut W,
    ) -> Result<Option<EpisodeSummary>> {
        match contact.other {
            ContactKind::Flag(team) => {
                self.resolve_flag(contact.agent, team)?;
                Ok(None)
            }
            ContactKind::Base(team) => Ok(self.resolve_base(contact.agent, team, world)?),
            ContactKind::Agent(other) => {
                self.resolve_agents(contact.agent, other, world)?;
                Ok(None)
            }
            ContactKind::Obstacle => Ok(None),
        }
    }

    fn resolve_flag(&mut self, id: AgentId, team: Team) -> Result<()> {
        let Some(flag) = self.state.flag_mut(team) else {
            return Ok(());
        };
        let agent = self.roster.require_mut(id)?;
        if agent.try_pickup(flag)? {
            self.state.flag_picked_up(team, &mut self.roster)?;
        }
        Ok(())
    }

    fn resolve_base<W: PhysicsWorld + ?Sized>(
        &mut self,
        id: AgentId,
        base_team: Team,
        world: &mut W,
    ) -> Result<Option<EpisodeSummary>> {
        if self.state.layout().anchors[base_team].base.is_none() {
            return Ok(None);
        }
        let agent = self.roster.require_mut(id)?;
        let scorer = agent.team();
        match agent.try_score(base_team) {
            Some(_) => Ok(self.state.score_flag(scorer, &mut self.roster, world)),
            None => Ok(None),
        }
    }

    fn resolve_agents<W: PhysicsWorld + ?Sized>(
        &mut self,
        a: AgentId,
        b: AgentId,
        world: &mut W,
    ) -> Result<()> {
        let first = self.roster.require(a)?;
        let second = self.roster.require(b)?;
        if first.team() == second.team() || first.is_jailed() || second.is_jailed() {
            return Ok(());
        }
        let territory = self.state.layout().territory;
        let caught = |team: Team, id: AgentId| {
            world
                .transform(id)
                .is_some_and(|t| territory.is_enemy(team, t.position))
        };
        let a_caught = caught(first.team(), a);
        let b_caught = caught(second.team(), b);

        if a_caught {
            self.jail(a, b, world)?;
        }
        if b_caught {
            self.jail(b, a, world)?;
        }
        Ok(())
    }

    /// Send `victim` to jail after touching `tagger`.
    fn jail<W: PhysicsWorld + ?Sized>(
        &mut self,
        victim: AgentId,
        tagger: AgentId,
        world: &mut W,
    ) -> Result<()> {
        let dropped = self.roster.require_mut(victim)?.release_flag();
        if let Some(flag_team) = dropped {
            self.state.return_flag(flag_team, world);
        }
        self.roster.require_mut(victim)?.enter_jail(world)?;
        self.state.record(MatchEvent::Jailed {
            agent: victim,
            by: tagger,
        });

        let tagger_agent = self.roster.require_mut(tagger)?;
        let tagger_team = tagger_agent.team();
        let on_home = world
            .transform(tagger)
            .is_some_and(|t| self.state.layout().territory.is_home(tagger_team, t.position));
        if on_home && !tagger_agent.is_jailed() {
            let was_carrying = dropped.is_some();
            tagger_agent.award_tag(was_carrying);
            self.state
                .successful_tag(tagger_team, was_carrying, &mut self.roster);
            self.state.record(MatchEvent::Tagged {
                tagger,
                target: victim,
                was_carrying,
            });
            tracing::debug!(tagger, target = victim, was_carrying, "Tag");
        }
        Ok(())
    }

    fn notify_display(&mut self, events: &[MatchEvent]) {
        let Some(display) = self.display.as_mut() else {
            return;
        };
        for event in events {
            match event {
                MatchEvent::ScoreChanged { scoreboard } | MatchEvent::GameReset { scoreboard } => {
                    display.show_scores(scoreboard);
                }
                _ => {}
            }
        }
    }

    /// Hash of all core state.
    ///
    /// Two cores fed the same scenario and action stream produce the same
    /// hash after every tick.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash_core(&mut hasher);
        hasher.finish()
    }

    /// Hash of core state plus every agent transform read from `world`.
    #[must_use]
    pub fn state_hash_with<W: PhysicsWorld + ?Sized>(&self, world: &W) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash_core(&mut hasher);
        for id in self.roster.ids() {
            world.transform(id).hash(&mut hasher);
        }
        hasher.finish()
    }

    fn hash_core(&self, hasher: &mut DefaultHasher) {
        let state = &self.state;
        state.episode().hash(hasher);
        state.step().hash(hasher);
        state.is_active().hash(hasher);
        state.scores().hash(hasher);
        state.flags().hash(hasher);
        for team in Team::ALL {
            let aggregator = state.aggregator(team);
            aggregator.pending().to_bits().hash(hasher);
            aggregator.episode_total().to_bits().hash(hasher);
        }

        self.roster.len().hash(hasher);
        for agent in self.roster.iter() {
            agent.id().hash(hasher);
            agent.team().hash(hasher);
            agent.mode().hash(hasher);
            agent.episode_reward().to_bits().hash(hasher);
        }
    }
}
