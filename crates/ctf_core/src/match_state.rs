//! Match state: score, flags and the episode lifecycle.
//!
//! [`MatchState`] is the only place cross-agent state changes. Agents report
//! pickups, scores and tags; the match updates flags and scores, issues group
//! rewards through the team aggregators and drives episode end and reset.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::agent::{AgentId, AgentMode, FieldView, TickAgent};
use crate::config::{GroupRewardDelivery, GroupRewards, MatchRules, ScenarioConfig};
use crate::error::{CtfError, Result};
use crate::field::FieldLayout;
use crate::flag::FlagState;
use crate::roster::Roster;
use crate::team::{Team, TeamPair};
use crate::team_reward::TeamRewardAggregator;
use crate::world::PhysicsWorld;

/// How an episode ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EpisodeOutcome {
    /// A team reached the score limit.
    Win(Team),
    /// The step limit was reached.
    Timeout,
}

impl EpisodeOutcome {
    /// Winning team, if any.
    #[must_use]
    pub const fn winner(self) -> Option<Team> {
        match self {
            Self::Win(team) => Some(team),
            Self::Timeout => None,
        }
    }
}

/// Record of one finished episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EpisodeSummary {
    /// Zero-based episode index.
    pub episode: u64,
    /// How the episode ended.
    pub outcome: EpisodeOutcome,
    /// Scores at the moment it ended.
    pub scores: TeamPair<u32>,
    /// Steps played.
    pub steps: u64,
}

/// Things that happened during a tick, in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MatchEvent {
    /// An agent took the given team's flag.
    FlagPickedUp {
        /// Team whose flag was taken.
        team: Team,
        /// Agent now carrying it.
        carrier: AgentId,
    },
    /// A team scored.
    FlagCaptured {
        /// Scoring team.
        team: Team,
    },
    /// A flag went back home.
    FlagReturned {
        /// Owning team.
        team: Team,
    },
    /// An agent was sent to jail.
    Jailed {
        /// Jailed agent.
        agent: AgentId,
        /// Opponent it touched.
        by: AgentId,
    },
    /// An agent left jail.
    Released {
        /// Released agent.
        agent: AgentId,
    },
    /// A tag earned the tagger's team a reward.
    Tagged {
        /// Tagging agent.
        tagger: AgentId,
        /// Jailed opponent.
        target: AgentId,
        /// Whether the target carried a flag.
        was_carrying: bool,
    },
    /// The scoreboard changed.
    ScoreChanged {
        /// Formatted scoreboard.
        scoreboard: String,
    },
    /// The episode ended.
    EpisodeEnded(EpisodeSummary),
    /// A new episode started.
    GameReset {
        /// Formatted scoreboard.
        scoreboard: String,
    },
}

/// Sole source of truth for score, flags and the episode lifecycle.
#[derive(Debug, Clone)]
pub struct MatchState {
    rules: MatchRules,
    group: GroupRewards,
    layout: FieldLayout,
    scores: TeamPair<u32>,
    step: u64,
    active: bool,
    flags: TeamPair<Option<FlagState>>,
    aggregators: TeamPair<TeamRewardAggregator>,
    episode: u64,
    last_summary: Option<EpisodeSummary>,
    events: Vec<MatchEvent>,
}

impl MatchState {
    /// Build match state from a validated scenario.
    ///
    /// A team without a flag or base logs a warning and that feature stays
    /// inert for the whole run.
    #[must_use]
    pub fn new(config: &ScenarioConfig) -> Self {
        let layout = FieldLayout::from_scenario(config);
        for team in Team::ALL {
            let anchors = &layout.anchors[team];
            if anchors.flag_home.is_none() {
                tracing::warn!(%team, "Scenario has no flag for team; pickups disabled");
            }
            if anchors.base.is_none() {
                tracing::warn!(%team, "Scenario has no base for team; scoring disabled");
            }
        }
        let flags = TeamPair::from_fn(|team| {
            layout.anchors[team]
                .flag_home
                .map(|home| FlagState::new(team, home))
        });

        Self {
            rules: config.rules,
            group: config.rewards.group,
            layout,
            scores: TeamPair::default(),
            step: 0,
            active: true,
            flags,
            aggregators: TeamPair::from_fn(TeamRewardAggregator::new),
            episode: 0,
            last_summary: None,
            events: Vec::new(),
        }
    }

    /// Match rules.
    #[must_use]
    pub const fn rules(&self) -> &MatchRules {
        &self.rules
    }

    /// Static field geometry.
    #[must_use]
    pub const fn layout(&self) -> &FieldLayout {
        &self.layout
    }

    /// Read-only view handed to agents.
    #[must_use]
    pub const fn view(&self) -> FieldView<'_> {
        FieldView {
            layout: &self.layout,
            flags: &self.flags,
        }
    }

    /// Score of one team.
    #[must_use]
    pub fn score(&self, team: Team) -> u32 {
        self.scores[team]
    }

    /// Both scores.
    #[must_use]
    pub const fn scores(&self) -> TeamPair<u32> {
        self.scores
    }

    /// Steps elapsed in the current episode.
    #[must_use]
    pub const fn step(&self) -> u64 {
        self.step
    }

    /// False only while the reset transition runs.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Index of the current episode.
    #[must_use]
    pub const fn episode(&self) -> u64 {
        self.episode
    }

    /// Summary of the most recently finished episode.
    #[must_use]
    pub const fn last_summary(&self) -> Option<EpisodeSummary> {
        self.last_summary
    }

    /// Flag of one team, if the scenario has one.
    #[must_use]
    pub fn flag(&self, team: Team) -> Option<&FlagState> {
        self.flags[team].as_ref()
    }

    /// Mutable flag of one team.
    pub fn flag_mut(&mut self, team: Team) -> Option<&mut FlagState> {
        self.flags[team].as_mut()
    }

    /// Both flags.
    #[must_use]
    pub const fn flags(&self) -> &TeamPair<Option<FlagState>> {
        &self.flags
    }

    /// Group reward aggregator of one team.
    #[must_use]
    pub fn aggregator(&self, team: Team) -> &TeamRewardAggregator {
        &self.aggregators[team]
    }

    /// Mutable group reward aggregator of one team.
    pub fn aggregator_mut(&mut self, team: Team) -> &mut TeamRewardAggregator {
        &mut self.aggregators[team]
    }

    /// Group reward issued per team since the last call.
    pub fn take_group_deltas(&mut self) -> TeamPair<f32> {
        TeamPair::from_fn(|team| self.aggregators[team].take_tick_delta())
    }

    /// Append an agent-level event to the outbox.
    pub fn record(&mut self, event: MatchEvent) {
        self.events.push(event);
    }

    /// Take every event raised since the last call.
    pub fn drain_events(&mut self) -> Vec<MatchEvent> {
        std::mem::take(&mut self.events)
    }

    /// `"Red: N | Blue: M"`.
    #[must_use]
    pub fn scoreboard(&self) -> String {
        format!(
            "{}: {} | {}: {}",
            Team::Red,
            self.scores.red,
            Team::Blue,
            self.scores.blue
        )
    }

    /// Multi-line dump of both flags for debugging.
    #[must_use]
    pub fn flag_report(&self) -> String {
        let mut report = String::new();
        for (team, flag) in self.flags.iter() {
            match flag {
                Some(flag) => {
                    let (x, z) = flag.position().to_f32();
                    let _ = writeln!(
                        report,
                        "{team} flag: carrier={} visible={} at_home={} position=({x:.2}, {z:.2})",
                        flag.carrier()
                            .map_or_else(|| "none".to_string(), |id| id.to_string()),
                        flag.is_visible(),
                        flag.is_at_home(),
                    );
                }
                None => {
                    let _ = writeln!(report, "{team} flag: absent");
                }
            }
        }
        report
    }

    /// Issue a group reward according to the configured delivery mode.
    pub fn issue_group_reward(&mut self, team: Team, amount: f32, roster: &mut Roster) {
        if amount == 0.0 {
            return;
        }
        let aggregator = &mut self.aggregators[team];
        match self.rules.group_reward_delivery {
            GroupRewardDelivery::Deferred => aggregator.add_group_reward(amount),
            GroupRewardDelivery::Immediate => aggregator.inject(amount, roster),
        }
    }

    /// Bookkeeping after `team`'s flag was taken.
    ///
    /// The flag must already be marked carried by the taker.
    pub fn flag_picked_up(&mut self, team: Team, roster: &mut Roster) -> Result<()> {
        let carrier = self
            .flag(team)
            .and_then(FlagState::carrier)
            .ok_or_else(|| {
                CtfError::InvariantViolation(format!(
                    "pickup reported for the {team} flag but nobody carries it"
                ))
            })?;

        for agent in roster.team_mut(team) {
            agent.suffer_flag_stolen();
        }
        self.issue_group_reward(team.opponent(), self.group.flag_pickup, roster);
        self.issue_group_reward(team, -self.group.flag_pickup, roster);
        self.events.push(MatchEvent::FlagPickedUp { team, carrier });
        Ok(())
    }

    /// `team` scored. Returns the summary if this ended the episode.
    pub fn score_flag<W: PhysicsWorld + ?Sized>(
        &mut self,
        team: Team,
        roster: &mut Roster,
        world: &mut W,
    ) -> Option<EpisodeSummary> {
        self.scores[team] += 1;
        self.issue_group_reward(team, self.group.score, roster);
        self.issue_group_reward(team.opponent(), self.group.scored_against, roster);
        self.return_flag(team.opponent(), world);

        let scoreboard = self.scoreboard();
        tracing::info!(%team, %scoreboard, "Flag captured");
        self.events.push(MatchEvent::FlagCaptured { team });
        self.events.push(MatchEvent::ScoreChanged { scoreboard });

        if self.scores[team] >= self.rules.score_to_win {
            self.issue_group_reward(team, self.group.win, roster);
            self.issue_group_reward(team.opponent(), -self.group.win, roster);
            return Some(self.end_episode(EpisodeOutcome::Win(team), roster, world));
        }
        None
    }

    /// Send `team`'s flag home, visible and uncarried. Idempotent.
    pub fn return_flag<W: PhysicsWorld + ?Sized>(&mut self, team: Team, world: &mut W) {
        let Some(flag) = self.flags[team].as_mut() else {
            return;
        };
        let moved = !flag.is_at_home() || !flag.is_visible();
        flag.reset();
        world.place_flag(team, flag.home(), true);
        if moved {
            tracing::debug!(%team, "Flag returned home");
            self.events.push(MatchEvent::FlagReturned { team });
        }
    }

    /// Group rewards for a tag by `team`.
    pub fn successful_tag(&mut self, team: Team, was_carrying: bool, roster: &mut Roster) {
        if was_carrying {
            self.issue_group_reward(team, self.group.tag_carrier, roster);
            self.issue_group_reward(team.opponent(), self.group.tag_carrier_penalty, roster);
        } else {
            self.issue_group_reward(team, self.group.tag, roster);
        }
    }

    /// Move carried flags onto their carriers.
    pub fn follow_carriers<W: PhysicsWorld + ?Sized>(&mut self, world: &mut W) {
        for team in Team::ALL {
            let Some(flag) = self.flags[team].as_mut() else {
                continue;
            };
            let Some(carrier) = flag.carrier() else {
                continue;
            };
            if let Some(transform) = world.transform(carrier) {
                flag.follow(transform.position);
                world.place_flag(team, transform.position, false);
            }
        }
    }

    /// Advance the step counter. Returns the summary on timeout.
    pub fn advance_step<W: PhysicsWorld + ?Sized>(
        &mut self,
        roster: &mut Roster,
        world: &mut W,
    ) -> Option<EpisodeSummary> {
        if !self.active {
            return None;
        }
        self.step += 1;
        if self.step >= self.rules.max_steps {
            return Some(self.end_episode(EpisodeOutcome::Timeout, roster, world));
        }
        None
    }

    /// Finish the episode: flush group rewards, signal every agent, reset.
    pub fn end_episode<W: PhysicsWorld + ?Sized>(
        &mut self,
        outcome: EpisodeOutcome,
        roster: &mut Roster,
        world: &mut W,
    ) -> EpisodeSummary {
        self.active = false;
        let summary = EpisodeSummary {
            episode: self.episode,
            outcome,
            scores: self.scores,
            steps: self.step,
        };

        for team in Team::ALL {
            let delivered = self.aggregators[team].flush(roster);
            tracing::debug!(%team, delivered, "Group reward flushed");
        }
        for agent in roster.iter_mut() {
            agent.signal_episode_end(summary.episode, outcome.winner());
        }

        match outcome {
            EpisodeOutcome::Win(team) => tracing::info!(
                episode = summary.episode,
                %team,
                steps = summary.steps,
                scoreboard = %self.scoreboard(),
                "Episode won"
            ),
            EpisodeOutcome::Timeout => tracing::info!(
                episode = summary.episode,
                steps = summary.steps,
                scoreboard = %self.scoreboard(),
                "Episode timed out"
            ),
        }
        self.events.push(MatchEvent::EpisodeEnded(summary));
        self.last_summary = Some(summary);
        self.episode += 1;

        self.reset_game(roster, world);
        summary
    }

    /// Scores 0-0, step 0, flags home, every agent reset, then active.
    pub fn reset_game<W: PhysicsWorld + ?Sized>(&mut self, roster: &mut Roster, world: &mut W) {
        self.active = false;
        self.scores = TeamPair::default();
        self.step = 0;
        for team in Team::ALL {
            if let Some(flag) = self.flags[team].as_mut() {
                flag.reset();
                world.place_flag(team, flag.home(), true);
            }
            self.aggregators[team].begin_episode();
        }
        for agent in roster.iter_mut() {
            agent.reset(world);
        }
        self.active = true;
        self.events.push(MatchEvent::GameReset {
            scoreboard: self.scoreboard(),
        });
    }

    /// Verify flags and agents agree with each other.
    pub fn check_invariants<W: PhysicsWorld + ?Sized>(
        &self,
        roster: &Roster,
        world: &W,
    ) -> Result<()> {
        for (team, flag) in self.flags.iter() {
            let Some(flag) = flag else { continue };
            match flag.carrier() {
                Some(carrier) => {
                    if flag.is_visible() {
                        return Err(CtfError::InvariantViolation(format!(
                            "the {team} flag is carried but visible"
                        )));
                    }
                    let agent = roster.get(carrier).ok_or_else(|| {
                        CtfError::InvariantViolation(format!(
                            "the {team} flag lists unknown carrier {carrier}"
                        ))
                    })?;
                    if agent.carried_flag() != Some(team) {
                        return Err(CtfError::InvariantViolation(format!(
                            "the {team} flag lists carrier {carrier} which is {:?}",
                            agent.mode()
                        )));
                    }
                    if let Some(transform) = world.transform(carrier) {
                        if transform.position != flag.position() {
                            return Err(CtfError::InvariantViolation(format!(
                                "the {team} flag is not at its carrier's position"
                            )));
                        }
                    }
                }
                None if !flag.is_visible() => {
                    return Err(CtfError::InvariantViolation(format!(
                        "the {team} flag is hidden but nobody carries it"
                    )));
                }
                None => {}
            }
        }

        for agent in roster.iter() {
            match agent.mode() {
                AgentMode::CarryingFlag(team) => {
                    let carrier = self.flag(team).and_then(FlagState::carrier);
                    if carrier != Some(agent.id()) {
                        return Err(CtfError::InvariantViolation(format!(
                            "agent {} carries the {team} flag but the flag lists {carrier:?}",
                            agent.id()
                        )));
                    }
                }
                AgentMode::Jailed { ticks_remaining } => {
                    if ticks_remaining == 0 || ticks_remaining > agent.jail_duration() {
                        return Err(CtfError::InvariantViolation(format!(
                            "agent {} has jail timer {ticks_remaining} outside 1..={}",
                            agent.id(),
                            agent.jail_duration()
                        )));
                    }
                }
                AgentMode::Free => {}
            }
        }
        Ok(())
    }
}
