//! Episode runner.
//!
//! Drives the core against the reference arena with built-in policies,
//! collecting metrics and optionally recording a replay.

use std::collections::BTreeMap;

use ctf_core::agent::{ActionPair, AgentId};
use ctf_core::arena::Arena;
use ctf_core::config::ScenarioConfig;
use ctf_core::error::CtfError;
use ctf_core::match_state::MatchEvent;
use ctf_core::replay::Replay;
use ctf_core::simulation::{CaptureTheFlag, TickOutcome};
use ctf_core::team::{Team, TeamPair};
use ctf_core::world::ScoreDisplay;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::metrics::{EpisodeMetrics, MetricsCollector, RunSummary};
use crate::policy::{Policy, PolicyKind};
use crate::scenario::ScenarioError;

/// Error type for headless runs.
#[derive(Error, Debug)]
pub enum RunError {
    /// The core rejected a tick or the scenario.
    #[error("Simulation error: {0}")]
    Core(#[from] CtfError),
    /// Scenario could not be loaded.
    #[error(transparent)]
    Scenario(#[from] ScenarioError),
    /// Report or replay IO failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Options for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOptions {
    /// Episodes to play before stopping.
    pub episodes: u32,
    /// Red team policy.
    pub red: PolicyKind,
    /// Blue team policy.
    pub blue: PolicyKind,
    /// Seed for random policies.
    pub seed: u64,
    /// Keep a replay of every tick.
    pub record_replay: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            episodes: 1,
            red: PolicyKind::Scripted,
            blue: PolicyKind::Scripted,
            seed: 0,
            record_replay: false,
        }
    }
}

/// Everything a finished run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Scenario name.
    pub scenario: String,
    /// Options the run used.
    pub options: RunOptions,
    /// Ticks simulated in total.
    pub ticks: u64,
    /// One record per finished episode.
    pub episodes: Vec<EpisodeMetrics>,
    /// Aggregate over `episodes`.
    pub summary: RunSummary,
    /// Core and arena hash after the last tick.
    pub final_hash: u64,
    /// Recorded replay, when requested.
    #[serde(skip)]
    pub replay: Option<Replay>,
}

/// Score display that writes to the log.
#[derive(Debug, Default)]
pub struct LogScoreboard;

impl ScoreDisplay for LogScoreboard {
    fn show_scores(&mut self, scoreboard: &str) {
        tracing::debug!(%scoreboard, "Scoreboard");
    }
}

/// A scenario, its arena, the core and one policy per team.
pub struct EpisodeRunner {
    scenario: ScenarioConfig,
    arena: Arena,
    game: CaptureTheFlag,
    policies: TeamPair<Box<dyn Policy>>,
    team_of: BTreeMap<AgentId, Team>,
    metrics: MetricsCollector,
    replay: Option<Replay>,
    ticks: u64,
}

impl std::fmt::Debug for EpisodeRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EpisodeRunner")
            .field("scenario", &self.scenario.name)
            .field("red", &self.policies.red.name())
            .field("blue", &self.policies.blue.name())
            .field("ticks", &self.ticks)
            .finish_non_exhaustive()
    }
}

impl EpisodeRunner {
    /// Build the arena, the core and the policies.
    pub fn new(scenario: ScenarioConfig, options: &RunOptions) -> Result<Self, RunError> {
        let mut arena = Arena::try_from_scenario(&scenario)?;
        let mut game = CaptureTheFlag::new(&scenario, &mut arena)?;
        game.set_display(Box::new(LogScoreboard));

        let policies = TeamPair::new(
            options.red.build(&scenario, Team::Red, options.seed),
            options.blue.build(&scenario, Team::Blue, options.seed),
        );
        let team_of: BTreeMap<AgentId, Team> = game
            .roster()
            .iter()
            .map(|agent| (agent.id(), agent.team()))
            .collect();
        let replay = options.record_replay.then(|| Replay::new(scenario.clone()));

        tracing::debug!(
            scenario = %scenario.name,
            red = %options.red,
            blue = %options.blue,
            seed = options.seed,
            "Runner ready"
        );

        Ok(Self {
            metrics: MetricsCollector::new(team_of.clone()),
            scenario,
            arena,
            game,
            policies,
            team_of,
            replay,
            ticks: 0,
        })
    }

    /// The core.
    #[must_use]
    pub const fn game(&self) -> &CaptureTheFlag {
        &self.game
    }

    /// The reference arena.
    #[must_use]
    pub const fn arena(&self) -> &Arena {
        &self.arena
    }

    /// Ticks simulated so far.
    #[must_use]
    pub const fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Metrics of every finished episode so far.
    #[must_use]
    pub fn finished(&self) -> &[EpisodeMetrics] {
        self.metrics.finished()
    }

    /// Ask every policy for an action, in ascending agent order.
    fn choose_actions(&mut self) -> Result<BTreeMap<AgentId, ActionPair>, RunError> {
        let observations = self.game.observations(&self.arena)?;
        let mut actions = BTreeMap::new();
        for (id, observation) in &observations {
            let Some(&team) = self.team_of.get(id) else {
                continue;
            };
            actions.insert(*id, self.policies[team].act(*id, observation));
        }
        Ok(actions)
    }

    /// Run one tick.
    pub fn step(&mut self) -> Result<TickOutcome, RunError> {
        let actions = self.choose_actions()?;
        if let Some(replay) = self.replay.as_mut() {
            replay.record_tick(&actions);
        }
        let outcome = self.game.tick(&mut self.arena, &actions)?;
        self.ticks += 1;

        let flags_changed = outcome.events.iter().any(|event| {
            matches!(
                event,
                MatchEvent::FlagPickedUp { .. }
                    | MatchEvent::FlagCaptured { .. }
                    | MatchEvent::FlagReturned { .. }
            )
        });
        if flags_changed {
            tracing::debug!(report = %self.game.state().flag_report(), "Flag states");
        }

        if let Some(metrics) = self.metrics.record_tick(&outcome) {
            tracing::info!(
                episode = metrics.episode,
                outcome = %metrics.outcome,
                winner = ?metrics.winner,
                steps = metrics.steps,
                red = metrics.red_score,
                blue = metrics.blue_score,
                "Episode finished"
            );
        }
        Ok(outcome)
    }

    /// Play until `episodes` episodes have finished.
    pub fn run_episodes(&mut self, episodes: u32) -> Result<(), RunError> {
        let target = self.finished().len() + episodes as usize;
        while self.finished().len() < target {
            self.step()?;
        }
        Ok(())
    }

    /// Finish the run and build the report.
    #[must_use]
    pub fn into_report(self, options: RunOptions) -> RunReport {
        let final_hash = self.game.state_hash_with(&self.arena);
        let replay = self.replay.map(|mut replay| {
            replay.finalize(final_hash);
            replay
        });
        let episodes = self.metrics.into_finished();
        RunReport {
            scenario: self.scenario.name,
            options,
            ticks: self.ticks,
            summary: RunSummary::from_episodes(&episodes),
            episodes,
            final_hash,
            replay,
        }
    }
}

/// Play `options.episodes` episodes of `scenario`.
pub fn run(scenario: ScenarioConfig, options: RunOptions) -> Result<RunReport, RunError> {
    let mut runner = EpisodeRunner::new(scenario, &options)?;
    runner.run_episodes(options.episodes)?;
    Ok(runner.into_report(options))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::duel_1v1;

    fn short_duel() -> ScenarioConfig {
        let mut scenario = duel_1v1();
        scenario.rules.max_steps = 50;
        scenario
    }

    #[test]
    fn test_runs_requested_episodes() {
        let options = RunOptions {
            episodes: 3,
            red: PolicyKind::Idle,
            blue: PolicyKind::Idle,
            ..RunOptions::default()
        };
        let report = run(short_duel(), options).unwrap();
        assert_eq!(report.episodes.len(), 3);
        assert_eq!(report.ticks, 150);
        assert_eq!(report.summary.timeouts, 3);
        assert!(report.episodes.iter().all(|e| e.outcome == "timeout"));
        assert!(report.replay.is_none());
    }

    #[test]
    fn test_recorded_replay_verifies() {
        let options = RunOptions {
            episodes: 2,
            red: PolicyKind::Random,
            blue: PolicyKind::Scripted,
            seed: 7,
            record_replay: true,
        };
        let report = run(short_duel(), options).unwrap();
        let replay = report.replay.unwrap();
        assert_eq!(replay.duration(), report.ticks);
        assert_eq!(replay.final_hash, report.final_hash);
        assert!(replay.verify().unwrap());
    }

    #[test]
    fn test_same_seed_same_report() {
        let options = RunOptions {
            episodes: 2,
            red: PolicyKind::Random,
            blue: PolicyKind::Random,
            seed: 99,
            record_replay: false,
        };
        let a = run(short_duel(), options.clone()).unwrap();
        let b = run(short_duel(), options).unwrap();
        assert_eq!(a.final_hash, b.final_hash);
        assert_eq!(a.episodes, b.episodes);
    }

    #[test]
    fn test_step_counts_ticks() {
        let mut runner = EpisodeRunner::new(short_duel(), &RunOptions::default()).unwrap();
        for _ in 0..5 {
            runner.step().unwrap();
        }
        assert_eq!(runner.ticks(), 5);
        assert_eq!(runner.game().state().step(), 5);
    }
}
