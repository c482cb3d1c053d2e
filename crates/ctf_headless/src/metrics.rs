//! Episode metrics collection.
//!
//! [`MetricsCollector`] folds every [`TickOutcome`] of a run into one
//! [`EpisodeMetrics`] record per finished episode. [`RunSummary`] aggregates
//! records across a run or a batch.

use std::collections::BTreeMap;
use std::path::Path;

use ctf_core::agent::AgentId;
use ctf_core::match_state::{EpisodeOutcome, MatchEvent};
use ctf_core::simulation::TickOutcome;
use ctf_core::team::{Team, TeamPair};
use serde::{Deserialize, Serialize};

/// Event counts for one team.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamEventCounts {
    /// Enemy flags picked up.
    pub pickups: u32,
    /// Flags carried home.
    pub captures: u32,
    /// Opponents sent to jail by a rewarded tag.
    pub tags: u32,
    /// Own agents sent to jail.
    pub jailed: u32,
    /// Own flags returned home after a drop or capture.
    pub flag_returns: u32,
}

/// Complete metrics for one episode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EpisodeMetrics {
    /// Episode index within its run.
    pub episode: u64,
    /// Ticks the episode lasted.
    pub steps: u64,
    /// Winning team name (None = timeout).
    pub winner: Option<String>,
    /// `"win"` or `"timeout"`.
    pub outcome: String,
    /// Red final score.
    pub red_score: u32,
    /// Blue final score.
    pub blue_score: u32,
    /// Red event counts.
    pub red: TeamEventCounts,
    /// Blue event counts.
    pub blue: TeamEventCounts,
    /// Cumulative reward per agent, including the final group flush.
    pub agent_rewards: BTreeMap<AgentId, f32>,
}

impl EpisodeMetrics {
    /// Event counts for a team.
    #[must_use]
    pub const fn counts(&self, team: Team) -> &TeamEventCounts {
        match team {
            Team::Red => &self.red,
            Team::Blue => &self.blue,
        }
    }

    fn counts_mut(&mut self, team: Team) -> &mut TeamEventCounts {
        match team {
            Team::Red => &mut self.red,
            Team::Blue => &mut self.blue,
        }
    }
}

/// Builds [`EpisodeMetrics`] from tick outcomes.
#[derive(Debug, Clone, Default)]
pub struct MetricsCollector {
    current: EpisodeMetrics,
    team_of: BTreeMap<AgentId, Team>,
    finished: Vec<EpisodeMetrics>,
}

impl MetricsCollector {
    /// Create a collector that knows each agent's team.
    #[must_use]
    pub fn new(team_of: BTreeMap<AgentId, Team>) -> Self {
        Self {
            team_of,
            ..Self::default()
        }
    }

    /// Fold one tick. Returns the finished record when the tick ended an
    /// episode.
    pub fn record_tick(&mut self, outcome: &TickOutcome) -> Option<&EpisodeMetrics> {
        for event in &outcome.events {
            self.record_event(event);
        }

        let summary = outcome.episode_end?;
        let mut metrics = std::mem::take(&mut self.current);
        metrics.episode = summary.episode;
        metrics.steps = summary.steps;
        metrics.red_score = summary.scores[Team::Red];
        metrics.blue_score = summary.scores[Team::Blue];
        match summary.outcome {
            EpisodeOutcome::Win(team) => {
                metrics.winner = Some(team.display_name().to_string());
                metrics.outcome = "win".to_string();
            }
            EpisodeOutcome::Timeout => metrics.outcome = "timeout".to_string(),
        }
        metrics.agent_rewards = outcome
            .agent_ends
            .iter()
            .map(|(&id, end)| (id, end.cumulative_reward))
            .collect();
        self.finished.push(metrics);
        self.finished.last()
    }

    fn record_event(&mut self, event: &MatchEvent) {
        match *event {
            MatchEvent::FlagPickedUp { team, .. } => {
                self.current.counts_mut(team.opponent()).pickups += 1;
            }
            MatchEvent::FlagCaptured { team } => self.current.counts_mut(team).captures += 1,
            MatchEvent::FlagReturned { team } => {
                self.current.counts_mut(team).flag_returns += 1;
            }
            MatchEvent::Jailed { agent, .. } => {
                if let Some(&team) = self.team_of.get(&agent) {
                    self.current.counts_mut(team).jailed += 1;
                }
            }
            MatchEvent::Tagged { tagger, .. } => {
                if let Some(&team) = self.team_of.get(&tagger) {
                    self.current.counts_mut(team).tags += 1;
                }
            }
            _ => {}
        }
    }

    /// Records of every finished episode so far.
    #[must_use]
    pub fn finished(&self) -> &[EpisodeMetrics] {
        &self.finished
    }

    /// Consume the collector.
    #[must_use]
    pub fn into_finished(self) -> Vec<EpisodeMetrics> {
        self.finished
    }
}

/// Aggregate over many episodes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Episodes aggregated.
    pub total_episodes: u32,
    /// Wins per team.
    pub wins: TeamPair<u32>,
    /// Episodes that hit the step limit.
    pub timeouts: u32,
    /// Win rate per team name.
    pub win_rates: BTreeMap<String, f64>,
    /// Mean episode length in ticks.
    pub average_steps: f64,
    /// Mean captures per episode, both teams.
    pub average_captures: f64,
    /// Mean jailings per episode, both teams.
    pub average_jailed: f64,
}

impl RunSummary {
    /// Aggregate a set of episode records.
    #[must_use]
    pub fn from_episodes(episodes: &[EpisodeMetrics]) -> Self {
        let mut summary = Self {
            total_episodes: episodes.len() as u32,
            ..Self::default()
        };
        if episodes.is_empty() {
            return summary;
        }

        let mut steps = 0u64;
        let mut captures = 0u64;
        let mut jailed = 0u64;
        for episode in episodes {
            match episode.winner.as_deref() {
                Some("Red") => summary.wins[Team::Red] += 1,
                Some("Blue") => summary.wins[Team::Blue] += 1,
                _ => summary.timeouts += 1,
            }
            steps += episode.steps;
            captures += u64::from(episode.red.captures + episode.blue.captures);
            jailed += u64::from(episode.red.jailed + episode.blue.jailed);
        }

        let n = episodes.len() as f64;
        for team in Team::ALL {
            summary
                .win_rates
                .insert(team.display_name().to_string(), summary.wins[team] as f64 / n);
        }
        summary.average_steps = steps as f64 / n;
        summary.average_captures = captures as f64 / n;
        summary.average_jailed = jailed as f64 / n;
        summary
    }
}

/// Write any serializable report as pretty JSON.
pub fn save_json<T: Serialize>(value: &T, path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value).map_err(std::io::Error::other)?;
    std::fs::write(path, json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctf_core::match_state::EpisodeSummary;

    fn teams() -> BTreeMap<AgentId, Team> {
        [(1, Team::Red), (2, Team::Blue)].into_iter().collect()
    }

    #[test]
    fn test_events_are_counted_per_team() {
        let mut collector = MetricsCollector::new(teams());
        let outcome = TickOutcome {
            step: 1,
            events: vec![
                MatchEvent::FlagPickedUp {
                    team: Team::Blue,
                    carrier: 1,
                },
                MatchEvent::Jailed { agent: 1, by: 2 },
                MatchEvent::Tagged {
                    tagger: 2,
                    target: 1,
                    was_carrying: true,
                },
                MatchEvent::FlagReturned { team: Team::Blue },
            ],
            ..TickOutcome::default()
        };
        assert!(collector.record_tick(&outcome).is_none());

        let end = TickOutcome {
            events: vec![MatchEvent::FlagCaptured { team: Team::Red }],
            episode_end: Some(EpisodeSummary {
                episode: 0,
                outcome: EpisodeOutcome::Win(Team::Red),
                scores: TeamPair::new(1, 0),
                steps: 2,
            }),
            ..TickOutcome::default()
        };
        let metrics = collector.record_tick(&end).unwrap().clone();
        assert_eq!(metrics.winner.as_deref(), Some("Red"));
        assert_eq!(metrics.outcome, "win");
        assert_eq!(metrics.red.pickups, 1);
        assert_eq!(metrics.red.captures, 1);
        assert_eq!(metrics.red.jailed, 1);
        assert_eq!(metrics.blue.tags, 1);
        assert_eq!(metrics.blue.flag_returns, 1);
        assert_eq!(collector.finished().len(), 1);
    }

    #[test]
    fn test_summary_rates() {
        let episodes = vec![
            EpisodeMetrics {
                winner: Some("Red".to_string()),
                steps: 100,
                ..EpisodeMetrics::default()
            },
            EpisodeMetrics {
                winner: Some("Red".to_string()),
                steps: 300,
                ..EpisodeMetrics::default()
            },
            EpisodeMetrics {
                steps: 200,
                ..EpisodeMetrics::default()
            },
            EpisodeMetrics {
                winner: Some("Blue".to_string()),
                steps: 200,
                ..EpisodeMetrics::default()
            },
        ];
        let summary = RunSummary::from_episodes(&episodes);
        assert_eq!(summary.total_episodes, 4);
        assert_eq!(summary.wins, TeamPair::new(2, 1));
        assert_eq!(summary.timeouts, 1);
        assert!((summary.win_rates["Red"] - 0.5).abs() < 1e-9);
        assert!((summary.average_steps - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_summary() {
        let summary = RunSummary::from_episodes(&[]);
        assert_eq!(summary.total_episodes, 0);
        assert!(summary.win_rates.is_empty());
    }
}
