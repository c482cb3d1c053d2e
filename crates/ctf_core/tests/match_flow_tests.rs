//! Match flow tests.
//!
//! Drive whole ticks through the reference arena: pickups, captures, tags,
//! jail, timeouts and the reward bookkeeping each of them produces.

use ctf_core::agent::{ActionPair, AgentMode};
use ctf_core::match_state::{EpisodeOutcome, MatchEvent};
use ctf_core::team::Team;
use ctf_core::world::PhysicsWorld;
use ctf_test_utils::fixtures::{approx, distance, duel_scenario, point, unshaped_scenario, Harness};

/// Agent 1 picks up the Blue flag and is left standing on its home.
fn pick_up_blue_flag(harness: &mut Harness) -> ctf_core::simulation::TickOutcome {
    let home = harness.flag_home(Team::Blue);
    harness.place(1, home);
    harness.tick_idle()
}

/// Agent 1 carries whatever it holds into the Red base.
fn carry_to_red_base(harness: &mut Harness) -> ctf_core::simulation::TickOutcome {
    let base = harness.base_center(Team::Red);
    harness.place(1, base);
    harness.tick_idle()
}

#[test]
fn pickup_rewards_carrier_and_both_teams() {
    let mut harness = Harness::new(unshaped_scenario());
    let outcome = pick_up_blue_flag(&mut harness);

    let carrier = harness.game.agent(1).unwrap();
    assert_eq!(carrier.mode(), AgentMode::CarryingFlag(Team::Blue));
    let flag = harness.game.state().flag(Team::Blue).unwrap();
    assert_eq!(flag.carrier(), Some(1));
    assert!(!flag.is_visible());
    assert!(!harness.arena.flag(Team::Blue).unwrap().visible);

    assert!(approx(outcome.rewards[&1].individual, 0.5));
    assert!(approx(outcome.reward(2), 0.0));
    assert!(approx(outcome.rewards[&3].individual, -0.5));
    assert!(approx(outcome.rewards[&4].individual, -0.5));

    let state = harness.game.state();
    assert!(approx(state.aggregator(Team::Red).pending(), 0.3));
    assert!(approx(state.aggregator(Team::Blue).pending(), -0.3));
    assert!(approx(outcome.group_rewards[Team::Red], 0.3));
    assert!(approx(outcome.group_rewards[Team::Blue], -0.3));

    assert!(outcome.events.contains(&MatchEvent::FlagPickedUp {
        team: Team::Blue,
        carrier: 1
    }));
}

#[test]
fn carried_flag_follows_carrier() {
    let mut harness = Harness::new(unshaped_scenario());
    pick_up_blue_flag(&mut harness);

    harness.place(1, point(10.0, -5.0));
    harness.tick_idle();

    let flag = harness.game.state().flag(Team::Blue).unwrap();
    assert_eq!(flag.position(), point(10.0, -5.0));
    assert_eq!(harness.arena.flag(Team::Blue).unwrap().position, point(10.0, -5.0));
}

#[test]
fn own_flag_cannot_be_picked_up() {
    let mut harness = Harness::new(unshaped_scenario());
    let home = harness.flag_home(Team::Red);
    harness.place(1, home);
    let outcome = harness.tick_idle();

    assert_eq!(harness.game.agent(1).unwrap().mode(), AgentMode::Free);
    assert!(harness.game.state().flag(Team::Red).unwrap().is_visible());
    assert!(approx(outcome.reward(1), 0.0));
}

#[test]
fn capture_scores_and_returns_flag() {
    let mut harness = Harness::new(unshaped_scenario());
    pick_up_blue_flag(&mut harness);
    let outcome = carry_to_red_base(&mut harness);

    let state = harness.game.state();
    assert_eq!(state.score(Team::Red), 1);
    assert_eq!(state.score(Team::Blue), 0);
    assert_eq!(harness.game.agent(1).unwrap().mode(), AgentMode::Free);

    let flag = state.flag(Team::Blue).unwrap();
    assert!(flag.is_at_home());
    assert!(flag.is_visible());
    assert_eq!(flag.carrier(), None);

    assert!(approx(outcome.rewards[&1].individual, 1.0));
    assert!(approx(state.aggregator(Team::Red).pending(), 1.3));
    assert!(approx(state.aggregator(Team::Blue).pending(), -0.8));

    assert!(outcome.events.contains(&MatchEvent::FlagCaptured { team: Team::Red }));
    assert!(outcome.events.contains(&MatchEvent::FlagReturned { team: Team::Blue }));
    assert!(outcome.events.contains(&MatchEvent::ScoreChanged {
        scoreboard: "Red: 1 | Blue: 0".to_string()
    }));
    assert!(!outcome.episode_ended());
}

#[test]
fn entering_base_without_flag_scores_nothing() {
    let mut harness = Harness::new(unshaped_scenario());
    let outcome = carry_to_red_base(&mut harness);
    assert_eq!(harness.game.state().score(Team::Red), 0);
    assert!(approx(outcome.reward(1), 0.0));
}

#[test]
fn enemy_base_does_not_accept_capture() {
    let mut harness = Harness::new(unshaped_scenario());
    pick_up_blue_flag(&mut harness);
    let base = harness.base_center(Team::Blue);
    harness.place(1, base);
    harness.tick_idle();

    assert_eq!(harness.game.state().score(Team::Red), 0);
    assert_eq!(
        harness.game.agent(1).unwrap().mode(),
        AgentMode::CarryingFlag(Team::Blue)
    );
}

#[test]
fn third_capture_wins_flushes_and_resets() {
    let mut harness = Harness::new(unshaped_scenario());
    for _ in 0..2 {
        pick_up_blue_flag(&mut harness);
        carry_to_red_base(&mut harness);
    }
    pick_up_blue_flag(&mut harness);
    let outcome = carry_to_red_base(&mut harness);

    let summary = outcome.episode_end.expect("third capture should end the episode");
    assert_eq!(summary.outcome, EpisodeOutcome::Win(Team::Red));
    assert_eq!(summary.scores[Team::Red], 3);
    assert_eq!(summary.episode, 0);

    // Deferred group rewards arrive on the final tick: 3 x (0.3 + 1.0) + 2.0
    assert!(approx(outcome.rewards[&1].group, 5.9));
    assert!(approx(outcome.rewards[&2].group, 5.9));
    assert!(approx(outcome.rewards[&3].group, -4.4));
    assert!(approx(outcome.rewards[&4].group, -4.4));

    assert_eq!(outcome.agent_ends.len(), 4);
    let red_end = outcome.agent_ends[&1];
    assert_eq!(red_end.winner, Some(Team::Red));
    assert!(approx(red_end.cumulative_reward, 3.0 * 1.5 + 5.9));
    assert!(approx(outcome.agent_ends[&3].cumulative_reward, -1.5 - 4.4));

    let state = harness.game.state();
    assert_eq!(state.episode(), 1);
    assert_eq!(state.step(), 0);
    assert_eq!(state.score(Team::Red), 0);
    assert!(state.is_active());
    assert_eq!(state.aggregator(Team::Red).pending(), 0.0);
    assert_eq!(state.last_summary(), Some(summary));
    for agent in harness.game.roster().iter() {
        assert_eq!(agent.mode(), AgentMode::Free);
        assert_eq!(harness.arena.transform(agent.id()), Some(agent.spawn()));
    }
}

#[test]
fn tag_on_home_territory_jails_intruder() {
    let mut harness = Harness::new(duel_scenario());
    harness.place(1, point(5.0, 0.0));
    harness.place(2, point(5.5, 0.0));
    let outcome = harness.tick_idle();

    let red = harness.game.agent(1).unwrap();
    assert_eq!(
        red.mode(),
        AgentMode::Jailed {
            ticks_remaining: red.jail_duration()
        }
    );
    assert_eq!(harness.position(1), point(-30.0, -20.0));
    assert_eq!(harness.game.agent(2).unwrap().mode(), AgentMode::Free);

    assert!(approx(outcome.rewards[&1].individual, -0.2));
    assert!(approx(outcome.rewards[&2].individual, 0.2));
    assert!(approx(harness.game.state().aggregator(Team::Blue).pending(), 0.1));
    assert!(outcome.events.contains(&MatchEvent::Jailed { agent: 1, by: 2 }));
    assert!(outcome.events.contains(&MatchEvent::Tagged {
        tagger: 2,
        target: 1,
        was_carrying: false
    }));
}

#[test]
fn tagged_carrier_drops_flag_home() {
    let mut harness = Harness::new(duel_scenario());
    pick_up_blue_flag(&mut harness);
    harness.place(1, point(5.0, 0.0));
    harness.place(2, point(5.5, 0.0));
    let outcome = harness.tick_idle();

    let flag = harness.game.state().flag(Team::Blue).unwrap();
    assert!(flag.is_at_home());
    assert!(flag.is_visible());
    assert_eq!(flag.carrier(), None);
    assert!(harness.game.agent(1).unwrap().is_jailed());

    // Flag loss then jail penalty.
    assert!(approx(outcome.rewards[&1].individual, -0.3 - 0.2));
    assert!(approx(outcome.rewards[&2].individual, 0.5));
    let state = harness.game.state();
    assert!(approx(state.aggregator(Team::Red).pending(), 0.3 - 0.1));
    assert!(approx(state.aggregator(Team::Blue).pending(), -0.3 + 0.3));
    assert!(outcome.events.contains(&MatchEvent::FlagReturned { team: Team::Blue }));
    assert!(outcome.events.contains(&MatchEvent::Tagged {
        tagger: 2,
        target: 1,
        was_carrying: true
    }));
}

#[test]
fn contact_across_the_line_tags_nobody() {
    let mut harness = Harness::new(duel_scenario());
    harness.place(1, point(-0.4, 0.0));
    harness.place(2, point(0.4, 0.0));
    let outcome = harness.tick_idle();

    assert_eq!(harness.game.agent(1).unwrap().mode(), AgentMode::Free);
    assert_eq!(harness.game.agent(2).unwrap().mode(), AgentMode::Free);
    assert!(!outcome
        .events
        .iter()
        .any(|e| matches!(e, MatchEvent::Jailed { .. })));
}

#[test]
fn mutual_intrusion_jails_both_without_tag_reward() {
    let mut harness = Harness::new(duel_scenario());
    harness.place(1, point(0.2, 0.0));
    harness.place(2, point(-0.2, 0.0));
    let outcome = harness.tick_idle();

    assert!(harness.game.agent(1).unwrap().is_jailed());
    assert!(harness.game.agent(2).unwrap().is_jailed());
    assert!(!outcome
        .events
        .iter()
        .any(|e| matches!(e, MatchEvent::Tagged { .. })));
    assert!(approx(outcome.rewards[&1].individual, -0.2));
    assert!(approx(outcome.rewards[&2].individual, -0.2));
}

#[test]
fn jailed_agent_is_released_after_timer() {
    let mut config = duel_scenario();
    config.rules.jail_seconds = 0.1;
    let mut harness = Harness::new(config);
    harness.place(1, point(5.0, 0.0));
    harness.place(2, point(5.5, 0.0));
    harness.tick_idle();
    assert_eq!(harness.game.agent(1).unwrap().jail_duration(), 5);

    // Jailed agents ignore their actions.
    let forward = ActionPair::new(2, 2).unwrap();
    let mut actions = harness.idle_actions();
    actions.insert(1, forward);
    for remaining in (1..5).rev() {
        let outcome = harness.game.tick(&mut harness.arena, &actions).unwrap();
        assert_eq!(
            harness.game.agent(1).unwrap().mode(),
            AgentMode::Jailed {
                ticks_remaining: remaining
            }
        );
        assert!(outcome.events.is_empty());
        assert_eq!(harness.position(1), point(-30.0, -20.0));
    }

    let outcome = harness.tick_idle();
    assert_eq!(harness.game.agent(1).unwrap().mode(), AgentMode::Free);
    assert_eq!(harness.position(1), point(-22.0, -12.0));
    assert!(outcome.events.contains(&MatchEvent::Released { agent: 1 }));
}

#[test]
fn timeout_ends_episode_without_winner() {
    let mut config = duel_scenario();
    config.rules.max_steps = 5;
    let mut harness = Harness::new(config);

    for step in 1..5 {
        let outcome = harness.tick_idle();
        assert_eq!(outcome.step, step);
        assert!(!outcome.episode_ended());
    }
    let outcome = harness.tick_idle();
    let summary = outcome.episode_end.expect("fifth tick should time out");
    assert_eq!(summary.outcome, EpisodeOutcome::Timeout);
    assert_eq!(summary.steps, 5);
    assert_eq!(outcome.step, 0);
    assert_eq!(outcome.agent_ends[&1].winner, None);
    assert_eq!(outcome.agent_ends[&2].winner, None);
    assert!(outcome
        .events
        .iter()
        .any(|e| matches!(e, MatchEvent::GameReset { .. })));
}

#[test]
fn forward_action_moves_along_heading() {
    let mut harness = Harness::new(duel_scenario());
    let start = harness.position(1);
    let mut actions = harness.idle_actions();
    actions.insert(1, ActionPair::new(2, 1).unwrap());
    for _ in 0..10 {
        harness.game.tick(&mut harness.arena, &actions).unwrap();
    }

    let end = harness.position(1);
    assert!((distance(start, end) - 1.0).abs() < 1e-3);
    assert!(end.x > start.x);
}

#[test]
fn observation_reports_carried_flag() {
    let mut harness = Harness::new(unshaped_scenario());
    let before = harness.game.observe(&harness.arena, 1).unwrap();
    assert!(!before.is_carrying());
    assert_eq!(before.enemy_flag(), (20.0, 0.0));

    pick_up_blue_flag(&mut harness);
    let after = harness.game.observe(&harness.arena, 1).unwrap();
    assert!(after.is_carrying());
    assert_eq!(after.position(), (20.0, 0.0));
    assert_eq!(after.perception.len(), harness.arena.perception_len());
}

#[test]
fn observations_cover_every_agent() {
    let harness = Harness::new(unshaped_scenario());
    let observations = harness.game.observations(&harness.arena).unwrap();
    assert_eq!(observations.keys().copied().collect::<Vec<_>>(), vec![1, 2, 3, 4]);
}

fn is_flag_event(event: &MatchEvent) -> bool {
    matches!(
        event,
        MatchEvent::FlagPickedUp { .. }
            | MatchEvent::FlagCaptured { .. }
            | MatchEvent::FlagReturned { .. }
    )
}

#[test]
fn missing_flag_stays_inert_for_a_whole_episode() {
    let mut config = unshaped_scenario();
    config.blue.flag = None;
    config.rules.max_steps = 40;
    let mut harness = Harness::new(config);

    // Where the Blue flag would normally sit.
    harness.place(1, point(20.0, 0.0));
    let mut ended = false;
    for _ in 0..40 {
        let outcome = harness.tick_idle();
        assert!(!outcome.events.iter().any(is_flag_event));
        for id in 1..=4 {
            assert!(approx(outcome.reward(id), 0.0));
        }
        assert_eq!(harness.game.agent(1).unwrap().mode(), AgentMode::Free);
        if let Some(summary) = outcome.episode_end {
            assert_eq!(summary.outcome, EpisodeOutcome::Timeout);
            ended = true;
        }
    }
    assert!(ended);
    assert!(harness.game.state().flag(Team::Blue).is_none());
    assert!(harness.arena.flag(Team::Blue).is_none());

    // A missing flag is observed at the origin.
    let observation = harness.game.observe(&harness.arena, 1).unwrap();
    assert_eq!(observation.enemy_flag(), (0.0, 0.0));
    assert_eq!(observation.own_flag(), (-20.0, 0.0));
}

#[test]
fn missing_base_never_accepts_a_capture() {
    let mut config = unshaped_scenario();
    config.red.base = None;
    config.rules.max_steps = 40;
    let mut harness = Harness::new(config);

    pick_up_blue_flag(&mut harness);
    // Where the Red base would normally sit.
    harness.place(1, point(-20.0, 6.0));

    let mut ended = false;
    for _ in 1..40 {
        let outcome = harness.tick_idle();
        assert!(!outcome
            .events
            .iter()
            .any(|event| matches!(event, MatchEvent::FlagCaptured { .. })));
        assert_eq!(harness.game.state().score(Team::Red), 0);
        if let Some(summary) = outcome.episode_end {
            assert_eq!(summary.outcome, EpisodeOutcome::Timeout);
            assert_eq!(summary.scores[Team::Red], 0);
            ended = true;
        } else {
            assert!(approx(outcome.reward(1), 0.0));
            assert_eq!(
                harness.game.agent(1).unwrap().mode(),
                AgentMode::CarryingFlag(Team::Blue)
            );
        }
    }
    assert!(ended);
    // The reset sends the carried flag home.
    assert!(harness.game.state().flag(Team::Blue).unwrap().is_at_home());
    assert_eq!(harness.game.agent(1).unwrap().mode(), AgentMode::Free);
}
