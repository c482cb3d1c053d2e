//! Determinism and invariant tests over random action streams.

use ctf_core::agent::ActionPair;
use ctf_core::arena::Arena;
use ctf_core::error::CtfError;
use ctf_core::replay::Replay;
use ctf_core::simulation::CaptureTheFlag;
use ctf_test_utils::determinism::strategies::{arb_action_stream, arb_raw_action};
use ctf_test_utils::determinism::{hash_trace, verify_determinism};
use ctf_test_utils::fixtures::{duel_scenario, random_action_stream, standard_scenario};
use proptest::prelude::*;

proptest! {
    #[test]
    fn action_indices_outside_range_are_rejected((movement, turn) in arb_raw_action()) {
        match ActionPair::new(movement, turn) {
            Ok(action) => {
                prop_assert!(movement <= 2 && turn <= 2);
                prop_assert_eq!(action.movement_index(), movement);
                prop_assert_eq!(action.turn_index(), turn);
            }
            Err(CtfError::InvalidAction { channel, value }) => {
                prop_assert!(movement > 2 || turn > 2);
                if movement > 2 {
                    prop_assert_eq!((channel, value), ("move", movement));
                } else {
                    prop_assert_eq!((channel, value), ("turn", turn));
                }
            }
            Err(other) => prop_assert!(false, "unexpected error {:?}", other),
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn random_streams_replay_identically(stream in arb_action_stream(vec![1, 2, 3, 4], 150)) {
        let config = standard_scenario();
        prop_assert_eq!(hash_trace(&config, &stream), hash_trace(&config, &stream));
    }

    #[test]
    fn invariants_hold_every_tick(stream in arb_action_stream(vec![1, 2], 300)) {
        let config = duel_scenario();
        let mut arena = Arena::from_scenario(&config);
        let mut game = CaptureTheFlag::new(&config, &mut arena).unwrap();
        for actions in &stream {
            let outcome = game.tick(&mut arena, actions).unwrap();
            prop_assert_eq!(outcome.rewards.len(), 2);
            game.state().check_invariants(game.roster(), &arena).unwrap();
            for flag in game.state().flags().iter().filter_map(|(_, f)| f.as_ref()) {
                prop_assert_eq!(flag.is_carried(), !flag.is_visible());
            }
        }
    }

    #[test]
    fn recorded_replay_verifies(stream in arb_action_stream(vec![1, 2, 3, 4], 80)) {
        let config = standard_scenario();
        let mut arena = Arena::from_scenario(&config);
        let mut game = CaptureTheFlag::new(&config, &mut arena).unwrap();
        let mut replay = Replay::new(config);
        for actions in &stream {
            replay.record_tick(actions);
            game.tick(&mut arena, actions).unwrap();
        }
        replay.finalize(game.state_hash_with(&arena));
        prop_assert!(replay.verify().unwrap());
    }
}

#[test]
fn long_random_episode_is_deterministic() {
    let mut config = standard_scenario();
    config.rules.max_steps = 400;
    let stream = random_action_stream(&[1, 2, 3, 4], 1_000, 2024);
    let result = verify_determinism(&config, &stream, 3);
    result.assert_deterministic();
    assert_eq!(result.unique_hashes().len(), 1);
}
