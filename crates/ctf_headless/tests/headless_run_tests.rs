//! End-to-end runs through the headless runner.

use ctf_core::replay::Replay;
use ctf_headless::{
    batch::{run_batch, BatchConfig, BatchResults},
    metrics::save_json,
    policy::PolicyKind,
    runner::{run, RunOptions},
    scenario,
};
use ctf_test_utils::fixtures::duel_scenario;

fn short_duel() -> ctf_core::config::ScenarioConfig {
    let mut config = duel_scenario();
    config.rules.max_steps = 120;
    config
}

#[test]
fn report_is_written_as_json() {
    let options = RunOptions {
        red: PolicyKind::Scripted,
        blue: PolicyKind::Random,
        seed: 3,
        ..RunOptions::default()
    };
    let report = run(short_duel(), options).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reports").join("run.json");
    save_json(&report, &path).unwrap();

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(json["scenario"], "Duel");
    assert_eq!(json["episodes"].as_array().unwrap().len(), 1);
    assert_eq!(json["final_hash"].as_u64(), Some(report.final_hash));
    assert_eq!(json["options"]["blue"], "random");
    assert!(json.get("replay").is_none());
}

#[test]
fn saved_replay_verifies_after_reload() {
    let options = RunOptions {
        episodes: 2,
        red: PolicyKind::Random,
        blue: PolicyKind::Scripted,
        seed: 21,
        record_replay: true,
    };
    let report = run(short_duel(), options).unwrap();
    let replay = report.replay.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("episode.bin");
    replay.save(&path).unwrap();

    let loaded = Replay::load(&path).unwrap();
    assert_eq!(loaded.duration(), report.ticks);
    assert_eq!(loaded.play().unwrap(), report.final_hash);
    assert!(loaded.verify().unwrap());
}

#[test]
fn scenario_file_on_disk_resolves_and_runs() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("field.ron");
    std::fs::write(&path, short_duel().to_ron_string().unwrap()).unwrap();

    let loaded = scenario::resolve(path.to_str().unwrap()).unwrap();
    assert_eq!(loaded.name, "Duel");
    assert_eq!(loaded.rules.max_steps, 120);

    let options = RunOptions {
        red: PolicyKind::Idle,
        blue: PolicyKind::Idle,
        ..RunOptions::default()
    };
    let report = run(loaded, options).unwrap();
    assert_eq!(report.ticks, 120);
    assert_eq!(report.summary.timeouts, 1);
}

#[test]
fn missing_scenario_file_is_reported() {
    let err = scenario::resolve("no_such_field.ron").unwrap_err();
    assert!(err.to_string().contains("not found"));
}

#[test]
fn batch_results_reload_with_same_hashes() {
    let config = BatchConfig::new("duel", 4)
        .with_seed(100)
        .with_policies(PolicyKind::Random, PolicyKind::Random);
    let results = run_batch(&short_duel(), config);
    assert!(results.errors.is_empty());
    assert_eq!(results.episodes[2].seed, 102);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("batch_results.json");
    results.save(&path).unwrap();

    let loaded = BatchResults::load(&path).unwrap();
    let hashes: Vec<u64> = loaded.episodes.iter().map(|e| e.final_hash).collect();
    let expected: Vec<u64> = results.episodes.iter().map(|e| e.final_hash).collect();
    assert_eq!(hashes, expected);
}
