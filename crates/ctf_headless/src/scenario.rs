//! Scenario loading.
//!
//! Scenarios are [`ScenarioConfig`] values read from RON files or picked from
//! a small set of built-in fields by name.

use std::path::Path;

use ctf_core::config::{AgentSpawn, BaseZone, ScenarioConfig, TeamLayout};
use ctf_core::error::CtfError;
use thiserror::Error;

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// Parsed, but the core rejects it.
    #[error("Invalid scenario: {0}")]
    Invalid(#[from] CtfError),
}

/// Names accepted by [`builtin`].
pub const BUILTIN_SCENARIOS: [&str; 2] = ["standard_2v2", "duel_1v1"];

/// Load and validate a scenario from a RON file.
pub fn load<P: AsRef<Path>>(path: P) -> Result<ScenarioConfig, ScenarioError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ScenarioError::FileNotFound(path.display().to_string()));
    }
    let contents = std::fs::read_to_string(path)?;
    from_ron_str(&contents)
}

/// Parse and validate a scenario from RON text.
pub fn from_ron_str(ron: &str) -> Result<ScenarioConfig, ScenarioError> {
    let scenario: ScenarioConfig = ron::from_str(ron)?;
    scenario.validate()?;
    Ok(scenario)
}

/// A built-in scenario by name.
#[must_use]
pub fn builtin(name: &str) -> Option<ScenarioConfig> {
    match name {
        "standard_2v2" => Some(ScenarioConfig::standard_2v2()),
        "duel_1v1" => Some(duel_1v1()),
        _ => None,
    }
}

/// Resolve a built-in name or a path to a RON file.
pub fn resolve(name_or_path: &str) -> Result<ScenarioConfig, ScenarioError> {
    match builtin(name_or_path) {
        Some(scenario) => Ok(scenario),
        None => load(name_or_path),
    }
}

/// One agent per team on an open field, first capture wins.
#[must_use]
pub fn duel_1v1() -> ScenarioConfig {
    let mut config = ScenarioConfig::standard_2v2();
    config.name = "Duel 1v1".to_string();
    config.description = "One agent per team, no interior obstacles, first capture wins".to_string();
    config.rules.score_to_win = 1;
    config.rules.max_steps = 3_000;
    config.arena.obstacles.clear();
    config.red = TeamLayout {
        agents: vec![AgentSpawn::new(1, (-10.0, 0.0), 90.0)],
        flag: Some((-20.0, 0.0)),
        base: Some(BaseZone::new((-20.0, 6.0), (2.5, 2.5))),
        jail: (-30.0, -20.0),
        release: (-22.0, -12.0),
    };
    config.blue = TeamLayout {
        agents: vec![AgentSpawn::new(2, (10.0, 0.0), 270.0)],
        flag: Some((20.0, 0.0)),
        base: Some(BaseZone::new((20.0, 6.0), (2.5, 2.5))),
        jail: (30.0, -20.0),
        release: (22.0, -12.0),
    };
    config
}
