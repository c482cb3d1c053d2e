//! Headless capture-the-flag runner.
//!
//! # Usage
//!
//! ```bash
//! # Play episodes and print the JSON report
//! cargo run -p ctf_headless -- run --scenario standard_2v2 --episodes 3
//!
//! # Record a replay while playing
//! cargo run -p ctf_headless -- run --replay episode.bin
//!
//! # Run a batch in parallel
//! cargo run -p ctf_headless -- batch --scenario duel_1v1 --count 1000 --output results/
//!
//! # Verify determinism, or a recorded replay
//! cargo run -p ctf_headless -- verify --seed 12345 --runs 5
//! cargo run -p ctf_headless -- verify --replay episode.bin
//!
//! # Validate a scenario file
//! cargo run -p ctf_headless -- validate --scenario my_field.ron
//! ```
//!
//! Reports go to stdout, logs to stderr. `RUST_LOG` overrides `--verbose`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use ctf_core::config::ScenarioConfig;
use ctf_core::replay::Replay;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ctf_headless::{
    batch::{run_batch, verify_determinism, BatchConfig},
    metrics::save_json,
    policy::PolicyKind,
    runner::{run, RunOptions},
    scenario,
};

#[derive(Parser)]
#[command(name = "ctf_headless")]
#[command(about = "Headless capture-the-flag runner for policy tests and CI")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Play episodes and print a JSON report
    Run {
        /// Built-in scenario name or RON file
        #[arg(short, long, default_value = "standard_2v2")]
        scenario: String,

        /// Episodes to play
        #[arg(short, long, default_value = "1")]
        episodes: u32,

        /// Red team policy
        #[arg(long, value_enum, default_value_t = PolicyKind::Scripted)]
        red: PolicyKind,

        /// Blue team policy
        #[arg(long, value_enum, default_value_t = PolicyKind::Scripted)]
        blue: PolicyKind,

        /// Seed for random policies
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Write the report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Record a replay to this file
        #[arg(long)]
        replay: Option<PathBuf>,
    },

    /// Run a batch of seeded episodes in parallel
    Batch {
        /// Built-in scenario name or RON file
        #[arg(short, long, default_value = "standard_2v2")]
        scenario: String,

        /// Number of episodes to run
        #[arg(short, long, default_value = "100")]
        count: u32,

        /// Maximum parallel episodes (0 = auto)
        #[arg(short, long, default_value = "0")]
        parallel: u32,

        /// Starting random seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Red team policy
        #[arg(long, value_enum, default_value_t = PolicyKind::Scripted)]
        red: PolicyKind,

        /// Blue team policy
        #[arg(long, value_enum, default_value_t = PolicyKind::Random)]
        blue: PolicyKind,

        /// Output directory for results
        #[arg(short, long, default_value = "results")]
        output: PathBuf,
    },

    /// Verify determinism by repeating a seeded run, or check a replay
    Verify {
        /// Built-in scenario name or RON file
        #[arg(short, long, default_value = "standard_2v2")]
        scenario: String,

        /// Seed to verify
        #[arg(long, default_value = "12345")]
        seed: u64,

        /// Number of verification runs
        #[arg(short, long, default_value = "5")]
        runs: u32,

        /// Verify this replay file instead
        #[arg(long)]
        replay: Option<PathBuf>,
    },

    /// Parse and validate a scenario
    Validate {
        /// Built-in scenario name or RON file
        #[arg(short, long)]
        scenario: String,

        /// Print the scenario back as RON with every default filled in
        #[arg(long)]
        dump: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    // Logs go to stderr; stdout is for reports
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(filter)
        .init();

    match cli.command {
        Some(Commands::Run {
            scenario,
            episodes,
            red,
            blue,
            seed,
            output,
            replay,
        }) => {
            let options = RunOptions {
                episodes,
                red,
                blue,
                seed,
                record_replay: replay.is_some(),
            };
            cmd_run(&scenario, options, output, replay);
        }
        Some(Commands::Batch {
            scenario,
            count,
            parallel,
            seed,
            red,
            blue,
            output,
        }) => {
            let config = BatchConfig {
                scenario,
                episode_count: count,
                parallel,
                seed_start: seed,
                red,
                blue,
            };
            cmd_batch(config, output);
        }
        Some(Commands::Verify {
            scenario,
            seed,
            runs,
            replay,
        }) => match replay {
            Some(file) => cmd_verify_replay(file),
            None => cmd_verify(&scenario, seed, runs),
        },
        Some(Commands::Validate { scenario, dump }) => {
            cmd_validate(&scenario, dump);
        }
        None => {
            cmd_run("standard_2v2", RunOptions::default(), None, None);
        }
    }
}

/// Resolve a scenario or exit.
fn load_scenario(name: &str) -> ScenarioConfig {
    match scenario::resolve(name) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to load scenario '{}': {}", name, e);
            std::process::exit(1);
        }
    }
}

/// Play episodes and print the report
fn cmd_run(name: &str, options: RunOptions, output: Option<PathBuf>, replay_path: Option<PathBuf>) {
    let scenario = load_scenario(name);
    tracing::info!(
        scenario = %scenario.name,
        episodes = options.episodes,
        red = %options.red,
        blue = %options.blue,
        seed = options.seed,
        "Starting run"
    );

    let mut report = match run(scenario, options) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Run failed: {}", e);
            std::process::exit(1);
        }
    };

    if let (Some(path), Some(replay)) = (replay_path, report.replay.take()) {
        if let Err(e) = replay.save(&path) {
            eprintln!("Failed to save replay: {}", e);
            std::process::exit(1);
        }
        eprintln!("Replay saved to: {} ({} ticks)", path.display(), replay.duration());
    }

    match output {
        Some(path) => {
            if let Err(e) = save_json(&report, &path) {
                eprintln!("Failed to write report: {}", e);
                std::process::exit(1);
            }
            eprintln!("Report saved to: {}", path.display());
        }
        None => match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Failed to encode report: {}", e);
                std::process::exit(1);
            }
        },
    }
}

/// Run batch of episodes
fn cmd_batch(config: BatchConfig, output: PathBuf) {
    let scenario = load_scenario(&config.scenario);
    let num_cpus = std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(1);

    tracing::info!(
        scenario = %config.scenario,
        count = config.episode_count,
        parallel = config.parallel,
        seed = config.seed_start,
        output = %output.display(),
        cpus_available = num_cpus,
        "Batch configuration"
    );

    if let Err(e) = std::fs::create_dir_all(&output) {
        tracing::error!(error = %e, path = %output.display(), "Failed to create output directory");
        eprintln!(
            "FATAL: Cannot create output directory '{}': {}",
            output.display(),
            e
        );
        std::process::exit(1);
    }

    let results = run_batch(&scenario, config);

    let results_path = output.join("batch_results.json");
    if let Err(e) = results.save(&results_path) {
        tracing::error!(error = %e, path = %results_path.display(), "Failed to save results");
        eprintln!("FATAL: Failed to save results: {}", e);
        std::process::exit(1);
    }

    eprintln!("\n{}", "=".repeat(50));
    eprintln!("BATCH COMPLETE");
    eprintln!("{}", "=".repeat(50));
    eprintln!("Episodes played: {}", results.episodes.len());
    if !results.errors.is_empty() {
        eprintln!("Episodes FAILED: {}", results.errors.len());
    }
    eprintln!("Duration: {:.1}s", results.duration_seconds);
    eprintln!(
        "Throughput: {:.1} episodes/sec",
        results.episodes.len() as f64 / results.duration_seconds.max(0.001)
    );
    eprintln!("\nWin Rates:");
    for (team, rate) in &results.summary.win_rates {
        eprintln!("  {}: {:.1}%", team, rate * 100.0);
    }
    eprintln!("  Timeouts: {}", results.summary.timeouts);
    eprintln!("Average steps: {:.1}", results.summary.average_steps);

    if !results.errors.is_empty() {
        eprintln!("\nEPISODE FAILURES:");
        for error in results.errors.iter().take(10) {
            eprintln!(
                "  Episode {} (seed {}): {}",
                error.index, error.seed, error.message
            );
        }
        if results.errors.len() > 10 {
            eprintln!("  ... and {} more failures", results.errors.len() - 10);
        }
    }

    eprintln!("\nResults saved to: {}", results_path.display());
}

/// Verify determinism
fn cmd_verify(name: &str, seed: u64, runs: u32) {
    let scenario = load_scenario(name);
    tracing::info!(
        "Verifying determinism: {} with seed {} ({} runs)",
        scenario.name,
        seed,
        runs
    );

    let options = RunOptions {
        red: PolicyKind::Random,
        blue: PolicyKind::Random,
        seed,
        ..RunOptions::default()
    };
    let report = match verify_determinism(&scenario, &options, runs) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("FAIL: Error during verification: {}", e);
            std::process::exit(1);
        }
    };

    if report.is_deterministic() {
        eprintln!("PASS: All {} runs produced identical results", runs);
        if let Some(hash) = report.hashes.first() {
            eprintln!("  Final hash: {:016x}", hash);
        }
    } else {
        eprintln!("FAIL: Non-determinism detected!");
        for (i, (hash, ticks)) in report.hashes.iter().zip(&report.ticks).enumerate() {
            eprintln!("  Run {}: {:016x} after {} ticks", i, hash, ticks);
        }
        std::process::exit(1);
    }
}

/// Verify a recorded replay
fn cmd_verify_replay(file: PathBuf) {
    tracing::info!("Verifying replay: {}", file.display());

    let replay = match Replay::load(&file) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Failed to load replay: {}", e);
            std::process::exit(1);
        }
    };

    eprintln!("Loaded replay:");
    eprintln!("  Scenario: {}", replay.scenario.name);
    eprintln!("  Duration: {} ticks", replay.duration());

    match replay.play() {
        Ok(hash) if hash == replay.final_hash => {
            eprintln!("PASS: Replay verification successful");
            eprintln!("  Hash: {:016x}", hash);
        }
        Ok(hash) => {
            eprintln!("FAIL: Replay produced different hash!");
            eprintln!("  Expected: {:016x}", replay.final_hash);
            eprintln!("  Actual:   {:016x}", hash);
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("FAIL: Error during verification: {}", e);
            std::process::exit(1);
        }
    }
}

/// Validate a scenario
fn cmd_validate(name: &str, dump: bool) {
    let scenario = load_scenario(name);

    eprintln!("OK: {}", scenario.name);
    if !scenario.description.is_empty() {
        eprintln!("  {}", scenario.description);
    }
    eprintln!(
        "  Agents: Red {} / Blue {}",
        scenario.red.agents.len(),
        scenario.blue.agents.len()
    );
    eprintln!(
        "  Rules: score to win {}, max steps {}, {} ticks/s, jail {} ticks",
        scenario.rules.score_to_win,
        scenario.rules.max_steps,
        scenario.rules.tick_rate,
        scenario.rules.jail_duration_ticks()
    );
    for (team, layout) in [("Red", &scenario.red), ("Blue", &scenario.blue)] {
        if layout.flag.is_none() {
            eprintln!("  Warning: {} has no flag", team);
        }
        if layout.base.is_none() {
            eprintln!("  Warning: {} has no base, it cannot score", team);
        }
    }

    if dump {
        match scenario.to_ron_string() {
            Ok(ron) => println!("{}", ron),
            Err(e) => {
                eprintln!("Failed to render scenario: {}", e);
                std::process::exit(1);
            }
        }
    }
}
