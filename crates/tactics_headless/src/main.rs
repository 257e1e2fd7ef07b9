//! Headless tactics runner.
//!
//! # Usage
//!
//! ```bash
//! # Run a scenario, printing one JSON report per tick
//! cargo run -p tactics_headless -- run --scenario crates/tactics_headless/scenarios/skirmish.ron
//!
//! # Time the controller on a scenario
//! cargo run -p tactics_headless -- bench --scenario crates/tactics_headless/scenarios/skirmish.ron --ticks 1000
//!
//! # Validate a controller config file
//! cargo run -p tactics_headless -- check-config tactics.ron
//! ```

use std::io::BufWriter;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tactics_core::config::TacticsConfig;
use tactics_headless::{RunError, Scenario, ScenarioRunner};

#[derive(Parser)]
#[command(name = "tactics_headless")]
#[command(about = "Headless runner for the tactical combat controller")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario and print tick reports as JSON lines
    Run {
        /// Scenario file to load
        #[arg(short, long)]
        scenario: PathBuf,

        /// Override the scenario's tick count
        #[arg(short, long)]
        ticks: Option<u64>,
    },

    /// Run N ticks for benchmarking
    Bench {
        /// Scenario file to load (built-in skirmish when absent)
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Number of ticks to run
        #[arg(short, long, default_value = "1000")]
        ticks: u64,
    },

    /// Parse and validate a controller config
    CheckConfig {
        /// RON config file
        path: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    // Stdout carries reports, logs go to stderr
    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(tracing_subscriber::filter::LevelFilter::from_level(
            log_level,
        ))
        .init();

    let result = match cli.command {
        Commands::Run { scenario, ticks } => cmd_run(&scenario, ticks),
        Commands::Bench { scenario, ticks } => cmd_bench(scenario.as_deref(), ticks),
        Commands::CheckConfig { path } => cmd_check_config(&path),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

/// Run a scenario to completion.
fn cmd_run(path: &Path, ticks: Option<u64>) -> Result<(), RunError> {
    let scenario = Scenario::load(path)?;
    let ticks = ticks.unwrap_or(scenario.ticks);
    tracing::info!(scenario = %scenario.name, ticks, "Running scenario");

    let mut runner = ScenarioRunner::new(&scenario)?;
    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    runner.run_to_writer(ticks, &mut out)?;

    tracing::info!(alive = runner.alive(), "Scenario finished");
    Ok(())
}

/// Time the controller on a scenario.
fn cmd_bench(path: Option<&Path>, ticks: u64) -> Result<(), RunError> {
    let scenario = match path {
        Some(path) => Scenario::load(path)?,
        None => Scenario::skirmish(),
    };
    tracing::info!(scenario = %scenario.name, ticks, "Benchmarking");

    let mut runner = ScenarioRunner::new(&scenario)?;
    let timing = runner.bench(ticks)?;

    eprintln!("\n{}", "=".repeat(50));
    eprintln!("BENCHMARK RESULTS");
    eprintln!("{}", "=".repeat(50));
    eprintln!("Ticks: {}", timing.ticks);
    eprintln!("Mean: {:.1}us/tick", timing.mean_us);
    eprintln!("Max: {:.1}us", timing.max_us);
    eprintln!("Directives: {}", timing.directives);
    eprintln!("Suppressed: {}", timing.suppressed);
    Ok(())
}

/// Validate a config file and print it back normalised.
fn cmd_check_config(path: &Path) -> Result<(), RunError> {
    let contents = std::fs::read_to_string(path)?;
    let config = TacticsConfig::from_ron_str(&contents)?;
    println!("{}", config.to_ron_string()?);
    tracing::info!(path = %path.display(), "Config is valid");
    Ok(())
}
