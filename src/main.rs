//! Squad DPS - Command Line Runner
//!
//! Loads a character roster and a run config, then runs a single fight or a
//! parallel batch and prints the result as text or JSON.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use squad_dps::core::error::Result;
use squad_dps::data::CharacterRoster;
use squad_dps::simulation::{
    run_batch, LogEntry, NullObserver, RunConfig, SimObserver, Simulation,
};

/// Squad DPS simulator
#[derive(Parser, Debug)]
#[command(name = "squad-sim")]
#[command(about = "Simulate a five-character squad against a single enemy")]
struct Args {
    /// Directory of character definition files (*.toml)
    #[arg(long, default_value = "data/characters")]
    characters: PathBuf,

    /// Run config file
    #[arg(long, default_value = "data/run.toml")]
    config: PathBuf,

    /// Number of independent runs (overrides the config)
    #[arg(long)]
    runs: Option<u32>,

    /// Base random seed (overrides the config)
    #[arg(long)]
    seed: Option<u64>,

    /// Simulated seconds per run (overrides the config)
    #[arg(long)]
    duration: Option<f64>,

    /// Real-time pacing multiplier for single runs
    #[arg(long)]
    speed: Option<f64>,

    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,

    /// Echo combat log lines while a single run is in flight
    #[arg(long, short = 'v')]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

/// Prints log lines as they are recorded
struct LogEcho;

impl SimObserver for LogEcho {
    fn on_log(&mut self, entry: &LogEntry) {
        println!("[{:>7.2}] {:?}: {}", entry.time, entry.kind, entry.message);
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("squad_dps=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "squad-sim failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    let roster = Arc::new(CharacterRoster::load_dir(&args.characters)?);

    let mut config = RunConfig::load(&args.config)?;
    if let Some(runs) = args.runs {
        config.runs = runs;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(duration) = args.duration {
        config.duration = duration;
    }
    if args.speed.is_some() {
        config.speed = args.speed;
    }

    if config.runs > 1 {
        let batch = run_batch(roster, &config)?;
        match args.format {
            Format::Json => println!("{}", batch.to_json()),
            Format::Text => println!("{}", batch.summary()),
        }
        return Ok(());
    }

    let seed = config.seed;
    let mut sim = Simulation::new(roster, config, seed)?;
    let summary = if args.verbose {
        sim.run(&mut LogEcho)?
    } else {
        sim.run(&mut NullObserver)?
    };
    match args.format {
        Format::Json => println!("{}", summary.to_json()),
        Format::Text => println!("{}", summary.summary()),
    }
    Ok(())
}
