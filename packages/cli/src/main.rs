use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use stalemate_core::domain::LedgerSnapshot;
use stalemate_core::{
    AllocationEngine, DetectionMode, ProcessId, RequestResult, ResourceId, Scenario, Units, Victim,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Stalemate CLI
/// Loads a scenario, runs one engine operation and prints the result as JSON
#[derive(Parser)]
#[command(name = "stalemate")]
#[command(about = "Deadlock detection, prevention and resolution", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report the first cycle, or null
    Detect {
        #[arg(short, long)]
        scenario: PathBuf,
        #[arg(short, long, value_enum, default_value_t = Mode::Allocation)]
        mode: Mode,
    },
    /// Detect, kill every process on the cycle and print the victims
    Resolve {
        #[arg(short, long)]
        scenario: PathBuf,
        #[arg(short, long, value_enum, default_value_t = Mode::Allocation)]
        mode: Mode,
    },
    /// Submit one request and print the outcome
    Request {
        #[arg(short, long)]
        scenario: PathBuf,
        #[arg(short, long)]
        process: usize,
        #[arg(short, long)]
        resource: usize,
        #[arg(short, long, default_value_t = 1)]
        units: Units,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    /// Bipartite process/resource graph
    Allocation,
    /// Process-only wait-for graph
    WaitFor,
}

impl From<Mode> for DetectionMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Allocation => Self::AllocationGraph,
            Mode::WaitFor => Self::WaitForGraph,
        }
    }
}

#[derive(Serialize)]
struct ResolveReport {
    victims: Vec<Victim>,
    snapshot: LedgerSnapshot,
}

#[derive(Serialize)]
struct RequestReport {
    result: RequestResult,
    snapshot: LedgerSnapshot,
}

fn load_engine(path: &Path) -> Result<AllocationEngine> {
    let scenario = Scenario::load(path).with_context(|| format!("Failed to load {}", path.display()))?;
    scenario
        .into_engine()
        .with_context(|| format!("Failed to build engine from {}", path.display()))
}

fn print_json(value: &impl Serialize) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to encode output")?;
    println!("{json}");
    Ok(())
}

fn main() -> Result<()> {
    // stdout carries JSON; logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Detect { scenario, mode } => {
            let engine = load_engine(&scenario)?;
            let record = engine.detect_deadlock_in(mode.into());
            print_json(&record)?;
        }
        Commands::Resolve { scenario, mode } => {
            let mut engine = load_engine(&scenario)?;
            let victims = match engine.detect_deadlock_in(mode.into()) {
                Some(record) => engine.resolve_deadlock(&record).context("Failed to resolve deadlock")?,
                None => {
                    info!("no deadlock to resolve");
                    Vec::new()
                }
            };
            print_json(&ResolveReport {
                victims,
                snapshot: engine.snapshot(),
            })?;
        }
        Commands::Request {
            scenario,
            process,
            resource,
            units,
        } => {
            let mut engine = load_engine(&scenario)?;
            let result = engine
                .request_resource(ProcessId(process), ResourceId(resource), units)
                .with_context(|| format!("Request P{process} R{resource} x{units} rejected"))?;
            print_json(&RequestReport {
                result,
                snapshot: engine.snapshot(),
            })?;
        }
    }

    Ok(())
}
