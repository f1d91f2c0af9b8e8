//! Ratchet - CLI

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use std::path::PathBuf;

use ratchet::scenarios::{self, Scenario};
use ratchet::util::config::{self, EngineConfig};
use ratchet::util::logger::{self, LogLevel};
use ratchet::{NAME, VERSION};

/// A renderer-agnostic runtime for generator-driven UI components
#[derive(Parser, Debug)]
#[command(name = "ratchet")]
#[command(author = "Ratchet Team")]
#[command(version = VERSION)]
#[command(about = NAME, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Engine config file (RON)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a bundled scenario against the in-memory host
    Scenario {
        /// Scenario to run
        #[arg(value_enum)]
        name: Scenario,
    },

    /// Print the effective engine configuration
    Config,

    /// Print version information
    Version,
}

fn load(path: Option<&PathBuf>) -> Result<EngineConfig> {
    match path {
        Some(path) => config::load_config(path)
            .with_context(|| format!("Failed to load config: {}", path.display())),
        None => config::load_default_config().context("Failed to load config"),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.verbose {
        logger::init_with_level(LogLevel::Debug);
        eprintln!("Ratchet version: {}", VERSION);
    } else {
        logger::init();
    }

    let engine_config = load(args.config.as_ref())?;

    match args.command {
        Commands::Scenario { name } => {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .context("Failed to start runtime")?;
            let local = tokio::task::LocalSet::new();
            let report = local
                .block_on(&runtime, scenarios::run(name, engine_config))
                .with_context(|| format!("Scenario failed: {}", name))?;

            println!("{} {}", "scenario".bold(), name.cyan());
            for (index, frame) in report.frames.iter().enumerate() {
                let shown = if frame.is_empty() { "(empty)" } else { frame.as_str() };
                println!("  {} {}", format!("frame {}", index).dimmed(), shown);
            }
            for note in &report.notes {
                println!("  {} {}", "-".yellow(), note);
            }
            println!("  {} {}", "executions".dimmed(), report.executions.green());
        }
        Commands::Config => {
            print!("{}", config::to_ron_string(&engine_config)?);
            println!();
        }
        Commands::Version => {
            println!("{} {}", NAME, VERSION);
        }
    }

    Ok(())
}
