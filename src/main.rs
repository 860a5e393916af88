//! sparsefsm - Sparse state machine toolkit
//!
//! Drives the combination lock interactively or from a script, renders
//! machine diagrams and validates declarative table files.

mod commands;
mod config;
mod repl;

use clap::{Parser, Subcommand};
use colored::Colorize;
use config::Config;
use sparsefsm_diagram::DiagramFormat;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sparsefsm")]
#[command(about = "Sparse, semi-hierarchical finite state machine toolkit")]
#[command(version)]
struct Cli {
    /// YAML configuration file
    #[arg(short, long, env = "SPARSEFSM_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start interactive lock REPL
    Repl,

    /// Feed inputs to a fresh lock and print each resulting state
    Run {
        /// Digits (0-9) or event names: lock, open, setcombo, shutdown, garbage
        #[arg(required = true)]
        events: Vec<String>,
    },

    /// Print a machine diagram
    Diagram {
        /// Output format (dot or mermaid)
        #[arg(short, long, default_value = "dot")]
        format: DiagramFormat,

        /// Declarative table file (defaults to the built-in lock machine)
        file: Option<PathBuf>,
    },

    /// Validate a declarative table file
    Validate {
        /// Table file (.json, .yaml or .yml)
        file: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            std::process::exit(2);
        }
    };

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(&config.log_level))
                .unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Some(path) = &cli.config {
        tracing::info!("Loaded config from {}", path.display());
    }

    match cli.command {
        Some(Commands::Repl) | None => repl::run(&config)?,

        Some(Commands::Run { events }) => {
            println!("{}", commands::run(&config, &events));
        }

        Some(Commands::Diagram { format, file }) => {
            print!("{}", commands::diagram(&config, format, file.as_deref())?);
        }

        Some(Commands::Validate { file }) => {
            let validation = commands::validate(&file)?;
            print!("{}", validation.output);
            if validation.diagnostics > 0 {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
