//! Combat engine development tools

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use combat_core::config::CombatConfig;
use combat_tools::error::Result;
use combat_tools::scenario::Scenario;
use combat_tools::validate::load_config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "combat-tools")]
#[command(about = "Development tools for the combat resolution engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a combat config file
    Validate {
        /// Path to a RON config
        path: PathBuf,
    },
    /// Run a scenario headless and print a JSON report
    Simulate {
        /// Path to a RON scenario
        scenario: PathBuf,
        /// Config override; defaults are used otherwise
        #[arg(long)]
        config: Option<PathBuf>,
        /// Pretty-print the report
        #[arg(long)]
        pretty: bool,
    },
    /// Print the default config as RON
    DefaultConfig,
}

fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli.command) {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Validate { path } => {
            tracing::info!("Validating config: {}", path.display());
            load_config(&path)?;
            tracing::info!("Validation passed");
        }
        Commands::Simulate {
            scenario,
            config,
            pretty,
        } => {
            let config = match config {
                Some(path) => load_config(&path)?,
                None => CombatConfig::default(),
            };
            let report = Scenario::load(&scenario)?.run(config)?;
            let json = if pretty {
                serde_json::to_string_pretty(&report)?
            } else {
                serde_json::to_string(&report)?
            };
            println!("{json}");
        }
        Commands::DefaultConfig => {
            println!("{}", CombatConfig::default().to_ron_string()?);
        }
    }
    Ok(())
}
