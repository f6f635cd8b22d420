//! Neurogen - maintenance tool for the brain state engine
//!
//! Inspects and drives the live brain and its archive from the command line.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use neurogen_core::{BrainConfig, BrainManager, LearningData};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, Level};
use tracing_subscriber::{self, EnvFilter};

#[derive(Parser)]
#[command(name = "neurogen")]
#[command(about = "Self-evolving brain state engine", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML)
    #[arg(short, long, env = "NEUROGEN_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding both stores (overrides the configured paths)
    #[arg(long, env = "NEUROGEN_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Set log level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the live generation, status and weights
    Status,

    /// Show archive statistics merged with the live state
    Stats,

    /// Show an archived generation
    Show {
        /// Generation number
        generation: u64,
    },

    /// List decisions archived against a generation
    Decisions {
        /// Generation number
        generation: u64,
    },

    /// Archive the live generation and back up the fast store
    HotSwitch,

    /// Advance one generation
    Evolve {
        /// Performance score of the generation just completed
        #[arg(short, long)]
        score: f64,

        /// Learning data as a JSON object
        #[arg(long)]
        learning: Option<String>,
    },

    /// Record a decision in the live generation
    Record {
        /// Ticker symbol
        symbol: String,

        /// Decided action (BUY, HOLD, PASS)
        action: String,

        /// Decision confidence
        confidence: f64,
    },
}

fn load_config(cli: &Cli) -> Result<BrainConfig> {
    let mut config = match &cli.config {
        Some(path) => BrainConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => BrainConfig::default(),
    };

    if let Some(dir) = &cli.data_dir {
        let placed = BrainConfig::in_dir(dir);
        config.fast_store_path = placed.fast_store_path;
        config.archive_path = placed.archive_path;
    }

    config.validate()?;
    Ok(config)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "neurogen={level},neurogen_core={level}",
            level = level.as_str().to_lowercase()
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    debug!("Neurogen v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = load_config(&cli)?;
    let manager = BrainManager::open(config)
        .await
        .context("Failed to open brain stores")?;

    match cli.command {
        Commands::Status => print_json(&manager.current_status().await)?,
        Commands::Stats => print_json(&manager.statistics().await?)?,
        Commands::Show { generation } => match manager.load_generation(generation).await? {
            Some(state) => print_json(&state)?,
            None => anyhow::bail!("Generation {} is not archived", generation),
        },
        Commands::Decisions { generation } => {
            print_json(&manager.decisions_for_generation(generation).await?)?
        }
        Commands::HotSwitch => {
            let report = manager.hot_switch().await?;
            println!(
                "Archived generation {} ({} decisions)",
                report.receipt.generation, report.receipt.decisions_archived
            );
            if let Some(path) = report.backup_path {
                println!("Backup: {}", path.display());
            }
            manager.shutdown().await?;
        }
        Commands::Evolve { score, learning } => {
            let learning_data = match learning {
                Some(raw) => {
                    let value: serde_json::Value =
                        serde_json::from_str(&raw).context("Learning data is not valid JSON")?;
                    LearningData::from_value(&value)
                }
                None => LearningData::default(),
            };
            let report = manager.evolve(score, &learning_data).await;
            print_json(&report)?;
            manager.shutdown().await?;
        }
        Commands::Record {
            symbol,
            action,
            confidence,
        } => {
            manager.record_decision(&symbol, &action, confidence).await;
            manager.shutdown().await?;
            println!(
                "Recorded {} {} in generation {}",
                action,
                symbol,
                manager.generation().await
            );
        }
    }

    Ok(())
}
