//! mailtally: word counts and recipient ranking over EDRM email archives

mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mailtally::config::{Config, LogFormat, LoggingConfig};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;
use tracing::error;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "mailtally")]
#[command(about = "Resumable word counts and recipient ranking over EDRM email archives")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "mailtally.toml")]
    config: PathBuf,

    /// Directory holding the archives
    #[arg(long)]
    email_root: Option<PathBuf>,

    /// Scratch directory for extracted archives
    #[arg(long)]
    unzip_dir: Option<PathBuf>,

    /// Checkpoint file
    #[arg(long)]
    state: Option<PathBuf>,

    /// CSV audit trail
    #[arg(long)]
    audit: Option<PathBuf>,

    /// Log file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Process the corpus, resuming from the checkpoint if present (default)
    Run {
        /// Quiet mode (no progress bar)
        #[arg(short, long)]
        quiet: bool,
    },

    /// Show checkpoint progress of an interrupted run
    Status {
        /// Number of ranked recipients to print
        #[arg(long, default_value = "10")]
        top: usize,
    },

    /// Write a default configuration file
    Init {
        /// Output directory
        #[arg(default_value = ".")]
        path: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Some(Commands::Init { path }) = &cli.command {
        return match commands::init_config(path.clone()) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("Error: {:?}", e);
                ExitCode::FAILURE
            }
        };
    }

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:?}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(&config.logging, cli.verbose) {
        eprintln!("Error: failed to set up logging: {:?}", e);
        return ExitCode::FAILURE;
    }

    let result = match cli.command {
        Some(Commands::Status { top }) => commands::show_status(&config.pipeline.state_path, top),
        Some(Commands::Run { quiet }) => commands::run_corpus(config, quiet),
        None => commands::run_corpus(config, false),
        Some(Commands::Init { .. }) => unreachable!("handled above"),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:?}", e);
            ExitCode::FAILURE
        }
    }
}

/// Load the config file (or defaults) and apply CLI overrides
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load_or_default(&cli.config)?;

    if let Some(ref root) = cli.email_root {
        config.pipeline.email_root = root.clone();
    }
    if let Some(ref dir) = cli.unzip_dir {
        config.pipeline.unzip_dir = dir.clone();
    }
    if let Some(ref state) = cli.state {
        config.pipeline.state_path = state.clone();
    }
    if let Some(ref audit) = cli.audit {
        config.pipeline.audit_path = audit.clone();
    }
    if let Some(ref log_file) = cli.log_file {
        config.logging.file = log_file.clone();
    }

    config.validate()?;
    Ok(config)
}

/// Log to stdout and append to the configured log file
fn init_logging(logging: &LoggingConfig, verbose: u8) -> Result<()> {
    let level = logging.level.raised(verbose);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    if let Some(parent) = logging.file.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&logging.file)
        .with_context(|| format!("Failed to open log file {}", logging.file.display()))?;
    let file_writer = Mutex::new(file);

    match logging.format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false))
            .with(fmt::layer().with_target(false).with_ansi(false).with_writer(file_writer))
            .try_init()?,
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(false))
            .with(fmt::layer().json().with_target(false).with_writer(file_writer))
            .try_init()?,
    }

    Ok(())
}
