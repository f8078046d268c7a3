//! UltraVision CLI - fast, parallel batch image description against local
//! OpenAI-compatible vision servers (LM Studio, Ollama, ...).
//!
//! # Usage
//!
//! ```bash
//! # Describe every image in a directory
//! ultravision process ./photos --model qwen/qwen3-vl-8b
//!
//! # Two images per request, four requests in flight, CSV output
//! ultravision process ./photos --per-request 2 --concurrency 4 --format csv
//!
//! # Find vision servers on the local network
//! ultravision discover
//!
//! # View configuration
//! ultravision config show
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use ultravision_core::{Config, ConfigError, UltravisionError};

mod cli;
mod logging;

/// Exit status for configuration and usage errors.
const EXIT_CONFIG: u8 = 2;

/// UltraVision - batch image description with local vision models.
#[derive(Parser, Debug)]
#[command(name = "ultravision")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    /// Read configuration from this file instead of the default location
    #[arg(long = "config", global = true, env = "ULTRAVISION_CONFIG")]
    config_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Describe a directory of images with a vision model
    Process(cli::process::ProcessArgs),

    /// Find LM Studio and Ollama servers with vision models
    Discover(cli::discover::DiscoverArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so config problems go straight to stderr.
    let config = match load_config(cli.config_file.as_deref()) {
        Ok(config) => config,
        Err(e) if cli.config_file.is_some() => {
            eprintln!("Error: {e}");
            return ExitCode::from(EXIT_CONFIG);
        }
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `ultravision config path`."
            );
            Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("UltraVision v{}", ultravision_core::VERSION);

    let result = match cli.command {
        Commands::Process(args) => cli::process::execute(args, config).await,
        Commands::Discover(args) => cli::discover::execute(args, config).await,
        Commands::Config(args) => cli::config::execute(args, cli.config_file.as_deref()).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(exit_status(&e))
        }
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<Config, ConfigError> {
    match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

/// Configuration errors anywhere in the cause chain map to status 2.
fn exit_status(err: &anyhow::Error) -> u8 {
    let is_config = err.chain().any(|cause| {
        cause.is::<ConfigError>()
            || cause
                .downcast_ref::<UltravisionError>()
                .is_some_and(UltravisionError::is_config)
    });
    if is_config {
        EXIT_CONFIG
    } else {
        1
    }
}
