//! Listing watcher CLI

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use listwatch::{
    error::Result,
    models::Config,
    pipeline::{self, CycleKind, WatchOptions},
};

/// listwatch - rental listing watcher
#[derive(Parser, Debug)]
#[command(
    name = "listwatch",
    version,
    about = "Polls a listing search page and announces new listings"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "data/config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll on the configured interval until interrupted
    Watch {
        /// Stop after this many cycles
        #[arg(long)]
        cycles: Option<usize>,

        /// Log notifications instead of sending them; keep state in memory
        #[arg(long)]
        dry_run: bool,
    },

    /// Run a single cycle
    Once {
        #[arg(long)]
        dry_run: bool,

        /// Look back to local midnight instead of one interval
        #[arg(long)]
        initial: bool,
    },

    /// Extract listings from a saved page
    Inspect {
        /// Markup file to read
        file: PathBuf,
    },

    /// Validate configuration
    Validate,

    /// Clear the record store
    Reset,
}

/// Initialize logging from the verbosity flag or the configured level.
///
/// `RUST_LOG` overrides both.
fn init_logging(verbose: bool, level: &str) {
    let level = if verbose { "debug" } else { level };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = Config::load_if_exists(&cli.config);
    let level = match &loaded {
        Ok(Some(config)) => config.logging.level.clone(),
        _ => "info".to_string(),
    };
    init_logging(cli.verbose, &level);

    let mut config = match loaded {
        Ok(Some(config)) => {
            log::info!("Loaded configuration from {}", cli.config.display());
            config
        }
        Ok(None) => {
            log::warn!(
                "No configuration at {}, using defaults",
                cli.config.display()
            );
            Config::default()
        }
        Err(e) => {
            log::error!("Failed to load {}: {}", cli.config.display(), e);
            return Err(e);
        }
    };
    config.apply_env();

    match cli.command {
        Command::Watch { cycles, dry_run } => {
            config.validate()?;
            let options = WatchOptions {
                dry_run,
                max_cycles: cycles,
            };
            pipeline::run_watch(&config, options, shutdown_signal()).await?;
        }

        Command::Once { dry_run, initial } => {
            config.validate()?;
            let kind = if initial {
                CycleKind::Initial
            } else {
                CycleKind::Periodic
            };
            let options = WatchOptions {
                dry_run,
                max_cycles: None,
            };
            pipeline::run_once(&config, options, kind).await?;
        }

        Command::Inspect { file } => {
            pipeline::run_inspect(&config, &file).await?;
        }

        Command::Validate => {
            pipeline::run_validate(&config)?;
            log::info!("All validations passed!");
        }

        Command::Reset => {
            pipeline::run_reset(&config).await?;
        }
    }

    log::info!("Done!");

    Ok(())
}
