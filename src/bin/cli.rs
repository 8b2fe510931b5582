//! Section Tracker CLI
//!
//! Local execution entry point. For AWS Lambda, use `section-tracker-lambda`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use section_tracker::{
    config::load_config,
    error::{AppError, Result},
    models::Config,
    pipeline, storage,
};

/// Course section seat and instructor tracker
#[derive(Parser, Debug)]
#[command(
    name = "section-tracker",
    version,
    about = "Notifies subscribers about course section changes"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check every tracked section once and send notifications
    Run {
        /// Term to check (default: CURRENT_TERM or `term` in the config)
        #[arg(long)]
        term: Option<String>,
    },

    /// Validate the configuration
    Validate,

    /// Show the most recent run record for a term
    LastRun {
        /// Term to inspect (default: CURRENT_TERM or `term` in the config)
        #[arg(long)]
        term: Option<String>,
    },
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool, default_level: &str) {
    let level = if verbose { "debug" } else { default_level };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn resolve_term(term: Option<String>, config: &Config) -> Result<String> {
    term.or_else(|| config.term.clone())
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| AppError::config("no term given; pass --term or set CURRENT_TERM"))
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            init_logging(cli.verbose, "info");
            log::error!("Config load failed: {}", e);
            return Err(e);
        }
    };
    init_logging(cli.verbose, &config.logging.level);

    log::info!("Section tracker starting...");
    log::info!("Loaded configuration from {}", cli.config.display());

    match cli.command {
        Command::Run { term } => {
            let term = resolve_term(term, &config)?;
            if config.channels.dry_run {
                log::warn!("Dry-run mode: set PRODUCTION_MODE=on to send notifications");
            }
            let record = pipeline::run_with_config(&config, &term).await?;
            if record.failed_batches() > 0 {
                log::warn!("{} batch(es) were abandoned", record.failed_batches());
            }
        }

        Command::Validate => {
            log::info!("Validating configuration...");
            // load_config already validated; report the effective settings.
            let settings = config.run_settings();
            log::info!(
                "✓ Config OK (batch size {}, concurrency {}, storage {:?}, dry run {})",
                settings.batch_size,
                settings.max_concurrent,
                config.storage.backend,
                config.channels.dry_run
            );
        }

        Command::LastRun { term } => {
            let term = resolve_term(term, &config)?;
            let store = storage::open(&config.storage, &term).await?;
            match store.last_run().await? {
                Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
                None => log::info!("No runs recorded for term {term}."),
            }
        }
    }

    log::info!("Done!");

    Ok(())
}
