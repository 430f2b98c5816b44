//! Utskrift CLI entry point.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use utskrift::cli::{commands, Cli, Commands};
use utskrift::config::Settings;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let settings = match &cli.config {
        Some(path) => Settings::load_from(Some(&std::path::PathBuf::from(path)))?,
        None => Settings::load()?,
    };

    // Initialize logging; -v flags override the configured level
    let log_level = match cli.verbose {
        0 => settings.general.log_level.as_str(),
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("utskrift={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Ensure working directories exist
    std::fs::create_dir_all(settings.temp_dir())?;
    std::fs::create_dir_all(settings.audio_cache_dir())?;

    match &cli.command {
        Commands::Transcribe {
            input,
            workers,
            chunk_workers,
            format,
            subfolder,
            limit,
            force,
        } => {
            commands::run_transcribe(
                input,
                *workers,
                *chunk_workers,
                format.as_deref(),
                subfolder.as_deref(),
                *limit,
                *force,
                settings,
            )
            .await?;
        }

        Commands::Doctor => {
            commands::run_doctor(&settings)?;
        }

        Commands::Config { action } => {
            commands::run_config(action, settings)?;
        }
    }

    Ok(())
}
