//! sermon-analysis CLI entry point.

use anyhow::Result;
use clap::Parser;
use sermon_analysis::cli::{commands, Cli, Commands};
use sermon_analysis::config::Settings;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Load configuration
    let config_path = cli.config.as_ref().map(PathBuf::from);
    let settings = Settings::load_from(config_path.as_ref())?;

    // Initialize logging
    let log_level = match cli.verbose {
        0 => settings.general.effective_log_level().to_string(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("sermon_analysis={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Ensure data directories exist
    std::fs::create_dir_all(settings.data_dir())?;
    std::fs::create_dir_all(settings.temp_dir())?;

    // Execute command
    match &cli.command {
        Commands::Serve {
            interval,
            status_server,
            port,
        } => {
            commands::run_serve(*interval, *status_server, *port, settings).await?;
        }

        Commands::RunOnce => {
            commands::run_once(settings).await?;
        }

        Commands::Submit {
            title,
            audio_url,
            date,
        } => {
            commands::run_submit(title, audio_url, date.as_deref(), settings).await?;
        }

        Commands::List { status } => {
            commands::run_list(status.as_deref(), settings).await?;
        }

        Commands::Show { id } => {
            commands::run_show(id, settings).await?;
        }

        Commands::Reset { id } => {
            commands::run_reset(id, settings).await?;
        }

        Commands::Doctor => {
            commands::run_doctor(&settings)?;
        }

        Commands::Config { action } => {
            commands::run_config(action, config_path, settings)?;
        }
    }

    Ok(())
}
