mod append;
mod backend;
mod bot;
mod config;
mod error;
mod platform;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::bot::AppState;
use crate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,butlerbot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // An explicit path must exist; the default falls back to the environment.
    let explicit_path = std::env::args().nth(1).map(PathBuf::from);
    let config = match explicit_path {
        Some(path) => load_file(&path)?,
        None => {
            let path = PathBuf::from("config.toml");
            if path.exists() {
                load_file(&path)?
            } else {
                info!("No config.toml found, reading configuration from environment");
                Config::from_env().context("Failed to load configuration from environment")?
            }
        }
    };

    info!("Configuration loaded successfully");
    info!("  Backend: {}", config.backend.kind());

    let backend = backend::from_config(config.backend)?;
    info!("  Target: {}", backend.target());
    info!("  Append command: /{}", backend.kind().append_command());

    let state = Arc::new(AppState::new(config.telegram.bot_token, backend));

    info!("Bot is starting...");
    platform::telegram::run(state).await?;

    Ok(())
}

fn load_file(path: &Path) -> Result<Config> {
    info!("Loading configuration from: {}", path.display());
    Config::load(path).with_context(|| format!("Failed to load config from {}", path.display()))
}
