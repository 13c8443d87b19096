mod agent;
mod bot;
mod config;
mod llm;
mod platform;
mod profile;
mod prompt;
mod tasks;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::agent::Agent;
use crate::bot::AppState;
use crate::config::Config;
use crate::llm::OllamaClient;
use crate::platform::line::LineClient;
use crate::tasks::BackgroundTasks;

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional; real environment variables still win
    let dotenv = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,line_relay=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Ok(path) = dotenv {
        info!("Loaded environment from: {}", path.display());
    }

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!("Configuration loaded successfully");
    info!("  Model: {}", config.ollama.model);
    info!("  Inference endpoint: {}", config.ollama.url);
    info!("  Generation timeout: {}s", config.ollama.timeout_secs);

    let generator = Arc::new(OllamaClient::new(config.ollama.clone())?);
    let replier = Arc::new(LineClient::new(&config.line)?);
    let agent = Arc::new(Agent::new(generator, replier));

    let tasks = Arc::new(BackgroundTasks::new());
    let state = Arc::new(AppState::new(
        config.line.channel_secret.clone(),
        agent,
        tasks.clone(),
    ));

    info!("Webhook relay is starting...");
    bot::run(state, &config.server, shutdown_signal()).await?;

    info!("Server stopped, draining in-flight replies");
    if !tasks.shutdown(config.server.shutdown_grace()).await {
        warn!("Some replies were abandoned at shutdown");
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
